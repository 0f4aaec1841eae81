// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Side by side average times of a plain VM and a confidential VM.
//!
//! Each row looks up one operation in three places: the native result of the
//! plain VM, the native result of the confidential VM (the exit is handled
//! through the #VC/#VE path) and the backend-prefixed result of the
//! confidential VM (the guest talks to the host explicitly).

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use vmbench::bench::BenchResult;

use crate::cmd_options::Backend;
use crate::logs::load_last_run;

/// Row label and name of the operation without its context prefix.
pub const ROWS: [(&str, &str); 5] = [
    ("cpuid_1", "cpuid_1"),
    ("cpuid_40M", "cpuid_0x40000000"),
    ("msr", "rdmsr_0x1b"),
    ("hypercall", "hypercall_2"),
    ("inb", "inb_0x40"),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Row {
    pub label: &'static str,
    pub baseline_ns: Option<u64>,
    pub cvm_ns: Option<u64>,
    pub cvm_direct_ns: Option<u64>,
}

fn avg_times(results: &[BenchResult]) -> HashMap<&str, u64> {
    results
        .iter()
        .map(|r| (r.name.as_str(), r.avg_time_ns))
        .collect()
}

pub fn compare(baseline: &[BenchResult], cvm: &[BenchResult], backend: Backend) -> Vec<Row> {
    let baseline = avg_times(baseline);
    let cvm = avg_times(cvm);
    ROWS.iter()
        .map(|&(label, op)| {
            let native = format!("_{}", op);
            let direct = format!("{}_{}", backend.prefix(), op);
            Row {
                label,
                baseline_ns: baseline.get(native.as_str()).copied(),
                cvm_ns: cvm.get(native.as_str()).copied(),
                cvm_direct_ns: cvm.get(direct.as_str()).copied(),
            }
        })
        .collect()
}

fn cell(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn render_table(rows: &[Row], backend: Backend) -> String {
    let mut out = format!(
        "{:<12} {:>10} {:>10} {:>10}\n",
        "avg ns",
        "vm",
        backend.prefix(),
        format!("{}*", backend.prefix())
    );
    for row in rows {
        out.push_str(&format!(
            "{:<12} {:>10} {:>10} {:>10}\n",
            row.label,
            cell(row.baseline_ns),
            cell(row.cvm_ns),
            cell(row.cvm_direct_ns)
        ));
    }
    out
}

pub fn compare_command(
    baseline: &Path,
    cvm: &Path,
    backend: Backend,
    json: bool,
) -> anyhow::Result<()> {
    let baseline = load_last_run(baseline)?;
    let cvm = load_last_run(cvm)?;
    let rows = compare(&baseline, &cvm, backend);
    if rows.iter().any(|r| r.cvm_direct_ns.is_none()) {
        log::warn!("{} results missing from the confidential VM log", backend.prefix());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render_table(&rows, backend));
    }
    Ok(())
}
