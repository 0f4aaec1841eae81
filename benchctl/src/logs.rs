// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use anyhow::{bail, Context};
use serde::Serialize;
use std::fs;
use std::path::Path;
use vmbench::bench::report::parse_last_run;
use vmbench::bench::BenchResult;

/// Serialized form of one report line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub name: String,
    pub total_cycles: u64,
    pub avg_cycles: u64,
    pub total_time_ns: u64,
    pub avg_time_ns: u64,
}

impl From<&BenchResult> for ResultRecord {
    fn from(r: &BenchResult) -> Self {
        Self {
            name: r.name.clone(),
            total_cycles: r.total_cycles,
            avg_cycles: r.avg_cycles,
            total_time_ns: r.total_time_ns,
            avg_time_ns: r.avg_time_ns,
        }
    }
}

/// Results of the last run recorded in the log at `path`.
pub fn load_last_run(path: &Path) -> anyhow::Result<Vec<BenchResult>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read log {}", path.display()))?;
    match parse_last_run(&text) {
        Some(results) => Ok(results),
        None => bail!("no benchmark run found in {}", path.display()),
    }
}

pub fn parse_command(path: &Path, json: bool) -> anyhow::Result<()> {
    let results = load_last_run(path)?;
    if json {
        let records: Vec<ResultRecord> = results.iter().map(ResultRecord::from).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for result in results.iter() {
            println!("{}", result);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialization() {
        let result = BenchResult {
            name: "_cpuid_1".to_string(),
            total_cycles: 10,
            avg_cycles: 1,
            total_time_ns: 5,
            avg_time_ns: 0,
            failures: 3,
            incomplete: 1,
        };
        let json = serde_json::to_string(&ResultRecord::from(&result)).unwrap();
        assert_eq!(
            json,
            r#"{"name":"_cpuid_1","total_cycles":10,"avg_cycles":1,"total_time_ns":5,"avg_time_ns":0}"#
        );
    }

    #[test]
    fn missing_run_is_an_error() {
        let path = std::env::temp_dir().join(format!("benchctl-empty-{}", std::process::id()));
        fs::write(&path, "[    0.000000] Linux version 6.8\n").unwrap();
        let err = load_last_run(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("no benchmark run"));
    }

    #[test]
    fn unreadable_log() {
        assert!(load_last_run(Path::new("/nonexistent/bench.log")).is_err());
    }
}
