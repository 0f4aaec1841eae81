// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Report lines and their parsing.
//!
//! A result is logged as
//!
//! ```text
//! <name>: <total_cycles> cycles (avg: <avg_cycles>), <total_ns> ns (avg: <avg_ns>)
//! ```
//!
//! The parser also accepts the older comma-separated form
//! `<name>, total_cycle <n>, avg_cycle <n>, total_time <n>, avg_time <n>`
//! and tolerates a leading `[ timestamp]` and `bench: ` prefix as found in a
//! captured kernel log.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// Module name every line of the benchmark output is prefixed with.
pub const LOG_NAME: &str = "bench";

/// First message of a run.
pub const RUN_START: &str = "Initializing";
/// Last message of a run.
pub const RUN_END: &str = "done";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchResult {
    pub name: String,
    pub total_cycles: u64,
    pub avg_cycles: u64,
    pub total_time_ns: u64,
    pub avg_time_ns: u64,
    /// Failed measured iterations. Not part of the report line.
    pub failures: u64,
    /// Measured iterations whose reply lacked a valid register. Not part of
    /// the report line.
    pub incomplete: u64,
}

impl fmt::Display for BenchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} cycles (avg: {}), {} ns (avg: {})",
            self.name, self.total_cycles, self.avg_cycles, self.total_time_ns, self.avg_time_ns
        )
    }
}

/// Strips the kernel timestamp and the module prefix off a log line.
pub fn message(line: &str) -> &str {
    let mut msg = line.trim();
    if msg.starts_with('[') {
        if let Some((_, rest)) = msg.split_once(']') {
            msg = rest.trim_start();
        }
    }
    msg.strip_prefix(LOG_NAME)
        .and_then(|rest| rest.strip_prefix(": "))
        .unwrap_or(msg)
}

fn is_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(char::is_whitespace)
}

fn numbers(fields: [&str; 4]) -> Option<[u64; 4]> {
    let mut out = [0u64; 4];
    for (o, field) in out.iter_mut().zip(fields) {
        *o = field.parse().ok()?;
    }
    Some(out)
}

fn parse_fields(rest: &str) -> Option<[u64; 4]> {
    let cleaned = rest.replace(['(', ')', ','], " ");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    match words.as_slice() {
        [tc, "cycles", "avg:", ac, tn, "ns", "avg:", an] => numbers([*tc, *ac, *tn, *an]),
        _ => None,
    }
}

fn parse_legacy_fields(rest: &str) -> Option<[u64; 4]> {
    let cleaned = rest.replace(',', " ");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    match words.as_slice() {
        ["total_cycle", tc, "avg_cycle", ac, "total_time", tn, "avg_time", an] => {
            numbers([*tc, *ac, *tn, *an])
        }
        _ => None,
    }
}

/// Parses a report line, with or without log prefixes.
pub fn parse_line(line: &str) -> Option<BenchResult> {
    let msg = message(line);
    let (name, fields) = msg
        .split_once(": ")
        .filter(|(name, _)| is_name(name))
        .and_then(|(name, rest)| Some((name, parse_fields(rest)?)))
        .or_else(|| {
            msg.split_once(", ")
                .filter(|(name, _)| is_name(name))
                .and_then(|(name, rest)| Some((name, parse_legacy_fields(rest)?)))
        })?;
    let [total_cycles, avg_cycles, total_time_ns, avg_time_ns] = fields;
    Some(BenchResult {
        name: name.to_string(),
        total_cycles,
        avg_cycles,
        total_time_ns,
        avg_time_ns,
        failures: 0,
        incomplete: 0,
    })
}

/// Report lines of the last run in `log`: everything after the last
/// `Initializing` message up to `done` or the end of the log. `None` if the
/// log contains no run.
pub fn parse_last_run(log: &str) -> Option<Vec<BenchResult>> {
    let lines: Vec<&str> = log.lines().collect();
    let start = lines
        .iter()
        .rposition(|line| message(line).starts_with(RUN_START))?;
    Some(
        lines[start + 1..]
            .iter()
            .take_while(|line| message(line) != RUN_END)
            .filter_map(|line| parse_line(line))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    fn result(name: &str, tc: u64, ac: u64, tn: u64, an: u64) -> BenchResult {
        BenchResult {
            name: name.to_string(),
            total_cycles: tc,
            avg_cycles: ac,
            total_time_ns: tn,
            avg_time_ns: an,
            failures: 0,
            incomplete: 0,
        }
    }

    #[test]
    fn display_format() {
        let r = result("_rdmsr_0x1b", 51_000_000, 51, 21_000_000, 21);
        assert_eq!(
            r.to_string(),
            "_rdmsr_0x1b: 51000000 cycles (avg: 51), 21000000 ns (avg: 21)"
        );
    }

    #[test]
    fn parse_current_format() {
        let r = result("tdx_cpuid_0x40000000", 9_000, 90, 4_000, 40);
        assert_eq!(parse_line(&r.to_string()), Some(r.clone()));
        let logged = std::format!("[  104.161314] bench: {}", r);
        assert_eq!(parse_line(&logged), Some(r));
    }

    #[test]
    fn parse_legacy_format() {
        let line = "[  104.161314] bench: _cpuid_0, total_cycle 273468339, avg_cycle 2734, total_time 101286422, avg_time 1012";
        assert_eq!(
            parse_line(line),
            Some(result("_cpuid_0", 273468339, 2734, 101286422, 1012))
        );
    }

    #[test]
    fn other_lines_are_ignored() {
        assert_eq!(parse_line("bench: Initializing: mode=0"), None);
        assert_eq!(parse_line("bench: Benchmarking cpuid"), None);
        assert_eq!(parse_line("bench: WARN: _inb_0x40: 1/10 iterations failed"), None);
        assert_eq!(parse_line("_cpuid_0: many cycles (avg: 1), 1 ns (avg: 1)"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn last_run_only() {
        let log = "\
[    1.000000] bench: Initializing: mode=1
[    1.100000] bench: _cpuid_0: 10 cycles (avg: 1), 10 ns (avg: 1)
[    1.200000] bench: done
[    9.000000] bench: Initializing: mode=0
[    9.000001] bench: Benchmarking cpuid
[    9.100000] bench: _cpuid_0: 20 cycles (avg: 2), 20 ns (avg: 2)
[    9.200000] bench: tdx_cpuid_0: 80 cycles (avg: 8), 40 ns (avg: 4)
[    9.300000] bench: done
[    9.400000] bench: _cpuid_1: 30 cycles (avg: 3), 30 ns (avg: 3)
";
        let run = parse_last_run(log).unwrap();
        assert_eq!(
            run,
            [
                result("_cpuid_0", 20, 2, 20, 2),
                result("tdx_cpuid_0", 80, 8, 40, 4)
            ]
        );
    }

    #[test]
    fn run_without_done_ends_at_eof() {
        let log = "bench: Initializing: mode=4\nbench: _inb_0x40: 5 cycles (avg: 5), 2 ns (avg: 2)\n";
        assert_eq!(parse_last_run(log).unwrap().len(), 1);
        assert_eq!(parse_last_run("nothing here"), None);
    }
}
