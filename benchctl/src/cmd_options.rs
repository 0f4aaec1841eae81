// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vmbench::bench::{OpParam, BENCH_COUNT, WARMUP_COUNT};

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct CmdOptions {
    /// Also print debug messages
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmarks that are legal in user mode with the native backend
    Run {
        /// 0 = all, 1 = cpuid, 2 = msr, 3 = hypercall, 4 = pio
        #[arg(short, long, default_value_t = 0, conflicts_with_all = ["leaf", "msr"])]
        mode: i32,

        /// Discarded iterations before measuring
        #[arg(short, long, default_value_t = WARMUP_COUNT)]
        warmup: u64,

        /// Measured iterations per operation
        #[arg(short, long, default_value_t = BENCH_COUNT.get(),
              value_parser = clap::value_parser!(u64).range(1..))]
        iterations: u64,

        /// Write per-iteration cycle counts to this file, one operation per
        /// line
        #[arg(long)]
        samples: Option<PathBuf>,

        /// CPU whose msr device (/dev/cpu/<cpu>/msr) is read
        #[arg(long, default_value_t = 0)]
        cpu: u32,

        /// Time CPUID with this leaf only
        #[arg(long, value_parser = parse_number, conflicts_with = "msr")]
        leaf: Option<u32>,

        /// Sub-leaf for --leaf
        #[arg(long, value_parser = parse_number, requires = "leaf")]
        subleaf: Option<u32>,

        /// Time reads of this MSR only
        #[arg(long, value_parser = parse_number)]
        msr: Option<u32>,
    },

    /// Print the results of the last run in a captured kernel log
    Parse {
        log: PathBuf,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compare a plain VM log against a confidential VM log
    Compare {
        /// Log of the plain VM
        #[arg(long)]
        baseline: PathBuf,

        /// Log of the confidential VM
        #[arg(long)]
        cvm: PathBuf,

        /// Backend whose prefixed results form the optimized column
        #[arg(long, value_enum)]
        prefix: Backend,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Backend {
    Snp,
    Tdx,
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{}: {}", s, e))
}

/// Operation picked by `--leaf`/`--subleaf` or `--msr`, if any.
pub fn single_operation(
    leaf: Option<u32>,
    subleaf: Option<u32>,
    msr: Option<u32>,
) -> Option<OpParam> {
    match (leaf, msr) {
        (Some(leaf), _) => Some(OpParam::Cpuid {
            leaf,
            subleaf: subleaf.unwrap_or(0),
        }),
        (None, Some(msr)) => Some(OpParam::Msr(msr)),
        (None, None) => None,
    }
}

impl Backend {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Snp => "snp",
            Self::Tdx => "tdx",
        }
    }
}
