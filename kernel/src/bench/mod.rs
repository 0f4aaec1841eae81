// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

pub mod config;
pub mod mode;
pub mod module;
pub mod operation;
pub mod registry;
pub mod report;
pub mod runner;

pub use config::{BenchConfig, BENCH_COUNT, WARMUP_COUNT};
pub use mode::Mode;
pub use module::{bench_exit, bench_init, bench_run};
pub use operation::{Category, OpParam};
pub use report::BenchResult;
pub use runner::{Benchmarkable, Runner, SampleSummary};
