// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Entry points for the embedding kernel.

use super::mode::Mode;
use super::operation::Category;
use super::registry::{resolve, BoundOperation, CategoryPlan};
use super::report::{BenchResult, RUN_END, RUN_START};
use super::runner::Runner;
use crate::context::ExecutionContext;
use crate::cpu::tsc::{CycleCounter, WallClock};
use crate::error::BenchError;

use alloc::vec::Vec;

/// Runs every category `mode` selects in every context and logs one report
/// line per operation. An invalid `mode` is logged and nothing runs.
pub fn bench_init<C: CycleCounter, W: WallClock>(
    mode: i32,
    contexts: &[&dyn ExecutionContext],
    runner: &Runner<C, W>,
) -> Result<Vec<BenchResult>, BenchError> {
    bench_init_filtered(mode, contexts, runner, |_| true)
}

/// Like [`bench_init`], but categories for which `allowed` returns false are
/// skipped with a warning.
pub fn bench_init_filtered<C, W, F>(
    mode: i32,
    contexts: &[&dyn ExecutionContext],
    runner: &Runner<C, W>,
    allowed: F,
) -> Result<Vec<BenchResult>, BenchError>
where
    C: CycleCounter,
    W: WallClock,
    F: Fn(Category) -> bool,
{
    bench_run(mode, contexts, allowed, |op| Ok(runner.measure(op)))
}

/// Resolves `mode` against `contexts` and hands every operation to
/// `measure`, logging the run the same way [`bench_init`] does.
pub fn bench_run<'a, E, F, M>(
    mode: i32,
    contexts: &[&'a dyn ExecutionContext],
    allowed: F,
    measure: M,
) -> Result<Vec<BenchResult>, E>
where
    E: From<BenchError>,
    F: Fn(Category) -> bool,
    M: FnMut(&BoundOperation<'a>) -> Result<BenchResult, E>,
{
    let selected = match Mode::try_from(mode) {
        Ok(selected) => selected,
        Err(e) => {
            log::info!("{}: mode={}", RUN_START, mode);
            log::error!("{}", e);
            return Err(e.into());
        }
    };
    run_plans(selected, &resolve(selected, contexts), allowed, measure)
}

/// Logs the run markers around `plans` and one report line per operation.
/// Categories for which `allowed` returns false are skipped with a warning.
pub fn run_plans<'a, E, F, M>(
    mode: Mode,
    plans: &[CategoryPlan<'a>],
    allowed: F,
    mut measure: M,
) -> Result<Vec<BenchResult>, E>
where
    F: Fn(Category) -> bool,
    M: FnMut(&BoundOperation<'a>) -> Result<BenchResult, E>,
{
    log::info!("{}: mode={}", RUN_START, mode.raw());

    let mut results = Vec::new();
    for plan in plans {
        if !allowed(plan.category) {
            log::warn!("Skipping {}", plan.category);
            continue;
        }
        log::info!("Benchmarking {}", plan.category);
        for op in plan.operations.iter() {
            let result = measure(op)?;
            log::info!("{}", result);
            results.push(result);
        }
    }

    log::info!("{}", RUN_END);
    Ok(results)
}

pub fn bench_exit() {
    log::info!("Exit");
}
