// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZeroU64;
use std::path::Path;
use std::time::Instant;

use vmbench::bench::module::run_plans;
use vmbench::bench::registry::{resolve, BoundOperation, CategoryPlan};
use vmbench::bench::{
    BenchConfig, BenchResult, Benchmarkable, Category, Mode, OpParam, Runner,
};
use vmbench::context::ExecutionContext;
use vmbench::cpu::{CycleCounter, SerializedTsc, WallClock};
use vmbench::BenchError;

use crate::user::{MsrDevice, UserContext};

/// [`WallClock`] counting from its creation.
#[derive(Debug)]
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for InstantClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug)]
pub struct RunOptions<'a> {
    pub mode: i32,
    pub warmup: u64,
    pub iterations: u64,
    pub samples: Option<&'a Path>,
    /// CPU whose msr device is read
    pub cpu: u32,
    /// Run only this operation instead of the tables selected by `mode`.
    pub single: Option<OpParam>,
}

impl RunOptions<'_> {
    fn wants_msr(&self) -> bool {
        match self.single {
            Some(param) => param.category() == Category::Msr,
            None => Mode::try_from(self.mode)
                .is_ok_and(|mode| mode.categories().contains(&Category::Msr)),
        }
    }
}

/// Categories of `mode` that `ctx` can run. Asking for a single category
/// that it cannot is an error.
fn user_categories(mode: Mode, ctx: &UserContext) -> Result<Vec<Category>, BenchError> {
    let allowed: Vec<Category> = mode
        .categories()
        .iter()
        .copied()
        .filter(|&c| ctx.supports(c))
        .collect();
    match mode {
        Mode::Only(_) if allowed.is_empty() => Err(BenchError::Unsupported),
        _ => Ok(allowed),
    }
}

/// Opens the msr device if the run reads MSRs. A full run goes on without
/// it.
fn msr_device(options: &RunOptions<'_>) -> anyhow::Result<Option<MsrDevice>> {
    if !options.wants_msr() {
        return Ok(None);
    }
    match MsrDevice::for_cpu(options.cpu) {
        Ok(dev) => Ok(Some(dev)),
        Err(e) if options.single.is_none() && options.mode == 0 => {
            log::warn!("{:#}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn run_with<C: CycleCounter, W: WallClock>(
    options: &RunOptions<'_>,
    runner: &Runner<C, W>,
    ctx: &UserContext,
) -> anyhow::Result<Vec<BenchResult>> {
    let contexts: [&dyn ExecutionContext; 1] = [ctx];
    let (mode, plans) = match options.single {
        Some(param) => {
            let category = param.category();
            let plan = CategoryPlan {
                category,
                operations: vec![BoundOperation::new(ctx, param)],
            };
            (Mode::Only(category), vec![plan])
        }
        None => {
            let mode = Mode::try_from(options.mode)?;
            (mode, resolve(mode, &contexts))
        }
    };
    let allowed = user_categories(mode, ctx)
        .with_context(|| format!("mode {} in user mode", mode.raw()))?;
    let allowed = |c: Category| allowed.contains(&c);

    let Some(path) = options.samples else {
        return run_plans(mode, &plans, allowed, |op| Ok(runner.measure(op)));
    };

    let file = File::create(path)
        .with_context(|| format!("failed to create samples file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let len = usize::try_from(options.iterations).context("too many iterations")?;
    let mut samples = vec![0u64; len];

    let results = run_plans(mode, &plans, allowed, |op| -> anyhow::Result<BenchResult> {
        let summary = runner.sample_into(op, &mut samples);
        write!(out, "{}:", op.name())?;
        for sample in samples.iter() {
            write!(out, " {}", sample)?;
        }
        writeln!(out)?;
        Ok(summary.to_result(op.name()))
    })?;
    out.flush()
        .with_context(|| format!("failed to write samples file {}", path.display()))?;
    Ok(results)
}

pub fn run_command(options: &RunOptions<'_>) -> anyhow::Result<Vec<BenchResult>> {
    let iterations = NonZeroU64::new(options.iterations).context("iterations must be non-zero")?;
    let runner = Runner::new(
        BenchConfig::new(options.warmup, iterations),
        SerializedTsc,
        InstantClock::new(),
    );
    let ctx = UserContext::new(msr_device(options)?);
    run_with(options, &runner, &ctx)
}
