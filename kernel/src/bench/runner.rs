// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Warmup, timed loop and aggregation for one operation.
//!
//! Failed invocations are not retried and still count as iterations, so a
//! failure that returns quickly lowers the reported averages. The number of
//! failures is reported next to the result, as is the number of replies the
//! host left partly invalid.

use super::config::BenchConfig;
use super::report::BenchResult;
use crate::context::Completion;
use crate::cpu::tsc::{CycleCounter, WallClock};
use crate::error::BenchError;

use alloc::string::ToString;

/// Something the runner can time.
pub trait Benchmarkable {
    /// Name under which the result is reported.
    fn name(&self) -> &str;

    /// Executes the operation exactly once.
    fn run_once(&self) -> Result<Completion, BenchError>;
}

/// Outcome of [`Runner::sample_into`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleSummary {
    pub count: u64,
    pub total_cycles: u64,
    pub mean_cycles: u64,
    pub total_ns: u64,
    pub mean_ns: u64,
    pub failures: u64,
    pub incomplete: u64,
}

impl SampleSummary {
    /// Report of the sampled operation `name`.
    pub fn to_result(&self, name: &str) -> BenchResult {
        BenchResult {
            name: name.to_string(),
            total_cycles: self.total_cycles,
            avg_cycles: self.mean_cycles,
            total_time_ns: self.total_ns,
            avg_time_ns: self.mean_ns,
            failures: self.failures,
            incomplete: self.incomplete,
        }
    }
}

/// Counts failed iterations and partial replies of one measured operation
/// and logs them without flooding the console.
#[derive(Debug)]
struct FailureLog<'a> {
    name: &'a str,
    count: u64,
    incomplete: u64,
}

impl<'a> FailureLog<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            count: 0,
            incomplete: 0,
        }
    }

    #[inline]
    fn check(&mut self, iteration: u64, result: Result<Completion, BenchError>) {
        match result {
            Ok(Completion::Full) => {}
            Ok(Completion::Partial(field)) => self.record_incomplete(iteration, field),
            Err(err) => self.record(iteration, err),
        }
    }

    #[cold]
    fn record_incomplete(&mut self, iteration: u64, field: &str) {
        if self.incomplete == 0 {
            log::warn!(
                "{}: iteration {}: {} not marked valid in the reply, read as 0",
                self.name,
                iteration,
                field
            );
        } else {
            log::debug!("{}: iteration {}: {} not marked valid", self.name, iteration, field);
        }
        self.incomplete += 1;
    }

    #[cold]
    fn record(&mut self, iteration: u64, err: BenchError) {
        if self.count == 0 {
            log::warn!(
                "{}: iteration {} failed: {} ({:?})",
                self.name,
                iteration,
                err,
                err.class()
            );
        } else {
            log::debug!("{}: iteration {} failed: {}", self.name, iteration, err);
        }
        self.count += 1;
    }

    /// Returns the failed and the incomplete iteration counts.
    fn finish(self, total: u64) -> (u64, u64) {
        if self.count > 0 {
            log::warn!("{}: {}/{} iterations failed", self.name, self.count, total);
        }
        if self.incomplete > 0 {
            log::warn!(
                "{}: {}/{} replies incomplete",
                self.name,
                self.incomplete,
                total
            );
        }
        (self.count, self.incomplete)
    }
}

#[derive(Debug)]
pub struct Runner<C, W> {
    config: BenchConfig,
    counter: C,
    clock: W,
}

impl<C: CycleCounter, W: WallClock> Runner<C, W> {
    pub fn new(config: BenchConfig, counter: C, clock: W) -> Self {
        Self {
            config,
            counter,
            clock,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    fn warmup<B: Benchmarkable + ?Sized>(&self, op: &B) {
        for _ in 0..self.config.warmup {
            let _ = op.run_once();
        }
    }

    /// Warms up, then times `iterations` back-to-back invocations as one
    /// region.
    pub fn measure<B: Benchmarkable + ?Sized>(&self, op: &B) -> BenchResult {
        let n = self.config.iterations.get();
        let mut failures = FailureLog::new(op.name());

        self.warmup(op);

        let start_time = self.clock.now_ns();
        let start = self.counter.start();
        for i in 0..n {
            failures.check(i, op.run_once());
        }
        let end = self.counter.end();
        let end_time = self.clock.now_ns();

        let total_cycles = end.saturating_sub(start);
        let total_time_ns = end_time.saturating_sub(start_time);
        let (failures, incomplete) = failures.finish(n);
        BenchResult {
            name: op.name().to_string(),
            total_cycles,
            avg_cycles: total_cycles / n,
            total_time_ns,
            avg_time_ns: total_time_ns / n,
            failures,
            incomplete,
        }
    }

    /// Warms up, then times every invocation separately into `samples`, one
    /// cycle count per element. A second pass of the same length measures
    /// wall-clock time for all of them together.
    pub fn sample_into<B: Benchmarkable + ?Sized>(
        &self,
        op: &B,
        samples: &mut [u64],
    ) -> SampleSummary {
        let n = samples.len() as u64;
        if n == 0 {
            return SampleSummary::default();
        }
        let mut failures = FailureLog::new(op.name());

        self.warmup(op);

        let mut total_cycles: u64 = 0;
        for (i, sample) in (0u64..).zip(samples.iter_mut()) {
            let start = self.counter.start();
            let result = op.run_once();
            let end = self.counter.end();
            failures.check(i, result);
            *sample = end.saturating_sub(start);
            total_cycles = total_cycles.saturating_add(*sample);
        }

        let start_time = self.clock.now_ns();
        for _ in 0..n {
            let _ = op.run_once();
        }
        let end_time = self.clock.now_ns();
        let total_ns = end_time.saturating_sub(start_time);
        let (failures, incomplete) = failures.finish(n);

        SampleSummary {
            count: n,
            total_cycles,
            mean_cycles: total_cycles / n,
            total_ns,
            mean_ns: total_ns / n,
            failures,
            incomplete,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::Cell;
    use core::num::NonZeroU64;
    use std::vec;

    /// Advances by a fixed step on every read.
    #[derive(Debug)]
    pub(crate) struct StepCounter {
        pub(crate) now: Cell<u64>,
        pub(crate) step: u64,
    }

    impl StepCounter {
        pub(crate) fn new(step: u64) -> Self {
            Self {
                now: Cell::new(0),
                step,
            }
        }

        fn tick(&self) -> u64 {
            let now = self.now.get() + self.step;
            self.now.set(now);
            now
        }
    }

    impl CycleCounter for StepCounter {
        fn start(&self) -> u64 {
            self.tick()
        }

        fn end(&self) -> u64 {
            self.tick()
        }
    }

    impl WallClock for StepCounter {
        fn now_ns(&self) -> u64 {
            self.tick()
        }
    }

    /// Operation that advances a shared counter when run and fails every
    /// `fail_every`-th call.
    #[derive(Debug)]
    pub(crate) struct CountingOp<'a> {
        pub(crate) calls: Cell<u64>,
        pub(crate) cost: u64,
        pub(crate) fail_every: u64,
        pub(crate) clock: &'a StepCounter,
    }

    impl Benchmarkable for CountingOp<'_> {
        fn name(&self) -> &str {
            "_counting_op"
        }

        fn run_once(&self) -> Result<Completion, BenchError> {
            let calls = self.calls.get() + 1;
            self.calls.set(calls);
            self.clock.now.set(self.clock.now.get() + self.cost);
            if self.fail_every != 0 && calls % self.fail_every == 0 {
                return Err(BenchError::Unsupported);
            }
            Ok(Completion::Full)
        }
    }

    fn config(warmup: u64, iterations: u64) -> BenchConfig {
        BenchConfig::new(warmup, NonZeroU64::new(iterations).unwrap())
    }

    #[test]
    fn warmup_plus_measured_invocations() {
        let cycles = StepCounter::new(1);
        let clock = StepCounter::new(0);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 10,
            fail_every: 0,
            clock: &cycles,
        };
        let runner = Runner::new(config(7, 100), &cycles, &clock);

        let res = runner.measure(&op);
        assert_eq!(op.calls.get(), 107);
        assert_eq!(res.name, "_counting_op");
        // Only the measured loop plus one counter step lies in the region
        assert_eq!(res.total_cycles, 100 * 10 + 1);
        assert_eq!(res.avg_cycles, res.total_cycles / 100);
        assert_eq!(res.failures, 0);
    }

    #[test]
    fn averages_use_integer_division() {
        let cycles = StepCounter::new(0);
        let clock = StepCounter::new(1001);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 3,
            fail_every: 0,
            clock: &cycles,
        };
        let runner = Runner::new(config(0, 7), &cycles, &clock);

        let res = runner.measure(&op);
        assert_eq!(res.total_cycles, 21);
        assert_eq!(res.avg_cycles, 3);
        assert_eq!(res.total_time_ns, 1001);
        assert_eq!(res.avg_time_ns, 1001 / 7);
    }

    #[test]
    fn failures_count_toward_iterations() {
        let cycles = StepCounter::new(0);
        let clock = StepCounter::new(0);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 1,
            fail_every: 4,
            clock: &cycles,
        };
        let runner = Runner::new(config(0, 40), &cycles, &clock);

        let res = runner.measure(&op);
        assert_eq!(op.calls.get(), 40);
        assert_eq!(res.failures, 10);
        assert_eq!(res.avg_cycles, 1);
    }

    #[test]
    fn warmup_failures_are_not_reported() {
        let cycles = StepCounter::new(0);
        let clock = StepCounter::new(0);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 0,
            fail_every: 5,
            clock: &cycles,
        };
        // Calls 5 and 10 fail during warmup, 15 during measurement
        let runner = Runner::new(config(10, 5), &cycles, &clock);
        assert_eq!(runner.measure(&op).failures, 1);
    }

    #[test]
    fn samples_fill_caller_buffer() {
        let cycles = StepCounter::new(1);
        let clock = StepCounter::new(500);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 4,
            fail_every: 0,
            clock: &cycles,
        };
        let runner = Runner::new(config(3, 1), &cycles, &clock);
        let mut samples = vec![0u64; 16];

        let summary = runner.sample_into(&op, &mut samples);
        assert!(samples.iter().all(|&s| s == 5));
        assert_eq!(op.calls.get(), 3 + 16 + 16);
        assert_eq!(
            summary,
            SampleSummary {
                count: 16,
                total_cycles: 80,
                mean_cycles: 5,
                total_ns: 500,
                mean_ns: 31,
                failures: 0,
                incomplete: 0,
            }
        );
        assert_eq!(summary.to_result("_counting_op").avg_cycles, 5);
    }

    #[test]
    fn empty_sample_buffer() {
        let cycles = StepCounter::new(1);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 0,
            fail_every: 0,
            clock: &cycles,
        };
        let runner = Runner::new(config(3, 1), &cycles, &cycles);
        assert_eq!(runner.sample_into(&op, &mut []), SampleSummary::default());
        assert_eq!(op.calls.get(), 0);
    }

    #[test]
    fn repeated_runs_are_independent() {
        let cycles = StepCounter::new(2);
        let clock = StepCounter::new(50);
        let op = CountingOp {
            calls: Cell::new(0),
            cost: 6,
            fail_every: 0,
            clock: &cycles,
        };
        let runner = Runner::new(config(1, 10), &cycles, &clock);
        let first = runner.measure(&op);
        let second = runner.measure(&op);
        assert_eq!(first, second);
    }
}
