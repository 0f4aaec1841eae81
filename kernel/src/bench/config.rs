// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use core::num::NonZeroU64;

const fn nonzero(n: u64) -> NonZeroU64 {
    match NonZeroU64::new(n) {
        Some(n) => n,
        None => panic!("iteration count must not be zero"),
    }
}

/// Discarded invocations before every measurement.
#[cfg(not(feature = "smoke"))]
pub const WARMUP_COUNT: u64 = 10_000;
/// Measured invocations per operation.
#[cfg(not(feature = "smoke"))]
pub const BENCH_COUNT: NonZeroU64 = nonzero(1_000_000);

#[cfg(feature = "smoke")]
pub const WARMUP_COUNT: u64 = 0;
#[cfg(feature = "smoke")]
pub const BENCH_COUNT: NonZeroU64 = nonzero(1);

/// Iteration counts of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchConfig {
    pub warmup: u64,
    pub iterations: NonZeroU64,
}

impl BenchConfig {
    pub const fn new(warmup: u64, iterations: NonZeroU64) -> Self {
        Self { warmup, iterations }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new(WARMUP_COUNT, BENCH_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_build_constants() {
        let config = BenchConfig::default();
        assert_eq!(config.warmup, WARMUP_COUNT);
        assert_eq!(config.iterations, BENCH_COUNT);
        #[cfg(not(feature = "smoke"))]
        assert_eq!(config.iterations.get(), 1_000_000);
    }
}
