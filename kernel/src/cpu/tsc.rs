// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Serialized cycle counting.
//!
//! A bracketed region is measured as `end() - start()`. Both ends include the
//! fixed cost of a serializing instruction, so numbers are only meaningful
//! relative to other regions measured the same way. An invariant TSC is
//! assumed and not checked.

use super::cpuid::{CpuidResult, CPUID_VENDOR_LEAF};
use super::msr::{rdtsc, rdtscp};

pub trait CycleCounter {
    /// Reads the counter after all earlier instructions have retired.
    fn start(&self) -> u64;
    /// Reads the counter after all earlier instructions have executed and
    /// keeps later instructions from starting before the read.
    fn end(&self) -> u64;
}

/// Monotonic nanosecond clock of the embedding environment.
pub trait WallClock {
    fn now_ns(&self) -> u64;
}

/// [`CycleCounter`] built from CPUID and RDTSC/RDTSCP.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializedTsc;

impl CycleCounter for SerializedTsc {
    #[inline(always)]
    fn start(&self) -> u64 {
        // CPUID serializes
        let _ = CpuidResult::get(CPUID_VENDOR_LEAF, 0);
        rdtsc()
    }

    #[inline(always)]
    fn end(&self) -> u64 {
        let tsc = rdtscp().timestamp;
        let _ = CpuidResult::get(CPUID_VENDOR_LEAF, 0);
        tsc
    }
}

impl<T: CycleCounter + ?Sized> CycleCounter for &T {
    fn start(&self) -> u64 {
        (**self).start()
    }

    fn end(&self) -> u64 {
        (**self).end()
    }
}

impl<T: WallClock + ?Sized> WallClock for &T {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_regions_are_non_negative() {
        let tsc = SerializedTsc;
        for _ in 0..16 {
            let start = tsc.start();
            let end = tsc.end();
            assert!(end >= start);
        }
    }
}
