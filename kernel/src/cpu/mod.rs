// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

pub mod cpuid;
pub mod irq_state;
pub mod msr;
pub mod tsc;
pub mod vmcall;

pub use irq_state::{irqs_enabled, IrqGuard};
pub use tsc::{CycleCounter, SerializedTsc, WallClock};
