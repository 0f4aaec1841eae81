// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 vmbench contributors

use super::msr::read_flags;
use core::arch::asm;
use core::marker::PhantomData;

/// Interrupt flag in RFLAGS register
pub const EFLAGS_IF: u64 = 1 << 9;

/// Unconditionally disable IRQs
///
/// Callers need to take care of re-enabling IRQs.
#[inline(always)]
pub fn raw_irqs_disable() {
    // SAFETY: Inline assembly to disable IRQs, which does not change any state
    // related to memory safety.
    unsafe {
        asm!("cli", options(att_syntax, preserves_flags, nomem));
    }
}

/// Unconditionally enable IRQs
///
/// Callers need to make sure it is safe to enable IRQs. e.g. that no data
/// structures which are accessed in IRQ handlers are used after IRQs have
/// been enabled.
#[inline(always)]
pub fn raw_irqs_enable() {
    // SAFETY: Inline assembly to enable IRQs, which does not change any state
    // related to memory safety.
    unsafe {
        asm!("sti", options(att_syntax, preserves_flags, nomem));
    }
}

/// Query IRQ state on current CPU
///
/// # Returns
///
/// `true` when IRQs are enabled, `false` otherwise
#[inline(always)]
#[must_use = "Unused irqs_enabled() result - meant to be irq_enable()?"]
pub fn irqs_enabled() -> bool {
    (read_flags() & EFLAGS_IF) == EFLAGS_IF
}

/// Keeps IRQs disabled on the current CPU while it is alive and restores the
/// previous IRQ state when dropped. Nesting is allowed: only the outermost
/// guard that found IRQs enabled turns them back on.
#[derive(Debug)]
pub struct IrqGuard {
    was_enabled: bool,
    /// Make the type !Send + !Sync
    phantom: PhantomData<*const ()>,
}

impl IrqGuard {
    pub fn new() -> Self {
        let was_enabled = irqs_enabled();
        raw_irqs_disable();
        Self {
            was_enabled,
            phantom: PhantomData,
        }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            raw_irqs_enable();
        }
    }
}
