// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use core::arch::asm;

/// # Safety
/// VMGEXIT operations generally need to be performed with interrupts disabled
/// to ensure that an interrupt cannot cause the GHCB MSR to change prior to
/// exiting to the host.  It is the caller's responsibility to ensure that
/// interrupt handling is configured correctly for the attempted operation.
pub unsafe fn raw_vmgexit() {
    // SAFETY: requirements have to be checked by the caller.
    unsafe {
        asm!("rep; vmmcall", options(att_syntax));
    }
}
