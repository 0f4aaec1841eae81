// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use core::arch::asm;
use core::fmt::Debug;

/// Issues a KVM hypercall with VMCALL (Intel). The call number is passed in
/// RAX and the host's return value comes back in RAX.
///
/// # Safety
///
/// The caller must make sure the hypercall `nr` takes no pointer arguments
/// and has no side effects on guest memory. Outside a VM this raises #UD.
pub unsafe fn vmcall(nr: u32) -> u64 {
    let ret: u64;
    // SAFETY: requirements have to be checked by the caller.
    unsafe {
        asm!("vmcall",
             inout("rax") u64::from(nr) => ret,
             options(att_syntax, nostack));
    }
    ret
}

/// AMD flavour of [`vmcall`].
///
/// # Safety
///
/// Same as [`vmcall`].
pub unsafe fn vmmcall(nr: u32) -> u64 {
    let ret: u64;
    // SAFETY: requirements have to be checked by the caller.
    unsafe {
        asm!("vmmcall",
             inout("rax") u64::from(nr) => ret,
             options(att_syntax, nostack));
    }
    ret
}

/// Instruction a guest uses to call its hypervisor, chosen once per context.
pub trait HypercallInsn: Debug + Sync {
    /// # Safety
    ///
    /// Same as [`vmcall`].
    unsafe fn hypercall(&self, nr: u32) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vmcall;

impl HypercallInsn for Vmcall {
    unsafe fn hypercall(&self, nr: u32) -> u64 {
        // SAFETY: requirements have to be checked by the caller.
        unsafe { vmcall(nr) }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vmmcall;

impl HypercallInsn for Vmmcall {
    unsafe fn hypercall(&self, nr: u32) -> u64 {
        // SAFETY: requirements have to be checked by the caller.
        unsafe { vmmcall(nr) }
    }
}
