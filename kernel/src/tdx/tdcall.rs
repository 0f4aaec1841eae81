// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! TDG.VP.VMCALL register convention.
//!
//! Every request is described by a [`TdxModuleArgs`] that lives on the
//! caller's stack for exactly one call. The TDX module copies the registers
//! selected by the expose mask in RCX to the host and copies the host's
//! values back on return.

use super::error::{tdvmcall_result, tdx_result, TdxError};
use crate::cpu::cpuid::CpuidResult;

use bitflags::bitflags;
use core::arch::asm;

/// TDCALL leaf of TDG.VP.VMCALL.
pub const TDG_VP_TDVMCALL: u64 = 0;

/// R10 value selecting a standard (GHCI-defined) TDG.VP.VMCALL.
pub const TDX_HYPERCALL_STANDARD: u64 = 0;

// Sub-functions are the VMX exit reason of the emulated instruction.
pub const TDVMCALL_CPUID: u64 = 10;
pub const TDVMCALL_IO: u64 = 30;
pub const TDVMCALL_MSR_READ: u64 = 31;

const PORT_READ: u64 = 0;

bitflags! {
    /// GPRs the TDX module exposes to the host on TDG.VP.VMCALL.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TdVmCallRegs: u64 {
        const RDX = 1 << 2;
        const RBX = 1 << 3;
        const RSI = 1 << 6;
        const RDI = 1 << 7;
        const R8 = 1 << 8;
        const R9 = 1 << 9;
        const R10 = 1 << 10;
        const R11 = 1 << 11;
        const R12 = 1 << 12;
        const R13 = 1 << 13;
        const R14 = 1 << 14;
        const R15 = 1 << 15;
    }
}

impl TdVmCallRegs {
    /// Registers carried by every benchmark request.
    pub const HYPERCALL: Self = Self::R10
        .union(Self::R11)
        .union(Self::R12)
        .union(Self::R13)
        .union(Self::R14)
        .union(Self::R15)
        .union(Self::RDI)
        .union(Self::RSI);
}

/// Register file of one TDG.VP.VMCALL. Inputs are read from it before the
/// call and outputs are written back into it afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TdxModuleArgs {
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rdi: u64,
    pub rsi: u64,
}

impl TdxModuleArgs {
    /// Arguments of a standard call for sub-function `function`.
    pub fn standard(function: u64) -> Self {
        Self {
            r10: TDX_HYPERCALL_STANDARD,
            r11: function,
            ..Default::default()
        }
    }
}

/// Issues TDG.VP.VMCALL.
pub trait TdVmCall {
    /// Performs the call with the registers in `args` exposed according to
    /// `expose`, updates `args` with the returned registers and returns the
    /// TDCALL completion status (RAX).
    fn tdvmcall(&self, expose: TdVmCallRegs, args: &mut TdxModuleArgs) -> u64;
}

/// [`TdVmCall`] implemented with the `tdcall` instruction.
#[derive(Clone, Copy, Debug, Default)]
pub struct TdcallInsn;

impl TdVmCall for TdcallInsn {
    fn tdvmcall(&self, expose: TdVmCallRegs, args: &mut TdxModuleArgs) -> u64 {
        let mut ret: u64;
        // SAFETY: executing TDCALL requires the use of assembly. TDG.VP.VMCALL
        // only transfers register state, every register it may modify is
        // declared and RBX is never exposed.
        unsafe {
            asm!("tdcall",
                 inout("rax") TDG_VP_TDVMCALL => ret,
                 inout("rcx") expose.bits() => _,
                 inout("r10") args.r10,
                 inout("r11") args.r11,
                 inout("r12") args.r12,
                 inout("r13") args.r13,
                 inout("r14") args.r14,
                 inout("r15") args.r15,
                 inout("rdi") args.rdi,
                 inout("rsi") args.rsi,
                 options(att_syntax, nostack));
        }
        ret
    }
}

fn tdvmcall_standard<T: TdVmCall + ?Sized>(
    tdx: &T,
    args: &mut TdxModuleArgs,
) -> Result<(), TdxError> {
    tdx_result(tdx.tdvmcall(TdVmCallRegs::HYPERCALL, args))?;
    tdvmcall_result(args.r10)
}

pub fn tdvmcall_cpuid<T: TdVmCall + ?Sized>(
    tdx: &T,
    cpuid_fn: u32,
    cpuid_subfn: u32,
) -> Result<CpuidResult, TdxError> {
    let mut args = TdxModuleArgs {
        r12: cpuid_fn.into(),
        r13: cpuid_subfn.into(),
        ..TdxModuleArgs::standard(TDVMCALL_CPUID)
    };
    tdvmcall_standard(tdx, &mut args)?;
    Ok(CpuidResult {
        eax: args.r12 as u32,
        ebx: args.r13 as u32,
        ecx: args.r14 as u32,
        edx: args.r15 as u32,
    })
}

pub fn tdvmcall_rdmsr<T: TdVmCall + ?Sized>(tdx: &T, msr: u32) -> Result<u64, TdxError> {
    let mut args = TdxModuleArgs {
        r12: msr.into(),
        ..TdxModuleArgs::standard(TDVMCALL_MSR_READ)
    };
    tdvmcall_standard(tdx, &mut args)?;
    Ok(args.r11)
}

pub fn tdvmcall_io_read8<T: TdVmCall + ?Sized>(tdx: &T, port: u16) -> Result<u8, TdxError> {
    let mut args = TdxModuleArgs {
        r12: size_of::<u8>() as u64,
        r13: PORT_READ,
        r14: port.into(),
        ..TdxModuleArgs::standard(TDVMCALL_IO)
    };
    tdvmcall_standard(tdx, &mut args)?;
    Ok(args.r11 as u8)
}

/// Non-standard TDG.VP.VMCALL with `nr` in R10, passed to the host without
/// interpretation by the TDX module. R10 on return is the host's result, not
/// a status.
///
/// The TD must be configured to forward this call. Otherwise it never leaves
/// the TDX module.
pub fn tdvmcall_raw<T: TdVmCall + ?Sized>(tdx: &T, nr: u32) -> Result<u64, TdxError> {
    let mut args = TdxModuleArgs {
        r10: nr.into(),
        ..Default::default()
    };
    tdx_result(tdx.tdvmcall(TdVmCallRegs::HYPERCALL, &mut args))?;
    Ok(args.r10)
}
