// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use super::{ContextKind, ExecutionContext, Reply};
use crate::cpu::cpuid::CpuidResult;
use crate::error::BenchError;
use crate::tdx::tdcall::{
    tdvmcall_cpuid, tdvmcall_io_read8, tdvmcall_raw, tdvmcall_rdmsr, TdVmCall,
};

/// [`ExecutionContext`] issuing every operation as an explicit
/// TDG.VP.VMCALL instead of taking a #VE.
///
/// [`ExecutionContext::hypercall`] is a raw pass-through call. The TD must be
/// set up to forward it to the host, which is not checked here; otherwise the
/// call is rejected by the TDX module.
#[derive(Debug)]
pub struct TdxContext<T> {
    tdx: T,
}

impl<T: TdVmCall> TdxContext<T> {
    pub const fn new(tdx: T) -> Self {
        Self { tdx }
    }
}

impl<T: TdVmCall + core::fmt::Debug> ExecutionContext for TdxContext<T> {
    fn kind(&self) -> ContextKind {
        ContextKind::Tdx
    }

    fn cpuid(&self, leaf: u32, subleaf: u32) -> Result<Reply<CpuidResult>, BenchError> {
        Ok(Reply::full(tdvmcall_cpuid(&self.tdx, leaf, subleaf)?))
    }

    fn rdmsr(&self, msr: u32) -> Result<Reply<u64>, BenchError> {
        Ok(Reply::full(tdvmcall_rdmsr(&self.tdx, msr)?))
    }

    fn hypercall(&self, nr: u32) -> Result<Reply<u64>, BenchError> {
        Ok(Reply::full(tdvmcall_raw(&self.tdx, nr)?))
    }

    fn inb(&self, port: u16) -> Result<Reply<u8>, BenchError> {
        Ok(Reply::full(tdvmcall_io_read8(&self.tdx, port)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::tdx::tdcall::{TdVmCallRegs, TdxModuleArgs, TDVMCALL_CPUID, TDVMCALL_IO};
    use crate::tdx::TdxError;
    use std::cell::Cell;

    /// Emulates the TDX module and a KVM host behind it.
    #[derive(Debug, Default)]
    struct FakeTdx {
        calls: Cell<u64>,
        module_status: Cell<u64>,
    }

    impl TdVmCall for FakeTdx {
        fn tdvmcall(&self, expose: TdVmCallRegs, args: &mut TdxModuleArgs) -> u64 {
            assert!(expose.contains(TdVmCallRegs::R10 | TdVmCallRegs::R11));
            self.calls.set(self.calls.get() + 1);
            if self.module_status.get() != 0 {
                return self.module_status.get();
            }
            match (args.r10, args.r11) {
                (0, TDVMCALL_CPUID) => {
                    args.r12 = args.r12.wrapping_add(1);
                    args.r13 = 0x4b4d_564b;
                    args.r14 = 0x564b_4d56;
                    args.r15 = 0x4d;
                }
                (0, TDVMCALL_IO) => args.r11 = 0x40 | args.r14,
                (0, 31) if args.r12 == 0x1b => args.r11 = 0xfee0_0900,
                // Unknown MSR: #GP is reported as an operand error
                (0, 31) => args.r10 = 0x8000_0000_0000_0000,
                (nr, _) => args.r10 = nr + 100,
            }
            0
        }
    }

    #[test]
    fn operations_through_tdvmcall() {
        let ctx = TdxContext::new(FakeTdx::default());
        assert_eq!(ctx.kind(), ContextKind::Tdx);

        let res = ctx.cpuid(0x4000_0000, 0).unwrap().value;
        assert_eq!(res.eax, 0x4000_0001);
        assert_eq!(res.ebx, 0x4b4d_564b);
        assert_eq!(ctx.rdmsr(0x1b), Ok(Reply::full(0xfee0_0900)));
        assert_eq!(ctx.inb(0x70), Ok(Reply::full(0x70)));
        assert_eq!(ctx.hypercall(2), Ok(Reply::full(102)));
        assert_eq!(ctx.tdx.calls.get(), 4);
    }

    #[test]
    fn failures_map_to_transaction_failed() {
        let ctx = TdxContext::new(FakeTdx::default());

        let err = ctx.rdmsr(0xc000_0100).unwrap_err();
        assert_eq!(err, BenchError::Tdx(TdxError::Vmcall(0x8000_0000_0000_0000)));
        assert_eq!(err.class(), ErrorClass::TransactionFailed);

        ctx.tdx.module_status.set(0xc000_0100_0000_0000);
        let err = ctx.hypercall(2).unwrap_err();
        assert_eq!(err, BenchError::Tdx(TdxError::Module(0xc000_0100_0000_0000)));
    }
}
