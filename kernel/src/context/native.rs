// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use super::{ContextKind, ExecutionContext, Reply};
use crate::cpu::cpuid::CpuidResult;
use crate::cpu::msr::read_msr;
use crate::cpu::vmcall::HypercallInsn;
use crate::error::BenchError;
use crate::io::IOPort;

/// Executes the privileged instructions directly. Whether they trap to a
/// hypervisor is invisible here, so every operation succeeds.
///
/// The hypercall instruction is fixed by `H` when the context is built, so
/// the measured path has no vendor check.
#[derive(Debug)]
pub struct NativeContext<H> {
    io: &'static dyn IOPort,
    insn: H,
}

impl<H: HypercallInsn> NativeContext<H> {
    pub const fn new(io: &'static dyn IOPort, insn: H) -> Self {
        Self { io, insn }
    }
}

impl<H: HypercallInsn> ExecutionContext for NativeContext<H> {
    fn kind(&self) -> ContextKind {
        ContextKind::Native
    }

    fn cpuid(&self, leaf: u32, subleaf: u32) -> Result<Reply<CpuidResult>, BenchError> {
        Ok(Reply::full(CpuidResult::get(leaf, subleaf)))
    }

    fn rdmsr(&self, msr: u32) -> Result<Reply<u64>, BenchError> {
        Ok(Reply::full(read_msr(msr)))
    }

    fn hypercall(&self, nr: u32) -> Result<Reply<u64>, BenchError> {
        // SAFETY: the hypercall is issued without arguments, so the host has
        // no guest memory to act on.
        let ret = unsafe { self.insn.hypercall(nr) };
        Ok(Reply::full(ret))
    }

    fn inb(&self, port: u16) -> Result<Reply<u8>, BenchError> {
        Ok(Reply::full(self.io.inb(port)))
    }
}
