// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Execution contexts: the ways a privileged operation can be carried out
//! from the current trust domain.

use crate::cpu::cpuid::{CpuVendor, CpuidResult};
use crate::cpu::vmcall::{Vmcall, Vmmcall};
use crate::error::BenchError;
use crate::io::DEFAULT_IO_DRIVER;

use alloc::vec::Vec;
use core::fmt::{self, Debug};

pub mod native;
// The protocol logic of both backends is unit tested in every build.
#[cfg(any(feature = "snp", test))]
pub mod snp;
#[cfg(any(feature = "tdx", test))]
pub mod tdx;

pub use native::NativeContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    Native,
    Snp,
    Tdx,
}

impl ContextKind {
    /// Prefix of the report name of every operation run in this context.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Native => "",
            Self::Snp => "snp",
            Self::Tdx => "tdx",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Native => "native",
            Self::Snp => "SEV-SNP GHCB",
            Self::Tdx => "TDX TDVMCALL",
        };
        f.write_str(name)
    }
}

/// How completely the host answered a request it did not fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Completion {
    #[default]
    Full,
    /// The named result register was not marked valid and reads as zero.
    Partial(&'static str),
}

/// Value of a successful request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reply<T> {
    pub value: T,
    pub completion: Completion,
}

impl<T> Reply<T> {
    pub const fn full(value: T) -> Self {
        Self {
            value,
            completion: Completion::Full,
        }
    }
}

/// A way of performing the benchmarked privileged operations.
///
/// Every method issues exactly one request and blocks until it completes.
/// Implementations keep no per-request state between calls.
pub trait ExecutionContext: Debug {
    fn kind(&self) -> ContextKind;

    /// Executes CPUID for `leaf`/`subleaf`.
    fn cpuid(&self, leaf: u32, subleaf: u32) -> Result<Reply<CpuidResult>, BenchError>;

    /// Reads the MSR with index `msr`.
    fn rdmsr(&self, msr: u32) -> Result<Reply<u64>, BenchError>;

    /// Issues hypercall `nr` without arguments and returns the host's result.
    fn hypercall(&self, nr: u32) -> Result<Reply<u64>, BenchError>;

    /// Reads one byte from I/O port `port`.
    fn inb(&self, port: u16) -> Result<Reply<u8>, BenchError>;
}

pub static NATIVE_CONTEXT_VMCALL: NativeContext<Vmcall> =
    NativeContext::new(&DEFAULT_IO_DRIVER, Vmcall);
pub static NATIVE_CONTEXT_VMMCALL: NativeContext<Vmmcall> =
    NativeContext::new(&DEFAULT_IO_DRIVER, Vmmcall);

/// Native context issuing the hypercall instruction of the current CPU
/// vendor: VMMCALL on AMD, VMCALL otherwise.
pub fn native_context() -> &'static dyn ExecutionContext {
    match CpuVendor::current() {
        CpuVendor::Amd => &NATIVE_CONTEXT_VMMCALL,
        CpuVendor::Intel | CpuVendor::Other => &NATIVE_CONTEXT_VMCALL,
    }
}

#[cfg(feature = "snp")]
pub static SNP_CONTEXT: snp::SnpContext<snp::StaticGhcbChannel> =
    snp::SnpContext::new(snp::StaticGhcbChannel::new());

#[cfg(feature = "tdx")]
pub static TDX_CONTEXT: tdx::TdxContext<crate::tdx::tdcall::TdcallInsn> =
    tdx::TdxContext::new(crate::tdx::tdcall::TdcallInsn);

/// Contexts compiled into this build: native first, then the configured
/// confidential-computing backend, if any.
pub fn configured_contexts() -> Vec<&'static dyn ExecutionContext> {
    let mut contexts: Vec<&'static dyn ExecutionContext> = Vec::new();
    contexts.push(native_context());
    #[cfg(feature = "snp")]
    contexts.push(&SNP_CONTEXT);
    #[cfg(feature = "tdx")]
    contexts.push(&TDX_CONTEXT);
    contexts
}
