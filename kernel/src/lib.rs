// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Latency benchmarks for privileged x86 operations (CPUID, RDMSR, hypercalls,
//! port I/O) as seen from inside a guest, natively and through the explicit
//! SEV-SNP GHCB or TDX TDVMCALL paths.
//!
//! The crate is meant to be linked into a guest kernel. The embedder
//! provides a console, a nanosecond clock and, for SEV-SNP, the shared GHCB
//! page; everything else is driven from [`bench::module::bench_init`].

#![no_std]

#[cfg(not(target_arch = "x86_64"))]
compile_error!("vmbench only supports x86_64");

#[cfg(all(feature = "snp", feature = "tdx"))]
compile_error!("features \"snp\" and \"tdx\" are mutually exclusive");

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod attest;
pub mod bench;
pub mod console;
pub mod context;
pub mod cpu;
pub mod error;
pub mod io;
pub mod serial;
pub mod sev;
pub mod tdx;

pub use error::BenchError;
