// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use crate::error::BenchError;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TdxError {
    // TDCALL returned a non-zero completion status in RAX
    Module(u64),
    // TDG.VP.VMCALL completed but the host reported a failure in R10
    Vmcall(u64),
}

impl From<TdxError> for BenchError {
    fn from(err: TdxError) -> BenchError {
        BenchError::Tdx(err)
    }
}

impl fmt::Display for TdxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(status) => write!(f, "TDCALL status {:#x}", status),
            Self::Vmcall(status) => write!(f, "TDG.VP.VMCALL status {:#x}", status),
        }
    }
}

/// Checks the completion status of a TDCALL.
pub fn tdx_result(rax: u64) -> Result<(), TdxError> {
    match rax {
        0 => Ok(()),
        status => Err(TdxError::Module(status)),
    }
}

/// Checks the status a standard TDG.VP.VMCALL leaves in R10.
pub fn tdvmcall_result(r10: u64) -> Result<(), TdxError> {
    match r10 {
        0 => Ok(()),
        status => Err(TdxError::Vmcall(status)),
    }
}
