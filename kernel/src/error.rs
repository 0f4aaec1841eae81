// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use crate::attest::AttestError;
use crate::sev::ghcb::GhcbError;
use crate::tdx::TdxError;
use core::fmt;

// As a general rule, functions private to a given module may use the
// leaf error types. Public functions should return a BenchError
// containing a leaf error type, usually the one corresponding to
// that module. We always provide a way to convert a leaf error into
// a BenchError via the From trait at the module level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchError {
    // Errors related to the GHCB protocol
    Ghcb(GhcbError),
    // Errors returned by the TDX module or by the host through it
    Tdx(TdxError),
    // Errors reported by the attestation SDK
    Attest(AttestError),
    // The mode parameter does not name a benchmark category
    InvalidMode(i32),
    // A module parameter string could not be parsed
    InvalidParam,
    // The operation is not available in this execution context
    Unsupported,
}

/// Coarse classification of a failed operation, used when reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// A per-CPU or per-transaction resource could not be acquired.
    ResourceUnavailable,
    /// The host or the trusted module returned a non-success status.
    TransactionFailed,
    /// The transaction succeeded but not every result field was marked valid.
    ResponseIncomplete,
    /// Not an error of the measured operation itself.
    Other,
}

impl BenchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Ghcb(GhcbError::Unavailable) => ErrorClass::ResourceUnavailable,
            Self::Ghcb(GhcbError::VmgexitInvalid)
            | Self::Ghcb(GhcbError::VmgexitError(..))
            | Self::Tdx(_)
            | Self::Attest(_) => ErrorClass::TransactionFailed,
            Self::Ghcb(GhcbError::ResponseIncomplete(_)) => ErrorClass::ResponseIncomplete,
            Self::InvalidMode(_) | Self::InvalidParam | Self::Unsupported => ErrorClass::Other,
        }
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ghcb(e) => write!(f, "GHCB: {}", e),
            Self::Tdx(e) => write!(f, "TDX: {}", e),
            Self::Attest(e) => write!(f, "attestation: {}", e),
            Self::InvalidMode(mode) => write!(f, "invalid mode {}", mode),
            Self::InvalidParam => write!(f, "malformed module parameter"),
            Self::Unsupported => write!(f, "operation not supported"),
        }
    }
}

impl core::error::Error for BenchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_leaf_errors() {
        assert_eq!(
            BenchError::from(GhcbError::Unavailable).class(),
            ErrorClass::ResourceUnavailable
        );
        assert_eq!(
            BenchError::from(GhcbError::VmgexitError(1, 2)).class(),
            ErrorClass::TransactionFailed
        );
        assert_eq!(
            BenchError::from(TdxError::Vmcall(1)).class(),
            ErrorClass::TransactionFailed
        );
        assert_eq!(BenchError::InvalidMode(7).class(), ErrorClass::Other);
    }
}
