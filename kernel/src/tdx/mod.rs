// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

pub mod error;
pub mod tdcall;

pub use error::TdxError;
