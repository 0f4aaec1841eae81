// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

pub mod ghcb;
pub mod utils;

pub use ghcb::{GhcbError, GhcbField, GhcbReply, GHCB};
pub use utils::raw_vmgexit;
