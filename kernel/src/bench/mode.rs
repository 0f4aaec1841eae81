// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use super::operation::Category;
use crate::error::BenchError;

/// Which categories a run executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    All,
    Only(Category),
}

impl Mode {
    /// Selected categories in execution order.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Self::All => &Category::ALL,
            Self::Only(Category::Cpuid) => &Category::ALL[0..1],
            Self::Only(Category::Msr) => &Category::ALL[1..2],
            Self::Only(Category::Hypercall) => &Category::ALL[2..3],
            Self::Only(Category::PortIn) => &Category::ALL[3..4],
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::All => 0,
            Self::Only(category) => category.mode(),
        }
    }
}

impl TryFrom<i32> for Mode {
    type Error = BenchError;

    fn try_from(mode: i32) -> Result<Self, BenchError> {
        match mode {
            0 => Ok(Self::All),
            _ => Category::ALL
                .into_iter()
                .find(|c| c.mode() == mode)
                .map(Self::Only)
                .ok_or(BenchError::InvalidMode(mode)),
        }
    }
}

/// Extracts the `mode` value from a module parameter string such as
/// `"mode=2"`. Other parameters are ignored; a missing `mode` means 0.
pub fn parse_mode_param(params: &str) -> Result<i32, BenchError> {
    let mut mode = 0;
    for param in params.split_whitespace() {
        if let Some(value) = param.strip_prefix("mode=") {
            mode = value.parse().map_err(|_| BenchError::InvalidParam)?;
        }
    }
    Ok(mode)
}
