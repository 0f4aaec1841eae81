// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use crate::context::{Completion, ExecutionContext, Reply};
use crate::error::BenchError;

use core::fmt;
use core::hint::black_box;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Cpuid,
    Msr,
    Hypercall,
    PortIn,
}

impl Category {
    /// Every category, in the order a full run executes them.
    pub const ALL: [Category; 4] = [Self::Cpuid, Self::Msr, Self::Hypercall, Self::PortIn];

    /// Value of the `mode` parameter that selects only this category.
    pub fn mode(self) -> i32 {
        match self {
            Self::Cpuid => 1,
            Self::Msr => 2,
            Self::Hypercall => 3,
            Self::PortIn => 4,
        }
    }

    /// Whether the operations of this category fault outside ring 0.
    pub fn requires_kernel(self) -> bool {
        !matches!(self, Self::Cpuid)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cpuid => "cpuid",
            Self::Msr => "msr",
            Self::Hypercall => "hypercall",
            Self::PortIn => "pio",
        };
        f.write_str(name)
    }
}

/// Operation together with its argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpParam {
    Cpuid { leaf: u32, subleaf: u32 },
    Msr(u32),
    Hypercall(u32),
    PortIn(u16),
}

impl OpParam {
    pub fn category(&self) -> Category {
        match self {
            Self::Cpuid { .. } => Category::Cpuid,
            Self::Msr(_) => Category::Msr,
            Self::Hypercall(_) => Category::Hypercall,
            Self::PortIn(_) => Category::PortIn,
        }
    }

    fn op_name(&self) -> &'static str {
        match self {
            Self::Cpuid { .. } => "cpuid",
            Self::Msr(_) => "rdmsr",
            Self::Hypercall(_) => "hypercall",
            Self::PortIn(_) => "inb",
        }
    }
}

/// `<op>_<param>`: hypercall numbers and single-digit CPUID leaves in
/// decimal, everything else in lower-case hex.
impl fmt::Display for OpParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_", self.op_name())?;
        match *self {
            Self::Cpuid { leaf, .. } if leaf < 10 => write!(f, "{}", leaf)?,
            Self::Cpuid { leaf, .. } => write!(f, "{:#x}", leaf)?,
            Self::Msr(msr) => write!(f, "{:#x}", msr)?,
            Self::Hypercall(nr) => write!(f, "{}", nr)?,
            Self::PortIn(port) => write!(f, "{:#x}", port)?,
        }
        match *self {
            Self::Cpuid { subleaf, .. } if subleaf != 0 => write!(f, "_{:#x}", subleaf),
            _ => Ok(()),
        }
    }
}

/// Entry of the operation tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operation {
    pub param: OpParam,
    /// What is being read or called, for humans.
    pub note: &'static str,
}

impl Operation {
    pub const fn new(param: OpParam, note: &'static str) -> Self {
        Self { param, note }
    }

    pub fn category(&self) -> Category {
        self.param.category()
    }
}

/// Report name of `param` run in `ctx`: `<prefix>_<op>_<param>`.
pub fn op_name(ctx: &dyn ExecutionContext, param: OpParam) -> alloc::string::String {
    alloc::format!("{}_{}", ctx.kind().prefix(), param)
}

#[inline]
fn consume<T>(reply: Reply<T>) -> Completion {
    black_box(reply.value);
    reply.completion
}

/// Performs `param` once in `ctx`. The result value is consumed; only how
/// completely the host answered is returned.
#[inline]
pub fn invoke(ctx: &dyn ExecutionContext, param: OpParam) -> Result<Completion, BenchError> {
    let completion = match param {
        OpParam::Cpuid { leaf, subleaf } => consume(ctx.cpuid(leaf, subleaf)?),
        OpParam::Msr(msr) => consume(ctx.rdmsr(msr)?),
        OpParam::Hypercall(nr) => consume(ctx.hypercall(nr)?),
        OpParam::PortIn(port) => consume(ctx.inb(port)?),
    };
    Ok(completion)
}
