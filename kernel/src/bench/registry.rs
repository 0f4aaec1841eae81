// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Static tables of the benchmarked operations and their binding to the
//! execution contexts of a build.

use super::mode::Mode;
use super::operation::{invoke, op_name, Category, OpParam, Operation};
use super::runner::Benchmarkable;
use crate::context::{Completion, ExecutionContext};
use crate::cpu::cpuid::CPUID_HYPERVISOR_LEAF;
use crate::cpu::msr::{MSR_FS_BASE, MSR_IA32_APIC_BASE};
use crate::error::BenchError;

use alloc::string::String;
use alloc::vec::Vec;

/// KVM_HC_FEATURES. Deprecated, KVM answers -KVM_ENOSYS.
pub const KVM_HC_FEATURES: u32 = 2;

pub static CPUID_OPS: [Operation; 4] = [
    Operation::new(OpParam::Cpuid { leaf: 0x0, subleaf: 0 }, "vendor"),
    Operation::new(OpParam::Cpuid { leaf: 0x1, subleaf: 0 }, "features"),
    Operation::new(
        OpParam::Cpuid { leaf: 0xb, subleaf: 0 },
        "extended topology",
    ),
    Operation::new(
        OpParam::Cpuid {
            leaf: CPUID_HYPERVISOR_LEAF,
            subleaf: 0,
        },
        "hypervisor",
    ),
];

pub static MSR_OPS: [Operation; 2] = [
    Operation::new(OpParam::Msr(MSR_IA32_APIC_BASE), "IA32_APIC_BASE"),
    Operation::new(OpParam::Msr(MSR_FS_BASE), "IA32_FS_BASE"),
];

pub static HYPERCALL_OPS: [Operation; 1] = [Operation::new(
    OpParam::Hypercall(KVM_HC_FEATURES),
    "KVM_HC_FEATURES",
)];

pub static PORT_IN_OPS: [Operation; 3] = [
    Operation::new(OpParam::PortIn(0x40), "PIT"),
    Operation::new(OpParam::PortIn(0x70), "CMOS"),
    Operation::new(OpParam::PortIn(0xa0), "PIC 2"),
];

pub fn operations(category: Category) -> &'static [Operation] {
    match category {
        Category::Cpuid => &CPUID_OPS,
        Category::Msr => &MSR_OPS,
        Category::Hypercall => &HYPERCALL_OPS,
        Category::PortIn => &PORT_IN_OPS,
    }
}

/// An operation bound to the context it runs in.
#[derive(Debug)]
pub struct BoundOperation<'a> {
    name: String,
    param: OpParam,
    ctx: &'a dyn ExecutionContext,
}

impl<'a> BoundOperation<'a> {
    pub fn new(ctx: &'a dyn ExecutionContext, param: OpParam) -> Self {
        Self {
            name: op_name(ctx, param),
            param,
            ctx,
        }
    }

    pub fn param(&self) -> OpParam {
        self.param
    }

    pub fn context(&self) -> &'a dyn ExecutionContext {
        self.ctx
    }
}

impl Benchmarkable for BoundOperation<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn run_once(&self) -> Result<Completion, BenchError> {
        invoke(self.ctx, self.param)
    }
}

/// Operations of one category, in run order.
#[derive(Debug)]
pub struct CategoryPlan<'a> {
    pub category: Category,
    pub operations: Vec<BoundOperation<'a>>,
}

/// Binds every table entry of the categories selected by `mode` to every
/// context, contexts in the order given.
pub fn resolve<'a>(mode: Mode, contexts: &[&'a dyn ExecutionContext]) -> Vec<CategoryPlan<'a>> {
    mode.categories()
        .iter()
        .map(|&category| CategoryPlan {
            category,
            operations: contexts
                .iter()
                .flat_map(|&ctx| {
                    operations(category)
                        .iter()
                        .map(move |op| BoundOperation::new(ctx, op.param))
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::operation::tests::RecordingContext;
    use crate::context::ContextKind;
    use std::vec::Vec;

    #[test]
    fn tables_match_categories() {
        for category in Category::ALL {
            let ops = operations(category);
            assert!(!ops.is_empty());
            assert!(ops.iter().all(|op| op.category() == category));
        }
    }

    #[test]
    fn resolve_all_binds_every_context() {
        let native = RecordingContext::new(ContextKind::Native);
        let tdx = RecordingContext::new(ContextKind::Tdx);
        let contexts: [&dyn ExecutionContext; 2] = [&native, &tdx];

        let plan = resolve(Mode::All, &contexts);
        let categories: Vec<Category> = plan.iter().map(|p| p.category).collect();
        assert_eq!(categories, Category::ALL);

        let msr: Vec<&str> = plan[1].operations.iter().map(|op| op.name()).collect();
        assert_eq!(
            msr,
            [
                "_rdmsr_0x1b",
                "_rdmsr_0xc0000100",
                "tdx_rdmsr_0x1b",
                "tdx_rdmsr_0xc0000100"
            ]
        );

        let total: usize = plan.iter().map(|p| p.operations.len()).sum();
        assert_eq!(total, 2 * (4 + 2 + 1 + 3));
    }

    #[test]
    fn resolve_one_category() {
        let native = RecordingContext::new(ContextKind::Native);
        let contexts: [&dyn ExecutionContext; 1] = [&native];

        let plan = resolve(Mode::Only(Category::PortIn), &contexts);
        assert_eq!(plan.len(), 1);
        let names: Vec<&str> = plan[0].operations.iter().map(|op| op.name()).collect();
        assert_eq!(names, ["_inb_0x40", "_inb_0x70", "_inb_0xa0"]);

        plan[0].operations[2].run_once().unwrap();
        assert_eq!(*native.calls.borrow(), [OpParam::PortIn(0xa0)]);
    }
}
