// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use core::arch::asm;

/// Leaf reporting the highest standard leaf and the vendor string.
pub const CPUID_VENDOR_LEAF: u32 = 0;
/// First leaf of the hypervisor range.
pub const CPUID_HYPERVISOR_LEAF: u32 = 0x4000_0000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl CpuidResult {
    pub fn get(cpuid_fn: u32, cpuid_subfn: u32) -> Self {
        let mut result_eax: u32;
        let mut result_ebx: u32;
        let mut result_ecx: u32;
        let mut result_edx: u32;
        // SAFETY: Inline assembly to execute the CPUID instruction which does
        // not change any state. Input registers (EAX, ECX) and output
        // registers (EAX, EBX, ECX, EDX) are safely managed.
        unsafe {
            asm!("push %rbx",
                 "cpuid",
                 "movl %ebx, %edi",
                 "pop %rbx",
                 in("eax") cpuid_fn,
                 in("ecx") cpuid_subfn,
                 lateout("eax") result_eax,
                 lateout("edi") result_ebx,
                 lateout("ecx") result_ecx,
                 lateout("edx") result_edx,
                 options(att_syntax));
        }
        Self {
            eax: result_eax,
            ebx: result_ebx,
            ecx: result_ecx,
            edx: result_edx,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuVendor {
    Amd,
    Intel,
    Other,
}

impl CpuVendor {
    /// Decodes the vendor string of CPUID leaf 0 (EBX, EDX, ECX).
    pub fn from_leaf0(leaf: &CpuidResult) -> Self {
        let mut id = [0u8; 12];
        id[0..4].copy_from_slice(&leaf.ebx.to_le_bytes());
        id[4..8].copy_from_slice(&leaf.edx.to_le_bytes());
        id[8..12].copy_from_slice(&leaf.ecx.to_le_bytes());
        match &id {
            b"AuthenticAMD" | b"HygonGenuine" => Self::Amd,
            b"GenuineIntel" => Self::Intel,
            _ => Self::Other,
        }
    }

    pub fn current() -> Self {
        Self::from_leaf0(&CpuidResult::get(CPUID_VENDOR_LEAF, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_strings() {
        let amd = CpuidResult {
            eax: 0x10,
            ebx: u32::from_le_bytes(*b"Auth"),
            edx: u32::from_le_bytes(*b"enti"),
            ecx: u32::from_le_bytes(*b"cAMD"),
        };
        assert_eq!(CpuVendor::from_leaf0(&amd), CpuVendor::Amd);

        let intel = CpuidResult {
            eax: 0x20,
            ebx: u32::from_le_bytes(*b"Genu"),
            edx: u32::from_le_bytes(*b"ineI"),
            ecx: u32::from_le_bytes(*b"ntel"),
        };
        assert_eq!(CpuVendor::from_leaf0(&intel), CpuVendor::Intel);
        assert_eq!(
            CpuVendor::from_leaf0(&CpuidResult::default()),
            CpuVendor::Other
        );
    }

    #[test]
    fn leaf0_on_this_cpu() {
        // CPUID is legal in user mode, so the host running the tests has a
        // max standard leaf of at least 1.
        let leaf0 = CpuidResult::get(CPUID_VENDOR_LEAF, 0);
        assert!(leaf0.eax >= 1);
        assert_eq!(CpuVendor::current(), CpuVendor::from_leaf0(&leaf0));
    }
}
