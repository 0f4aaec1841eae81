// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Layout of the Guest-Host Communication Block and the per-exit field
//! encodings used for benchmark requests.
//!
//! The page itself is owned by whoever established it as shared memory with
//! the hypervisor. This module only fills requests into it and decodes the
//! hypervisor's reply. Running the exchange (interrupts, page ownership and
//! the VMGEXIT itself) is done by [`crate::context::snp`].

use crate::cpu::cpuid::CpuidResult;
use crate::error::BenchError;

use bitfield_struct::bitfield;
use core::fmt;
use core::mem::offset_of;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use zerocopy::FromZeros;

const GHCB_BUFFER_SIZE: usize = 0x7f0;

/// GHCB protocol version written with every request.
pub const GHCB_VERSION: u16 = 2;
/// Standard GHCB usage.
pub const GHCB_USAGE_STANDARD: u32 = 0;

macro_rules! ghcb_getter {
    ($name:ident, $field:ident,$t:ty) => {
        #[allow(unused)]
        pub(crate) fn $name(&self) -> Result<$t, GhcbError> {
            self.is_valid(offset_of!(Self, $field))
                .then(|| self.$field.load(Ordering::Relaxed))
                .ok_or(GhcbError::VmgexitInvalid)
        }
    };
}

macro_rules! ghcb_setter {
    ($name:ident, $field:ident, $t:ty) => {
        #[allow(unused)]
        pub(crate) fn $name(&self, val: $t) {
            self.$field.store(val, Ordering::Relaxed);
            self.set_valid(offset_of!(Self, $field));
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhcbError {
    // No communication page could be acquired for this CPU
    Unavailable,
    // A response from the hypervisor after VMGEXIT is invalid
    VmgexitInvalid,
    // A response from the hypervisor included an error code
    VmgexitError(u64, u64),
    // The hypervisor did not mark a result register as valid
    ResponseIncomplete(GhcbField),
}

impl From<GhcbError> for BenchError {
    fn from(e: GhcbError) -> Self {
        Self::Ghcb(e)
    }
}

impl fmt::Display for GhcbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "communication page unavailable"),
            Self::VmgexitInvalid => write!(f, "VMGEXIT response without valid exit info"),
            Self::VmgexitError(info1, info2) => write!(
                f,
                "VMGEXIT failed: exit_info_1={:#x} exit_info_2={:#x}",
                info1, info2
            ),
            Self::ResponseIncomplete(field) => {
                write!(f, "VMGEXIT response is missing {:?}", field)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
#[allow(clippy::upper_case_acronyms)]
pub enum GHCBExitCode {
    CPUID = 0x72,
    IOIO = 0x7b,
    MSR = 0x7c,
    VMMCALL = 0x81,
}

impl GHCBExitCode {
    pub fn from_raw(code: u64) -> Option<Self> {
        match code {
            0x72 => Some(Self::CPUID),
            0x7b => Some(Self::IOIO),
            0x7c => Some(Self::MSR),
            0x81 => Some(Self::VMMCALL),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GHCBIOSize {
    Size8,
    Size16,
    Size32,
}

/// Register fields of the save area a benchmark request may depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhcbField {
    Rax,
    Rbx,
    Rcx,
    Rdx,
}

impl GhcbField {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rax => "RAX",
            Self::Rbx => "RBX",
            Self::Rcx => "RCX",
            Self::Rdx => "RDX",
        }
    }
}

/// SW_EXITINFO1 encoding of an IOIO exit (AMD APM vol. 2, 15.10.2).
#[bitfield(u64)]
pub struct IoioExitInfo {
    /// 1 for IN, 0 for OUT
    pub type_in: bool,
    __: bool,
    pub string: bool,
    pub rep: bool,
    pub sz8: bool,
    pub sz16: bool,
    pub sz32: bool,
    pub a16: bool,
    pub a32: bool,
    pub a64: bool,
    #[bits(3)]
    pub seg: u8,
    #[bits(3)]
    __: u8,
    pub port: u16,
    #[bits(32)]
    __: u32,
}

impl IoioExitInfo {
    /// Exit info for a non-string `IN` of the given width issued from
    /// 64-bit code.
    pub fn port_in(port: u16, size: GHCBIOSize) -> Self {
        let info = Self::new().with_type_in(true).with_a64(true).with_port(port);
        match size {
            GHCBIOSize::Size8 => info.with_sz8(true),
            GHCBIOSize::Size16 => info.with_sz16(true),
            GHCBIOSize::Size32 => info.with_sz32(true),
        }
    }
}

/// Reply decoded from the GHCB after a successful exit.
///
/// `incomplete` names the first expected register the hypervisor did not mark
/// valid. `value` then holds whatever the page contained for that register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhcbReply<T> {
    pub value: T,
    pub incomplete: Option<GhcbField>,
}

impl<T> GhcbReply<T> {
    pub fn into_result(self) -> Result<T, GhcbError> {
        match self.incomplete {
            Some(field) => Err(GhcbError::ResponseIncomplete(field)),
            None => Ok(self.value),
        }
    }
}

#[repr(C)]
#[derive(Debug, FromZeros)]
#[allow(clippy::upper_case_acronyms)]
pub struct GHCB {
    reserved_1: [AtomicU8; 0xcb],
    cpl: AtomicU8,
    reserved_2: [AtomicU8; 0x74],
    xss: AtomicU64,
    reserved_3: [AtomicU8; 0x18],
    dr7: AtomicU64,
    reserved_4: [AtomicU8; 0x90],
    rax: AtomicU64,
    reserved_5: [AtomicU8; 0x100],
    reserved_6: AtomicU64,
    rcx: AtomicU64,
    rdx: AtomicU64,
    rbx: AtomicU64,
    reserved_7: AtomicU64,
    rbp: AtomicU64,
    rsi: AtomicU64,
    rdi: AtomicU64,
    r8: AtomicU64,
    r9: AtomicU64,
    r10: AtomicU64,
    r11: AtomicU64,
    r12: AtomicU64,
    r13: AtomicU64,
    r14: AtomicU64,
    r15: AtomicU64,
    reserved_8: [AtomicU8; 0x10],
    sw_exit_code: AtomicU64,
    sw_exit_info_1: AtomicU64,
    sw_exit_info_2: AtomicU64,
    sw_scratch: AtomicU64,
    reserved_9: [AtomicU8; 0x38],
    xcr0: AtomicU64,
    valid_bitmap: [AtomicU64; 2],
    x87_state_gpa: AtomicU64,
    reserved_10: [AtomicU8; 0x3f8],
    buffer: [AtomicU8; GHCB_BUFFER_SIZE],
    reserved_11: [AtomicU8; 0xa],
    version: AtomicU16,
    usage: AtomicU32,
}

impl GHCB {
    ghcb_getter!(get_cpl_valid, cpl, u8);
    ghcb_setter!(set_cpl_valid, cpl, u8);

    ghcb_getter!(get_rax_valid, rax, u64);
    ghcb_setter!(set_rax_valid, rax, u64);

    ghcb_getter!(get_rcx_valid, rcx, u64);
    ghcb_setter!(set_rcx_valid, rcx, u64);

    ghcb_getter!(get_rdx_valid, rdx, u64);
    ghcb_setter!(set_rdx_valid, rdx, u64);

    ghcb_getter!(get_rbx_valid, rbx, u64);
    ghcb_setter!(set_rbx_valid, rbx, u64);

    ghcb_getter!(get_rsi_valid, rsi, u64);
    ghcb_setter!(set_rsi_valid, rsi, u64);

    ghcb_getter!(get_exit_code_valid, sw_exit_code, u64);
    ghcb_setter!(set_exit_code_valid, sw_exit_code, u64);

    ghcb_getter!(get_exit_info_1_valid, sw_exit_info_1, u64);
    ghcb_setter!(set_exit_info_1_valid, sw_exit_info_1, u64);

    ghcb_getter!(get_exit_info_2_valid, sw_exit_info_2, u64);
    ghcb_setter!(set_exit_info_2_valid, sw_exit_info_2, u64);

    ghcb_getter!(get_version_valid, version, u16);
    ghcb_setter!(set_version_valid, version, u16);

    ghcb_getter!(get_usage_valid, usage, u32);
    ghcb_setter!(set_usage_valid, usage, u32);

    /// Invalidates every field of the page so nothing left over from an
    /// earlier exchange can be read back as part of the next one.
    pub fn clear(&self) {
        // Clear valid bitmap
        self.valid_bitmap[0].store(0, Ordering::Relaxed);
        self.valid_bitmap[1].store(0, Ordering::Relaxed);
        self.sw_exit_code.store(0, Ordering::Relaxed);
        self.sw_exit_info_1.store(0, Ordering::Relaxed);
        self.sw_exit_info_2.store(0, Ordering::Relaxed);

        // Mark valid_bitmap valid
        let off = offset_of!(Self, valid_bitmap);
        self.set_valid(off);
        self.set_valid(off + size_of::<u64>());
    }

    fn set_valid(&self, offset: usize) {
        let bit: usize = (offset >> 3) & 0x3f;
        let index: usize = (offset >> 9) & 0x1;
        let mask: u64 = 1 << bit;

        self.valid_bitmap[index].fetch_or(mask, Ordering::Relaxed);
    }

    fn is_valid(&self, offset: usize) -> bool {
        let bit: usize = (offset >> 3) & 0x3f;
        let index: usize = (offset >> 9) & 0x1;
        let mask: u64 = 1 << bit;

        (self.valid_bitmap[index].load(Ordering::Relaxed) & mask) == mask
    }

    fn field_offset(field: GhcbField) -> usize {
        match field {
            GhcbField::Rax => offset_of!(Self, rax),
            GhcbField::Rbx => offset_of!(Self, rbx),
            GhcbField::Rcx => offset_of!(Self, rcx),
            GhcbField::Rdx => offset_of!(Self, rdx),
        }
    }

    /// Value of `field`, or 0 when the hypervisor did not mark it valid.
    fn field_value(&self, field: GhcbField) -> u64 {
        if !self.is_valid(Self::field_offset(field)) {
            return 0;
        }
        let reg = match field {
            GhcbField::Rax => &self.rax,
            GhcbField::Rbx => &self.rbx,
            GhcbField::Rcx => &self.rcx,
            GhcbField::Rdx => &self.rdx,
        };
        reg.load(Ordering::Relaxed)
    }

    /// Returns the first of `fields` the hypervisor did not mark valid.
    pub fn first_invalid(&self, fields: &[GhcbField]) -> Option<GhcbField> {
        fields
            .iter()
            .copied()
            .find(|field| !self.is_valid(Self::field_offset(*field)))
    }

    /// Raw exit code of the pending request.
    pub fn exit_code(&self) -> u64 {
        self.sw_exit_code.load(Ordering::Relaxed)
    }

    /// Raw SW_EXITINFO1 of the pending request.
    pub fn exit_info_1(&self) -> u64 {
        self.sw_exit_info_1.load(Ordering::Relaxed)
    }

    fn set_exit(&self, exit_code: GHCBExitCode, exit_info_1: u64, exit_info_2: u64) {
        // GHCB is version 2
        self.set_version_valid(GHCB_VERSION);
        // GHCB Follows standard format
        self.set_usage_valid(GHCB_USAGE_STANDARD);
        self.set_exit_code_valid(exit_code as u64);
        self.set_exit_info_1_valid(exit_info_1);
        self.set_exit_info_2_valid(exit_info_2);
    }

    pub fn prepare_cpuid(&self, eax: u32, ecx: u32) {
        self.clear();
        self.set_rax_valid(eax.into());
        self.set_rcx_valid(ecx.into());
        self.set_exit(GHCBExitCode::CPUID, 0, 0);
    }

    pub fn prepare_rdmsr(&self, msr_index: u32) {
        self.clear();
        self.set_rcx_valid(msr_index.into());
        // exit_info_1 == 0 selects RDMSR
        self.set_exit(GHCBExitCode::MSR, 0, 0);
    }

    pub fn prepare_vmmcall(&self, nr: u32) {
        self.clear();
        self.set_rax_valid(nr.into());
        self.set_cpl_valid(0);
        // Hypercall arguments; the benchmarked calls take none.
        self.set_rbx_valid(0);
        self.set_rcx_valid(0);
        self.set_rdx_valid(0);
        self.set_rsi_valid(0);
        self.set_exit(GHCBExitCode::VMMCALL, 0, 0);
    }

    pub fn prepare_ioio_in(&self, port: u16, size: GHCBIOSize) {
        self.clear();
        let info = IoioExitInfo::port_in(port, size);
        self.set_exit(GHCBExitCode::IOIO, info.into_bits(), 0);
    }

    /// Checks the status the hypervisor reported for the last exit.
    pub fn exit_status(&self) -> Result<(), GhcbError> {
        let sw_exit_info_1 = self.get_exit_info_1_valid()?;
        if sw_exit_info_1 != 0 {
            return Err(GhcbError::VmgexitError(
                sw_exit_info_1,
                self.sw_exit_info_2.load(Ordering::Relaxed),
            ));
        }
        Ok(())
    }

    pub fn cpuid_reply(&self) -> GhcbReply<CpuidResult> {
        GhcbReply {
            value: CpuidResult {
                eax: self.field_value(GhcbField::Rax) as u32,
                ebx: self.field_value(GhcbField::Rbx) as u32,
                ecx: self.field_value(GhcbField::Rcx) as u32,
                edx: self.field_value(GhcbField::Rdx) as u32,
            },
            incomplete: self.first_invalid(&[
                GhcbField::Rax,
                GhcbField::Rbx,
                GhcbField::Rcx,
                GhcbField::Rdx,
            ]),
        }
    }

    pub fn rdmsr_reply(&self) -> GhcbReply<u64> {
        let eax = self.field_value(GhcbField::Rax) & 0xFFFF_FFFF;
        let edx = self.field_value(GhcbField::Rdx) & 0xFFFF_FFFF;
        GhcbReply {
            value: eax | (edx << 32),
            incomplete: self.first_invalid(&[GhcbField::Rax, GhcbField::Rdx]),
        }
    }

    pub fn vmmcall_reply(&self) -> GhcbReply<u64> {
        GhcbReply {
            value: self.field_value(GhcbField::Rax),
            incomplete: self.first_invalid(&[GhcbField::Rax]),
        }
    }

    pub fn ioio_in_reply(&self) -> GhcbReply<u8> {
        GhcbReply {
            value: (self.field_value(GhcbField::Rax) & 0xff) as u8,
            incomplete: self.first_invalid(&[GhcbField::Rax]),
        }
    }

    #[inline]
    #[cfg(test)]
    pub fn fill(&self, val: u8) {
        // SAFETY: All bytes in `Self` are part of an atomic integer type.
        // This allows us to cast `Self` to a slice of `AtomicU8`s.
        let bytes = unsafe {
            core::slice::from_raw_parts(self as *const _ as *const AtomicU8, size_of::<Self>())
        };
        for byte in bytes {
            byte.store(val, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    fn zeroed_ghcb() -> Box<GHCB> {
        GHCB::new_box_zeroed().expect("allocating GHCB")
    }

    #[test]
    fn test_ghcb_layout() {
        assert_eq!(offset_of!(GHCB, cpl), 0x0cb);
        assert_eq!(offset_of!(GHCB, xss), 0x140);
        assert_eq!(offset_of!(GHCB, dr7), 0x160);
        assert_eq!(offset_of!(GHCB, rax), 0x1f8);
        assert_eq!(offset_of!(GHCB, rcx), 0x308);
        assert_eq!(offset_of!(GHCB, rdx), 0x310);
        assert_eq!(offset_of!(GHCB, rbx), 0x318);
        assert_eq!(offset_of!(GHCB, rsi), 0x330);
        assert_eq!(offset_of!(GHCB, sw_exit_code), 0x390);
        assert_eq!(offset_of!(GHCB, sw_exit_info_1), 0x398);
        assert_eq!(offset_of!(GHCB, sw_exit_info_2), 0x3a0);
        assert_eq!(offset_of!(GHCB, sw_scratch), 0x3a8);
        assert_eq!(offset_of!(GHCB, xcr0), 0x3e8);
        assert_eq!(offset_of!(GHCB, valid_bitmap), 0x3f0);
        assert_eq!(offset_of!(GHCB, x87_state_gpa), 0x400);
        assert_eq!(offset_of!(GHCB, buffer), 0x800);
        assert_eq!(offset_of!(GHCB, version), 0xffa);
        assert_eq!(offset_of!(GHCB, usage), 0xffc);
        assert_eq!(size_of::<GHCB>(), 0x1000);
    }

    #[test]
    fn clear_drops_stale_state() {
        let ghcb = zeroed_ghcb();
        ghcb.fill(0xff);
        ghcb.clear();

        assert_eq!(ghcb.exit_code(), 0);
        assert_eq!(ghcb.get_rax_valid(), Err(GhcbError::VmgexitInvalid));
        assert_eq!(ghcb.exit_status(), Err(GhcbError::VmgexitInvalid));
        assert_eq!(
            ghcb.first_invalid(&[GhcbField::Rax, GhcbField::Rdx]),
            Some(GhcbField::Rax)
        );
    }

    #[test]
    fn cpuid_request_fields() {
        let ghcb = zeroed_ghcb();
        ghcb.prepare_cpuid(0x4000_0000, 0);

        assert_eq!(ghcb.get_exit_code_valid(), Ok(0x72));
        assert_eq!(ghcb.get_exit_info_1_valid(), Ok(0));
        assert_eq!(ghcb.get_exit_info_2_valid(), Ok(0));
        assert_eq!(ghcb.get_rax_valid(), Ok(0x4000_0000));
        assert_eq!(ghcb.get_rcx_valid(), Ok(0));
        assert_eq!(ghcb.get_version_valid(), Ok(GHCB_VERSION));
        assert_eq!(ghcb.get_usage_valid(), Ok(GHCB_USAGE_STANDARD));
        // Outputs are not inputs of a CPUID request
        assert!(ghcb.get_rbx_valid().is_err());
        assert!(ghcb.get_rdx_valid().is_err());
    }

    #[test]
    fn rdmsr_request_fields() {
        let ghcb = zeroed_ghcb();
        ghcb.prepare_rdmsr(0x1b);

        assert_eq!(ghcb.get_exit_code_valid(), Ok(0x7c));
        assert_eq!(ghcb.get_exit_info_1_valid(), Ok(0));
        assert_eq!(ghcb.get_rcx_valid(), Ok(0x1b));
        assert!(ghcb.get_rax_valid().is_err());
    }

    #[test]
    fn vmmcall_request_fields() {
        let ghcb = zeroed_ghcb();
        ghcb.prepare_vmmcall(2);

        assert_eq!(ghcb.get_exit_code_valid(), Ok(0x81));
        assert_eq!(ghcb.get_rax_valid(), Ok(2));
        assert_eq!(ghcb.get_cpl_valid(), Ok(0));
        assert_eq!(ghcb.get_rbx_valid(), Ok(0));
        assert_eq!(ghcb.get_rsi_valid(), Ok(0));
    }

    #[test]
    fn ioio_in_exit_info() {
        let ghcb = zeroed_ghcb();
        ghcb.prepare_ioio_in(0x40, GHCBIOSize::Size8);

        assert_eq!(ghcb.get_exit_code_valid(), Ok(0x7b));
        // TYPE_IN | SZ8 | A64 | port << 16
        assert_eq!(ghcb.get_exit_info_1_valid(), Ok(0x0040_0211));
        assert!(ghcb.get_rax_valid().is_err());

        let info = IoioExitInfo::from_bits(ghcb.exit_info_1());
        assert!(info.type_in());
        assert!(!info.string());
        assert_eq!(info.port(), 0x40);
        assert!(IoioExitInfo::port_in(0xa0, GHCBIOSize::Size32).sz32());
    }

    #[test]
    fn exit_status_reports_host_error() {
        let ghcb = zeroed_ghcb();
        ghcb.prepare_rdmsr(0x1b);
        ghcb.set_exit_info_1_valid(1);
        ghcb.set_exit_info_2_valid(0xd);

        assert_eq!(ghcb.exit_status(), Err(GhcbError::VmgexitError(1, 0xd)));
    }

    #[test]
    fn replies_decode_registers() {
        let ghcb = zeroed_ghcb();
        ghcb.prepare_rdmsr(0x1b);
        ghcb.set_exit_info_1_valid(0);
        ghcb.set_rax_valid(0xfee0_0900);
        ghcb.set_rdx_valid(0x1);

        let reply = ghcb.rdmsr_reply();
        assert_eq!(reply.incomplete, None);
        assert_eq!(reply.value, 0x1_fee0_0900);

        // RDX of the previous reply is still in the page but no longer valid
        ghcb.prepare_rdmsr(0x1b);
        ghcb.set_rax_valid(0x42);
        let reply = ghcb.rdmsr_reply();
        assert_eq!(reply.incomplete, Some(GhcbField::Rdx));
        assert_eq!(reply.value, 0x42);
        assert_eq!(
            reply.into_result(),
            Err(GhcbError::ResponseIncomplete(GhcbField::Rdx))
        );
    }
}
