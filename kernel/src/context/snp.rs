// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Operations carried out as GHCB exchanges with the hypervisor.
//!
//! One exchange runs with interrupts disabled and the communication page
//! exclusively held:
//!
//! 1. disable interrupts
//! 2. acquire the page, or fail with [`GhcbError::Unavailable`]
//! 3. invalidate all fields of the page
//! 4. write the request
//! 5. VMGEXIT and check the hypervisor's status
//! 6. check that the reply registers are marked valid
//! 7. release the page and restore interrupts
//!
//! A reply with missing registers is not treated as a failure. The missing
//! registers read as zero and the reply is marked partial; the runner counts
//! and logs it per measured operation.

use super::{Completion, ContextKind, ExecutionContext, Reply};
use crate::cpu::cpuid::CpuidResult;
use crate::cpu::irq_state::IrqGuard;
use crate::cpu::msr::{write_msr, SEV_GHCB};
use crate::error::BenchError;
use crate::sev::ghcb::{GHCBIOSize, GhcbError, GhcbReply, GHCB};
use crate::sev::utils::raw_vmgexit;

use core::fmt::Debug;
use core::ops::Deref;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};

/// Access to the GHCB of the current CPU and to the exit into the
/// hypervisor.
pub trait GhcbChannel: Debug {
    /// Keeps interrupts disabled while alive.
    type IrqGuard;

    fn irq_guard(&self) -> Self::IrqGuard;

    /// Takes exclusive ownership of the page, if it is available.
    fn acquire(&self) -> Option<&GHCB>;

    /// Gives the page back after [`GhcbChannel::acquire`].
    fn release(&self);

    /// Hands the page to the hypervisor and returns once it has replied.
    fn vmgexit(&self, ghcb: &GHCB) -> Result<(), GhcbError>;
}

/// Acquired GHCB, released when dropped.
#[derive(Debug)]
pub struct GhcbHandle<'a, C: GhcbChannel + ?Sized> {
    channel: &'a C,
    ghcb: &'a GHCB,
}

impl<'a, C: GhcbChannel + ?Sized> GhcbHandle<'a, C> {
    pub fn acquire(channel: &'a C) -> Result<Self, GhcbError> {
        let ghcb = channel.acquire().ok_or(GhcbError::Unavailable)?;
        Ok(Self { channel, ghcb })
    }
}

impl<C: GhcbChannel + ?Sized> Deref for GhcbHandle<'_, C> {
    type Target = GHCB;

    fn deref(&self) -> &GHCB {
        self.ghcb
    }
}

impl<C: GhcbChannel + ?Sized> Drop for GhcbHandle<'_, C> {
    fn drop(&mut self) {
        self.channel.release();
    }
}

/// [`GhcbChannel`] over a single page that the embedder has already shared
/// with the hypervisor. Meant for one CPU; a second concurrent user finds the
/// page unavailable.
#[derive(Debug)]
pub struct StaticGhcbChannel {
    page: AtomicPtr<GHCB>,
    gpa: AtomicU64,
    in_use: AtomicBool,
}

impl StaticGhcbChannel {
    pub const fn new() -> Self {
        Self {
            page: AtomicPtr::new(ptr::null_mut()),
            gpa: AtomicU64::new(0),
            in_use: AtomicBool::new(false),
        }
    }

    /// Makes `page` available to benchmark exchanges.
    ///
    /// # Safety
    ///
    /// `page` must be mapped shared (unencrypted) for the rest of the
    /// program's lifetime and `gpa` must be its guest physical address.
    pub unsafe fn register(&self, page: &'static GHCB, gpa: u64) {
        self.gpa.store(gpa, Ordering::Relaxed);
        self.page
            .store(ptr::from_ref(page).cast_mut(), Ordering::Release);
    }
}

impl Default for StaticGhcbChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl GhcbChannel for StaticGhcbChannel {
    type IrqGuard = IrqGuard;

    fn irq_guard(&self) -> IrqGuard {
        IrqGuard::new()
    }

    fn acquire(&self) -> Option<&GHCB> {
        let page = self.page.load(Ordering::Acquire);
        if page.is_null() || self.in_use.swap(true, Ordering::Acquire) {
            return None;
        }
        // SAFETY: a non-null page was registered as a 'static GHCB.
        Some(unsafe { &*page })
    }

    fn release(&self) {
        self.in_use.store(false, Ordering::Release);
    }

    fn vmgexit(&self, _ghcb: &GHCB) -> Result<(), GhcbError> {
        // SAFETY: the GHCB MSR is pointed at the registered page, which the
        // caller holds. Interrupts are disabled for the whole exchange, so
        // nothing can repoint the MSR before the exit.
        unsafe {
            write_msr(SEV_GHCB, self.gpa.load(Ordering::Relaxed));
            raw_vmgexit();
        }
        Ok(())
    }
}

impl<T> From<GhcbReply<T>> for Reply<T> {
    fn from(reply: GhcbReply<T>) -> Self {
        Self {
            value: reply.value,
            completion: reply
                .incomplete
                .map_or(Completion::Full, |field| Completion::Partial(field.name())),
        }
    }
}

/// [`ExecutionContext`] issuing every operation through a GHCB exchange.
#[derive(Debug)]
pub struct SnpContext<C> {
    channel: C,
}

impl<C: GhcbChannel> SnpContext<C> {
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    fn exchange<T, P, R>(&self, prepare: P, reply: R) -> Result<Reply<T>, BenchError>
    where
        P: FnOnce(&GHCB),
        R: FnOnce(&GHCB) -> GhcbReply<T>,
    {
        // The handle is declared last so it is released before interrupts
        // come back on.
        let _irq = self.channel.irq_guard();
        let handle = GhcbHandle::acquire(&self.channel)?;
        let ghcb: &GHCB = &handle;

        prepare(ghcb);
        self.channel.vmgexit(ghcb)?;
        ghcb.exit_status()?;

        Ok(reply(ghcb).into())
    }
}

impl<C: GhcbChannel> ExecutionContext for SnpContext<C> {
    fn kind(&self) -> ContextKind {
        ContextKind::Snp
    }

    fn cpuid(&self, leaf: u32, subleaf: u32) -> Result<Reply<CpuidResult>, BenchError> {
        self.exchange(|ghcb| ghcb.prepare_cpuid(leaf, subleaf), GHCB::cpuid_reply)
    }

    fn rdmsr(&self, msr: u32) -> Result<Reply<u64>, BenchError> {
        self.exchange(|ghcb| ghcb.prepare_rdmsr(msr), GHCB::rdmsr_reply)
    }

    fn hypercall(&self, nr: u32) -> Result<Reply<u64>, BenchError> {
        self.exchange(|ghcb| ghcb.prepare_vmmcall(nr), GHCB::vmmcall_reply)
    }

    fn inb(&self, port: u16) -> Result<Reply<u8>, BenchError> {
        self.exchange(
            |ghcb| ghcb.prepare_ioio_in(port, GHCBIOSize::Size8),
            GHCB::ioio_in_reply,
        )
    }
}
