// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Native context of a user process. CPUID is executed directly and MSRs
//! are read through the msr driver. Everything else needs ring 0.

use anyhow::Context;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use vmbench::bench::Category;
use vmbench::context::{ContextKind, ExecutionContext, Reply};
use vmbench::cpu::cpuid::CpuidResult;
use vmbench::BenchError;

/// Character device of the msr driver. Reading 8 bytes at offset `index`
/// returns the MSR with that index on the device's CPU.
#[derive(Debug)]
pub struct MsrDevice {
    file: File,
    path: PathBuf,
}

impl MsrDevice {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn for_cpu(cpu: u32) -> anyhow::Result<Self> {
        Self::open(&PathBuf::from(format!("/dev/cpu/{}/msr", cpu)))
    }

    pub fn read(&self, msr: u32) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.file.read_exact_at(&mut buf, u64::from(msr))?;
        Ok(u64::from_le_bytes(buf))
    }
}

#[derive(Debug, Default)]
pub struct UserContext {
    msr: Option<MsrDevice>,
}

impl UserContext {
    pub fn new(msr: Option<MsrDevice>) -> Self {
        Self { msr }
    }

    /// Whether operations of `category` can be carried out.
    pub fn supports(&self, category: Category) -> bool {
        match category {
            Category::Msr => self.msr.is_some(),
            other => !other.requires_kernel(),
        }
    }
}

impl ExecutionContext for UserContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Native
    }

    fn cpuid(&self, leaf: u32, subleaf: u32) -> Result<Reply<CpuidResult>, BenchError> {
        Ok(Reply::full(CpuidResult::get(leaf, subleaf)))
    }

    fn rdmsr(&self, msr: u32) -> Result<Reply<u64>, BenchError> {
        let dev = self.msr.as_ref().ok_or(BenchError::Unsupported)?;
        dev.read(msr).map(Reply::full).map_err(|e| {
            log::debug!("{}: MSR {:#x}: {}", dev.path.display(), msr, e);
            BenchError::Unsupported
        })
    }

    fn hypercall(&self, _nr: u32) -> Result<Reply<u64>, BenchError> {
        Err(BenchError::Unsupported)
    }

    fn inb(&self, _port: u16) -> Result<Reply<u8>, BenchError> {
        Err(BenchError::Unsupported)
    }
}
