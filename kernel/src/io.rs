// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use core::arch::asm;
use core::fmt::Debug;

/// Byte-wide port I/O. The default methods execute the instructions
/// directly; other implementations route them elsewhere (a recording port in
/// tests, a paravirtual channel in a protected guest).
pub trait IOPort: Sync + Debug {
    fn outb(&self, port: u16, value: u8) {
        // SAFETY: writing a byte to an I/O port does not touch memory. The
        // effect on the device is the caller's business.
        unsafe { asm!("outb %al, %dx", in("al") value, in("dx") port, options(att_syntax, nomem, nostack)) }
    }

    fn inb(&self, port: u16) -> u8 {
        // SAFETY: reading a byte from an I/O port does not touch memory.
        unsafe {
            let ret: u8;
            asm!("inb %dx, %al", in("dx") port, out("al") ret, options(att_syntax, nomem, nostack));
            ret
        }
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct DefaultIOPort {}

impl IOPort for DefaultIOPort {}

pub static DEFAULT_IO_DRIVER: DefaultIOPort = DefaultIOPort {};
