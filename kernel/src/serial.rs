// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use crate::console::ConsoleSink;
use crate::io::{IOPort, DEFAULT_IO_DRIVER};

pub const SERIAL_PORT: u16 = 0x3f8;
const BAUD: u32 = 9600;
const DLAB: u8 = 0x80;

pub const TXR: u16 = 0; // Transmit register
pub const IER: u16 = 1; // Interrupt enable
pub const FCR: u16 = 2; // FIFO Control
pub const LCR: u16 = 3; // Line Control
pub const MCR: u16 = 4; // Modem Control
pub const LSR: u16 = 5; // Line Status
pub const DLL: u16 = 0; // Divisor Latch Low
pub const DLH: u16 = 1; // Divisor Latch High

pub const XMTRDY: u8 = 0x20;

/// 16550 UART used as a write-only console.
#[derive(Debug, Copy, Clone)]
pub struct SerialPort<'a> {
    driver: &'a dyn IOPort,
    port: u16,
}

impl<'a> SerialPort<'a> {
    pub const fn new(driver: &'a dyn IOPort, p: u16) -> Self {
        SerialPort { driver, port: p }
    }

    pub fn init(&self) {
        let divisor: u32 = 115200 / BAUD;

        self.outb(LCR, 0x3); // 8n1
        self.outb(IER, 0x0); // No Interrupt
        self.outb(FCR, 0x0); // No FIFO
        self.outb(MCR, 0x3); // DTR + RTS

        let c = self.inb(LCR);
        self.outb(LCR, c | DLAB);
        self.outb(DLL, (divisor & 0xff) as u8);
        self.outb(DLH, ((divisor >> 8) & 0xff) as u8);
        self.outb(LCR, c & !DLAB);
    }

    pub fn put_byte(&self, ch: u8) {
        loop {
            let xmt = self.inb(LSR);
            if (xmt & XMTRDY) == XMTRDY {
                break;
            }
        }

        self.outb(TXR, ch)
    }

    #[inline]
    fn inb(&self, port: u16) -> u8 {
        self.driver.inb(self.port + port)
    }

    #[inline]
    fn outb(&self, port: u16, val: u8) {
        self.driver.outb(self.port + port, val);
    }
}

impl ConsoleSink for SerialPort<'_> {
    fn write_str(&self, s: &str) {
        for b in s.bytes() {
            if b == b'\n' {
                self.put_byte(b'\r');
            }
            self.put_byte(b);
        }
    }
}

pub static DEFAULT_SERIAL_PORT: SerialPort<'_> = SerialPort::new(&DEFAULT_IO_DRIVER, SERIAL_PORT);
