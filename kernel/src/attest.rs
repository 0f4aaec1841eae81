// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

//! Timing of the attestation flow of a confidential guest.
//!
//! Report and quote generation live in a vendor SDK. This module only
//! defines the calls it needs from it and measures them.

use crate::cpu::tsc::WallClock;
use crate::error::BenchError;
use core::fmt;

/// Size of the caller-supplied report data.
pub const REPORT_DATA_SIZE: usize = 64;
/// Size of a TDREPORT.
pub const REPORT_SIZE: usize = 1024;
/// Size of a runtime measurement register extension.
pub const RTMR_EXTEND_SIZE: usize = 48;

/// Runtime measurement registers extended after the quote is generated.
pub const EXTENDED_RTMRS: [u32; 2] = [2, 3];

/// Value every extended register is extended with.
pub const RTMR_EXTEND_VALUE: [u8; RTMR_EXTEND_SIZE] = [0x01; RTMR_EXTEND_SIZE];

/// Failures reported by the SDK, each with the SDK status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttestError {
    Report(u32),
    Quote(u32),
    Extend { index: u32, status: u32 },
}

impl From<AttestError> for BenchError {
    fn from(e: AttestError) -> Self {
        Self::Attest(e)
    }
}

impl fmt::Display for AttestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report(status) => write!(f, "failed to get the report (status {:#x})", status),
            Self::Quote(status) => write!(f, "failed to get the quote (status {:#x})", status),
            Self::Extend { index, status } => {
                write!(f, "failed to extend RTMR{} (status {:#x})", index, status)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report(pub [u8; REPORT_SIZE]);

impl Default for Report {
    fn default() -> Self {
        Self([0; REPORT_SIZE])
    }
}

/// Calls consumed from the attestation SDK. All of them block.
pub trait AttestationSdk {
    /// Quote buffer owned by the SDK, released on drop.
    type Quote: AsRef<[u8]>;

    fn get_report(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> Result<Report, AttestError>;

    fn get_quote(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> Result<Self::Quote, AttestError>;

    fn extend_rtmr(&self, index: u32, data: &[u8; RTMR_EXTEND_SIZE]) -> Result<(), AttestError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestationTimes {
    pub report_ns: u64,
    pub quote_ns: u64,
    pub quote_len: usize,
    /// Outcome of extending each register in [`EXTENDED_RTMRS`].
    pub extends: [(u32, Result<(), AttestError>); EXTENDED_RTMRS.len()],
}

impl AttestationTimes {
    pub fn extend_failures(&self) -> usize {
        self.extends.iter().filter(|(_, r)| r.is_err()).count()
    }
}

fn timed<W: WallClock, T>(clock: &W, f: impl FnOnce() -> T) -> (T, u64) {
    let start = clock.now_ns();
    let out = f();
    let end = clock.now_ns();
    (out, end.saturating_sub(start))
}

/// Times report and quote generation for `report_data`, then extends the
/// registers in [`EXTENDED_RTMRS`]. A failed extension is logged and
/// recorded in the result.
pub fn measure_attestation<S, W>(
    sdk: &S,
    clock: &W,
    report_data: &[u8; REPORT_DATA_SIZE],
) -> Result<AttestationTimes, BenchError>
where
    S: AttestationSdk + ?Sized,
    W: WallClock,
{
    let (report, report_ns) = timed(clock, || sdk.get_report(report_data));
    report.inspect_err(|e| log::error!("{}", e))?;

    let (quote, quote_ns) = timed(clock, || sdk.get_quote(report_data));
    let quote = quote.inspect_err(|e| log::error!("{}", e))?;
    let quote_len = quote.as_ref().len();
    log::info!("Got a {} byte quote", quote_len);

    let extends = EXTENDED_RTMRS.map(|index| {
        let result = sdk.extend_rtmr(index, &RTMR_EXTEND_VALUE);
        match result {
            Ok(()) => log::info!("Extended RTMR{}", index),
            Err(e) => log::warn!("{}", e),
        }
        (index, result)
    });

    drop(quote);

    log::info!("get_report: {} ns", report_ns);
    log::info!("get_quote: {} ns", quote_ns);

    Ok(AttestationTimes {
        report_ns,
        quote_ns,
        quote_len,
        extends,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::runner::tests::StepCounter;
    use core::cell::{Cell, RefCell};
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Default)]
    struct FakeSdk {
        fail_report: bool,
        fail_quote: bool,
        fail_extend: Option<u32>,
        calls: Cell<u32>,
        extended: RefCell<Vec<(u32, [u8; RTMR_EXTEND_SIZE])>>,
        released: Cell<u32>,
    }

    #[derive(Debug)]
    struct FakeQuote<'a> {
        data: Vec<u8>,
        released: &'a Cell<u32>,
    }

    impl AsRef<[u8]> for FakeQuote<'_> {
        fn as_ref(&self) -> &[u8] {
            &self.data
        }
    }

    impl Drop for FakeQuote<'_> {
        fn drop(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    impl<'a> AttestationSdk for &'a FakeSdk {
        type Quote = FakeQuote<'a>;

        fn get_report(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> Result<Report, AttestError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_report {
                return Err(AttestError::Report(0x8));
            }
            let mut report = Report::default();
            report.0[..REPORT_DATA_SIZE].copy_from_slice(report_data);
            Ok(report)
        }

        fn get_quote(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> Result<FakeQuote<'a>, AttestError> {
            let sdk: &'a FakeSdk = *self;
            sdk.calls.set(sdk.calls.get() + 1);
            if sdk.fail_quote {
                return Err(AttestError::Quote(0xb));
            }
            Ok(FakeQuote {
                data: vec![report_data[0]; 5000],
                released: &sdk.released,
            })
        }

        fn extend_rtmr(&self, index: u32, data: &[u8; RTMR_EXTEND_SIZE]) -> Result<(), AttestError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_extend == Some(index) {
                return Err(AttestError::Extend { index, status: 0x1 });
            }
            self.extended.borrow_mut().push((index, *data));
            Ok(())
        }
    }

    #[test]
    fn full_flow() {
        let sdk = FakeSdk::default();
        let clock = StepCounter::new(100);

        let times = measure_attestation(&&sdk, &clock, &[0x5a; REPORT_DATA_SIZE]).unwrap();
        assert_eq!(times.report_ns, 100);
        assert_eq!(times.quote_ns, 100);
        assert_eq!(times.quote_len, 5000);
        assert_eq!(times.extend_failures(), 0);
        assert_eq!(
            *sdk.extended.borrow(),
            [(2, [0x01; RTMR_EXTEND_SIZE]), (3, [0x01; RTMR_EXTEND_SIZE])]
        );
        assert_eq!(sdk.released.get(), 1);
    }

    #[test]
    fn extend_failure_is_recorded() {
        let sdk = FakeSdk {
            fail_extend: Some(2),
            ..Default::default()
        };
        let clock = StepCounter::new(1);

        let times = measure_attestation(&&sdk, &clock, &[0; REPORT_DATA_SIZE]).unwrap();
        assert_eq!(times.extend_failures(), 1);
        assert_eq!(
            times.extends,
            [
                (2, Err(AttestError::Extend { index: 2, status: 0x1 })),
                (3, Ok(()))
            ]
        );
        assert_eq!(sdk.extended.borrow().len(), 1);
    }

    #[test]
    fn report_failure_stops_the_flow() {
        let sdk = FakeSdk {
            fail_report: true,
            ..Default::default()
        };
        let clock = StepCounter::new(1);

        let err = measure_attestation(&&sdk, &clock, &[0; REPORT_DATA_SIZE]).unwrap_err();
        assert_eq!(err, BenchError::Attest(AttestError::Report(0x8)));
        assert_eq!(sdk.calls.get(), 1);
    }

    #[test]
    fn quote_failure_skips_extends() {
        let sdk = FakeSdk {
            fail_quote: true,
            ..Default::default()
        };
        let clock = StepCounter::new(1);

        assert!(measure_attestation(&&sdk, &clock, &[0; REPORT_DATA_SIZE]).is_err());
        assert!(sdk.extended.borrow().is_empty());
        assert_eq!(sdk.released.get(), 0);
    }
}
