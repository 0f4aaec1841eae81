// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

use core::fmt::{self, Debug, Write};

/// Text output of the embedding environment (kernel log buffer, serial line,
/// stderr).
pub trait ConsoleSink: Sync + Debug {
    fn write_str(&self, s: &str);
}

struct SinkWriter<'a>(&'a dyn ConsoleSink);

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// `log` backend writing one line per record to a [`ConsoleSink`].
///
/// Info records are printed as `<name>: <message>`, which is the form the
/// report parser and the comparison tooling look for.
#[derive(Clone, Copy, Debug)]
pub struct ConsoleLogger {
    name: &'static str,
    sink: &'static dyn ConsoleSink,
}

impl ConsoleLogger {
    pub const fn new(name: &'static str, sink: &'static dyn ConsoleSink) -> Self {
        Self { name, sink }
    }

    fn print(&self, args: fmt::Arguments<'_>) {
        // SinkWriter never fails
        let _ = SinkWriter(self.sink).write_fmt(args);
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Log format/detail depends on the level.
        match record.metadata().level() {
            log::Level::Error | log::Level::Warn => {
                self.print(format_args!(
                    "{}: {}: {}\n",
                    self.name,
                    record.metadata().level().as_str(),
                    record.args()
                ));
            }

            log::Level::Info => {
                self.print(format_args!("{}: {}\n", self.name, record.args()));
            }

            log::Level::Debug | log::Level::Trace => {
                self.print(format_args!(
                    "[{}/{}] {} {}\n",
                    self.name,
                    record.metadata().target(),
                    record.metadata().level().as_str(),
                    record.args()
                ));
            }
        };
    }

    fn flush(&self) {}
}

/// Registers `logger` with the `log` crate.
pub fn install_console_logger(logger: &'static ConsoleLogger) -> Result<(), log::SetLoggerError> {
    if let Err(e) = log::set_logger(logger) {
        // Presumably something had installed another logger before. Nothing
        // of ours will appear at the console.
        logger.print(format_args!(
            "{}: ERROR: failed to install console logger: {:?}\n",
            logger.name, e,
        ));
        return Err(e);
    }

    // Log levels are to be configured via the log's library feature configuration.
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
