// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025 vmbench contributors

mod cmd_options;
mod compare;
mod logs;
mod run;
mod user;

use clap::Parser;
use cmd_options::{single_operation, CmdOptions, Commands};
use std::io::Write;
use vmbench::bench::report::LOG_NAME;
use vmbench::console::{install_console_logger, ConsoleLogger, ConsoleSink};

#[derive(Debug)]
struct StderrSink;

impl ConsoleSink for StderrSink {
    fn write_str(&self, s: &str) {
        let _ = std::io::stderr().lock().write_all(s.as_bytes());
    }
}

static STDERR_SINK: StderrSink = StderrSink;
static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger::new(LOG_NAME, &STDERR_SINK);

fn main() -> anyhow::Result<()> {
    let options = CmdOptions::parse();

    install_console_logger(&CONSOLE_LOGGER)?;
    log::set_max_level(if options.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    match options.command {
        Commands::Run {
            mode,
            warmup,
            iterations,
            samples,
            cpu,
            leaf,
            subleaf,
            msr,
        } => {
            let results = run::run_command(&run::RunOptions {
                mode,
                warmup,
                iterations,
                samples: samples.as_deref(),
                cpu,
                single: single_operation(leaf, subleaf, msr),
            })?;
            for result in results.iter() {
                println!("{}", result);
            }
        }
        Commands::Parse { log: path, json } => logs::parse_command(&path, json)?,
        Commands::Compare {
            baseline,
            cvm,
            prefix,
            json,
        } => compare::compare_command(&baseline, &cvm, prefix, json)?,
    }

    Ok(())
}
