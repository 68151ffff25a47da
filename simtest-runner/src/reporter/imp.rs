// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out test events and persists the final report.
//!
//! The main structure in this module is [`Reporter`].

use super::{
    aggregator::Report,
    displayer::TestDisplayer,
    events::TestEvent,
    xunit::{ReportSink, XunitSink},
};
use crate::errors::{ReportWriteError, WriteEventError};
use camino::Utf8PathBuf;
use std::io::{BufWriter, Write};

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    should_colorize: bool,
    verbose: bool,
    xunit_path: Option<Utf8PathBuf>,
}

impl ReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Sets the path the xunit report is written to.
    pub fn set_xunit_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.xunit_path = Some(path.into());
        self
    }

    /// Creates a new reporter writing live output to `output`.
    pub fn build<'a>(&self, output: ReporterStderr<'a>) -> Reporter<'a> {
        let mut sinks: Vec<Box<dyn ReportSink + Send + Sync>> = Vec::new();
        if let Some(path) = &self.xunit_path {
            sinks.push(Box::new(XunitSink::new(path.clone())));
        }

        Reporter {
            displayer: TestDisplayer::new(self.should_colorize, self.verbose),
            stderr: output,
            sinks,
        }
    }
}

/// Prints live events, and persists the [`Report`] once the run is done.
pub struct Reporter<'a> {
    displayer: TestDisplayer,
    stderr: ReporterStderr<'a>,
    sinks: Vec<Box<dyn ReportSink + Send + Sync>>,
}

impl Reporter<'_> {
    /// Report a live test event.
    pub fn report_event(&mut self, event: TestEvent<'_>) -> Result<(), WriteEventError> {
        match &mut self.stderr {
            ReporterStderr::Terminal => {
                let mut writer = BufWriter::new(std::io::stderr());
                self.displayer.write_event(&event, &mut writer)?;
                writer.flush()?;
            }
            ReporterStderr::Buffer(buf) => self.displayer.write_event(&event, &mut **buf)?,
        }
        Ok(())
    }

    /// Persists the report to every sink, then returns the process exit code.
    ///
    /// Given the same report, this always writes the same output and returns the same code.
    pub fn finalize(&self, report: &Report) -> Result<i32, ReportWriteError> {
        for sink in &self.sinks {
            sink.write_report(report)?;
        }
        Ok(report.exit_code())
    }
}
