// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting for simtest runs: live output while the run progresses, and the final report.

mod aggregator;
mod displayer;
pub mod events;
mod imp;
mod xunit;

pub use aggregator::{Report, ReportEntry};
pub(crate) use aggregator::ReportAggregator;
pub use imp::*;
pub use xunit::{ReportSink, XunitSink};
