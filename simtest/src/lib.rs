// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A test runner for HDL test benches.
//!
//! `simtest` reads a manifest of test benches, selects cases by name pattern, and runs them on a
//! pool of simulator sessions. Results are printed live and persisted as an xunit report.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
