// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for simtest, a test runner for HDL test benches.
//!
//! The basic flow is:
//!
//! 1. Load a [`TestManifest`](list::TestManifest), which declares test benches and their cases.
//! 2. Select cases with a [`TestFilter`](test_filter::TestFilter).
//! 3. Partition the selection into simulation runs with a [`RunPlan`](plan::RunPlan).
//! 4. Execute the plan with a [`TestRunner`](runner::TestRunner), which drives a pool of
//!    [`Simulator`](simulator::Simulator) sessions.
//! 5. Display live events and persist the final [`Report`](reporter::Report) with a
//!    [`Reporter`](reporter::Reporter).

pub mod config;
pub mod errors;
pub mod helpers;
pub mod list;
pub mod output_dir;
pub mod plan;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod signal;
pub mod simulator;
pub mod test_filter;
#[cfg(test)]
mod test_helpers;
mod time;
