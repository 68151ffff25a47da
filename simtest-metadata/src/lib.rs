// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to simtest's machine-readable output.
//!
//! This crate is shared between the `simtest` binary and anything that wants to consume its
//! output: the documented process exit codes, and the JSON form of `simtest list -T json`.

mod exit_codes;
mod test_list;

pub use exit_codes::*;
pub use test_list::*;
