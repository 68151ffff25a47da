// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for simtest.
//!
//! The main structure in this module is [`SimtestConfig`].

mod elements;
mod imp;

pub use elements::*;
pub use imp::*;
