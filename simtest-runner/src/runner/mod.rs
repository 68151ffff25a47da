// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`].

mod dispatcher;
mod imp;
mod internal_events;

use dispatcher::*;
pub use imp::*;
use internal_events::*;
