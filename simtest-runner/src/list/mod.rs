// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for building and querying the registry of declared test cases.
//!
//! The registry is read from a [`TestManifest`], and a [`Selection`] is a subset of it.

mod manifest;
mod registry;
mod selection;

pub use manifest::*;
pub use registry::*;
pub use selection::*;
