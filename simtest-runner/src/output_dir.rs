// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preparing the output directory simulators write into.

use crate::errors::OutputDirError;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tracing::debug;

/// Creates the output directory. If `clean` is true, removes any existing contents first.
///
/// Returns the canonical path to the directory. Relative paths are resolved against the current
/// directory.
pub fn prepare(path: &Utf8Path, clean: bool) -> Result<Utf8PathBuf, OutputDirError> {
    if clean {
        match std::fs::remove_dir_all(path) {
            Ok(()) => debug!("removed output directory {path}"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(OutputDirError::Clean {
                    path: path.to_owned(),
                    error,
                });
            }
        }
    }

    std::fs::create_dir_all(path).map_err(|error| OutputDirError::Create {
        path: path.to_owned(),
        error,
    })?;
    path.canonicalize_utf8()
        .map_err(|error| OutputDirError::Canonicalize {
            path: path.to_owned(),
            error,
        })
        .inspect(|canonical| debug!("prepared output directory {canonical}"))
}
