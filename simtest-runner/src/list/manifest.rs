// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{TestBenchDecl, TestRegistry};
use crate::errors::ManifestReadError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// A test manifest: the TOML file that declares every test bench and its cases.
///
/// The directory containing the manifest is the workspace root. Simulators are started there, and
/// relative paths in the config are resolved against it.
#[derive(Clone, Debug)]
pub struct TestManifest {
    path: Utf8PathBuf,
    workspace_root: Utf8PathBuf,
    registry: TestRegistry,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDeserialize {
    #[serde(default, rename = "bench")]
    benches: Vec<TestBenchDecl>,
}

impl TestManifest {
    /// The default manifest file name, looked up in the current directory.
    pub const DEFAULT_NAME: &'static str = "simtest-manifest.toml";

    /// Reads and validates the manifest at `path`.
    ///
    /// The path is canonicalized, so the workspace root is always absolute.
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Result<Self, ManifestReadError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|error| ManifestReadError::Read {
            path: path.clone(),
            error,
        })?;
        let path = path
            .canonicalize_utf8()
            .map_err(|error| ManifestReadError::Read { path, error })?;
        Self::parse(path, &contents)
    }

    /// Parses and validates manifest contents, treating them as if they were read from `path`.
    pub fn parse(path: impl Into<Utf8PathBuf>, contents: &str) -> Result<Self, ManifestReadError> {
        let path = path.into();
        let manifest: ManifestDeserialize =
            toml::from_str(contents).map_err(|error| ManifestReadError::Parse {
                path: path.clone(),
                error,
            })?;
        let registry =
            TestRegistry::new(manifest.benches).map_err(|error| ManifestReadError::Build {
                path: path.clone(),
                error,
            })?;

        let workspace_root = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };

        Ok(Self {
            path,
            workspace_root,
            registry,
        })
    }

    /// The path the manifest was read from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The workspace root: the directory containing the manifest.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// The registry of declared benches and cases.
    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }
}
