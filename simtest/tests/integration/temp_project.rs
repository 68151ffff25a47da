// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Context, Result};

/// A temporary copy of the `artificial` fixture workspace.
///
/// Each test gets its own copy so output directories don't collide.
#[derive(Debug)]
pub struct TempProject {
    temp_dir: Utf8TempDir,
    workspace_root: Utf8PathBuf,
}

impl TempProject {
    pub fn new() -> Result<Self> {
        let temp_dir = camino_tempfile::Builder::new()
            .prefix("simtest-fixture-")
            .tempdir()?;
        let workspace_root = temp_dir.path().join("artificial");
        copy_dir_all(&artificial_fixture_dir(), &workspace_root)?;

        Ok(Self {
            temp_dir,
            workspace_root,
        })
    }

    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// The directory the workspace was copied into.
    pub fn parent_dir(&self) -> &Utf8Path {
        self.temp_dir.path()
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.workspace_root.join("simtest-manifest.toml")
    }

    /// The output directory of the default profile.
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.workspace_root.join("simtest_out")
    }

    /// The number of simulator sessions started, as recorded by the fixture driver.
    pub fn sessions_started(&self) -> Result<usize> {
        let log = self.output_dir().join("sessions.log");
        let contents =
            std::fs::read_to_string(&log).wrap_err_with(|| format!("failed to read {log}"))?;
        Ok(contents.lines().filter(|line| line.starts_with("start")).count())
    }
}

fn artificial_fixture_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("simtest has a parent directory")
        .join("fixtures/artificial")
}

fn copy_dir_all(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    std::fs::create_dir_all(dst).wrap_err_with(|| format!("failed to create {dst}"))?;
    for entry in src.read_dir_utf8()? {
        let entry = entry?;
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), &dst_path)
                .wrap_err_with(|| format!("failed to copy {} to {dst_path}", entry.path()))?;
        }
    }
    Ok(())
}
