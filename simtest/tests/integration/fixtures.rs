// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::temp_project::TempProject;
use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result};
use std::fmt;

/// Environment variables that would change how `simtest` behaves under test.
const CLEARED_ENV_VARS: &[&str] = &[
    "SIMTEST_LOG",
    "SIMTEST_PROFILE",
    "SIMTEST_TEST_THREADS",
    "SIMTEST_VERBOSE",
    "SIMTEST_COLOR",
];

#[derive(Clone, Debug)]
pub struct SimtestCli {
    args: Vec<String>,
    cwd: Option<Utf8PathBuf>,
    stderr_file: Option<Utf8PathBuf>,
}

impl SimtestCli {
    pub fn new(project: &TempProject) -> Self {
        Self::with_manifest_path(project.manifest_path().into_string(), None)
    }

    /// Runs from the directory containing the workspace, with a relative `--manifest-path`.
    pub fn from_parent_dir(project: &TempProject) -> Self {
        Self::with_manifest_path(
            "artificial/simtest-manifest.toml".to_owned(),
            Some(project.parent_dir().to_owned()),
        )
    }

    fn with_manifest_path(manifest_path: String, cwd: Option<Utf8PathBuf>) -> Self {
        Self {
            args: vec![
                "--manifest-path".to_owned(),
                manifest_path,
                "--color".to_owned(),
                "never".to_owned(),
            ],
            cwd,
            stderr_file: None,
        }
    }

    /// Connects stderr to `path` opened read-only, so every write to it fails.
    pub fn unwritable_stderr(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.stderr_file = Some(path.into());
        self
    }

    pub fn args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output(&self) -> Result<SimtestOutput> {
        let mut expression = duct::cmd(env!("CARGO_BIN_EXE_simtest"), &self.args)
            .stdout_capture()
            .unchecked();
        expression = match &self.stderr_file {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .wrap_err_with(|| format!("failed to open {path}"))?;
                expression.stderr_file(file)
            }
            None => expression.stderr_capture(),
        };
        for var in CLEARED_ENV_VARS {
            expression = expression.env_remove(*var);
        }
        if let Some(cwd) = &self.cwd {
            expression = expression.dir(cwd.as_std_path());
        }

        let output = expression
            .run()
            .wrap_err_with(|| format!("failed to run simtest with {:?}", self.args))?;

        Ok(SimtestOutput {
            args: self.args.clone(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub struct SimtestOutput {
    args: Vec<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Debug for SimtestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "simtest {:?}", self.args)?;
        writeln!(f, "exit code: {:?}", self.exit_code)?;
        writeln!(f, "--- stdout ---\n{}", self.stdout)?;
        writeln!(f, "--- stderr ---\n{}", self.stderr)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// Reads `(outcome, name)` pairs from an xunit report, in document order.
pub fn xunit_outcomes(path: &Utf8Path) -> Result<Vec<(Outcome, String)>> {
    let xml = std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))?;

    let outcomes = xml
        .split("<testcase ")
        .skip(1)
        .map(|testcase| {
            let name = attribute(testcase, "name").unwrap_or_default().to_owned();
            // The body ends at the next suite boundary, if any.
            let body = testcase
                .split_once("</testsuite>")
                .map_or(testcase, |(body, _)| body);
            let outcome = if body.contains("<failure") {
                Outcome::Failed
            } else if body.contains("<skipped") {
                Outcome::Skipped
            } else {
                Outcome::Passed
            };
            (outcome, name)
        })
        .collect();
    Ok(outcomes)
}

fn attribute<'a>(element: &'a str, attr: &str) -> Option<&'a str> {
    let needle = format!("{attr}=\"");
    let start = if element.starts_with(&needle) {
        needle.len()
    } else {
        element.find(&format!(" {needle}"))? + needle.len() + 1
    };
    element[start..].split_once('"').map(|(value, _)| value)
}

pub fn outcomes(expected: &[(Outcome, &str)]) -> Vec<(Outcome, String)> {
    expected
        .iter()
        .map(|(outcome, name)| (*outcome, (*name).to_owned()))
        .collect()
}
