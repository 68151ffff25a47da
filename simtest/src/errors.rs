// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::NO_HEADING_TARGET;
use simtest_metadata::SimtestExitCode;
use simtest_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::{error, warn};

/// An error that stops `simtest` before or after a run, as opposed to test failures.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("manifest read error")]
    ManifestRead {
        #[from]
        err: ManifestReadError,
    },
    #[error("config parse error")]
    ConfigParse {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("test filter build error")]
    TestFilterBuild {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("no tests matched")]
    NoTestsMatched {
        #[from]
        err: NoMatchError,
    },
    #[error("simulator not configured")]
    SimulatorNotConfigured {
        #[from]
        err: SimulatorNotConfigured,
    },
    #[error("output directory error")]
    OutputDir {
        #[from]
        err: OutputDirError,
    },
    #[error("test runner build error")]
    TestRunnerBuild {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("error writing test list")]
    WriteTestList {
        #[from]
        err: WriteTestListError,
    },
    #[error("error writing test event")]
    WriteEvent {
        #[from]
        err: WriteEventError,
    },
    #[error("error writing report")]
    ReportWrite {
        #[from]
        err: ReportWriteError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ManifestRead { .. }
            | Self::ConfigParse { .. }
            | Self::ProfileNotFound { .. }
            | Self::TestFilterBuild { .. }
            | Self::SimulatorNotConfigured { .. }
            | Self::OutputDir { .. }
            | Self::TestRunnerBuild { .. } => SimtestExitCode::SETUP_ERROR,
            Self::NoTestsMatched { .. } => SimtestExitCode::NO_TESTS_MATCHED,
            Self::WriteTestList { .. } | Self::WriteEvent { .. } | Self::ReportWrite { .. } => {
                SimtestExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::ManifestRead { err } => {
                error!("{err}");
                err.source()
            }
            Self::ConfigParse { err } => {
                error!("{err}");
                err.source()
            }
            Self::ProfileNotFound { err } => {
                error!("{err}");
                err.source()
            }
            Self::TestFilterBuild { err } => {
                error!("{err}");
                err.source()
            }
            Self::NoTestsMatched { err } => {
                error!("{err}");
                warn!("(hint: run `simtest list` to see available tests)");
                None
            }
            Self::SimulatorNotConfigured { err } => {
                error!("{err}");
                None
            }
            Self::OutputDir { err } => {
                error!("{err}");
                err.source()
            }
            Self::TestRunnerBuild { err } => {
                error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::WriteTestList { err } => {
                error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::WriteEvent { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::ReportWrite { err } => {
                error!("failed to write report");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
