// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by simtest.

use crate::{list::TestBenchId, reporter::Report};
use camino::Utf8PathBuf;
use config::ConfigError;
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// The kind of identifier that failed validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IdentifierKind {
    /// A library name.
    Library,

    /// A test bench name.
    Bench,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::Bench => write!(f, "test bench"),
        }
    }
}

/// An error that occurred while building a [`TestRegistry`](crate::list::TestRegistry).
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum RegistryBuildError {
    /// A library or bench name was invalid.
    #[error("invalid {kind} name `{value}`: {reason}")]
    InvalidIdentifier {
        /// What kind of name this is.
        kind: IdentifierKind,

        /// The name that was rejected.
        value: String,

        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A case name was invalid.
    #[error("invalid case name {case_name:?} in `{bench}`: {reason}")]
    InvalidCaseName {
        /// The bench that declared the case.
        bench: TestBenchId,

        /// The case name that was rejected.
        case_name: String,

        /// Why the name was rejected.
        reason: &'static str,
    },

    /// The same bench was declared twice.
    #[error("test bench `{bench}` is declared more than once")]
    DuplicateBench {
        /// The duplicated bench.
        bench: TestBenchId,
    },

    /// A bench declared the same case twice.
    #[error("case `{case_name}` is declared more than once in `{bench}`")]
    DuplicateCase {
        /// The bench that declared the case.
        bench: TestBenchId,

        /// The duplicated case name.
        case_name: SmolStr,
    },
}

/// An error that occurred while reading a test manifest.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestReadError {
    /// The manifest could not be read from disk.
    #[error("failed to read test manifest at `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The manifest was not valid TOML, or did not have the expected shape.
    #[error("failed to parse test manifest at `{path}`")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// The manifest declared an invalid set of benches.
    #[error("invalid test manifest at `{path}`")]
    Build {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: RegistryBuildError,
    },
}

/// An error that occurred while compiling selection patterns.
#[derive(Clone, Debug, Error)]
#[error("failed to compile test name patterns")]
pub struct TestFilterBuildError {
    #[source]
    error: regex::Error,
}

impl TestFilterBuildError {
    pub(crate) fn new(error: regex::Error) -> Self {
        Self { error }
    }
}

/// Patterns were supplied, but none of them matched any test case.
#[derive(Clone, Debug, Error)]
#[error("no test cases matched the given patterns: {}", .patterns.join(", "))]
pub struct NoMatchError {
    patterns: Vec<String>,
}

impl NoMatchError {
    pub(crate) fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// The patterns that were supplied.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse simtest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing the config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    Build(ConfigError),

    /// An error occurred while deserializing the config.
    #[error("error at `{}`", .0.path())]
    Deserialize(#[source] Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which indicates that a profile was requested but not known to simtest.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// The config does not say which simulator program to run.
#[derive(Clone, Debug, Error)]
#[error("no simulator program configured (set `simulator.program` in `{config_file}`)")]
pub struct SimulatorNotConfigured {
    config_file: Utf8PathBuf,
}

impl SimulatorNotConfigured {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
        }
    }
}

/// Displays an error followed by its chain of sources, on a single line.
#[derive(Clone, Debug)]
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}

/// An error that occurred while starting a simulator session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionStartError {
    /// The simulator process could not be spawned.
    #[error("failed to spawn simulator `{program}`")]
    Spawn {
        /// The program that was spawned.
        program: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The simulator process was spawned, but its standard streams were not available.
    #[error("simulator `{program}` was spawned without piped standard streams")]
    MissingStdio {
        /// The program that was spawned.
        program: String,
    },

    /// A custom error reported by a simulator adapter.
    #[error("{message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// A simulator session can no longer be used.
///
/// This covers crashes and protocol violations. Case and elaboration failures are ordinary
/// results, not errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionFatalError {
    /// Sending a request to the simulator failed.
    #[error("failed to send `{request}` to the simulator")]
    Write {
        /// The request that was being sent.
        request: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Reading the simulator's reply failed.
    #[error("failed to read the simulator's reply to `{request}`")]
    Read {
        /// The request whose reply was being read.
        request: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The simulator closed its output before replying.
    #[error("simulator exited before replying to `{request}`")]
    UnexpectedEof {
        /// The request whose reply was being read.
        request: String,
    },

    /// The simulator sent a result line that could not be understood.
    #[error("simulator replied to `{request}` with unrecognized result `{result}`")]
    InvalidResult {
        /// The request whose reply was being read.
        request: String,

        /// The unrecognized result.
        result: String,
    },

    /// A custom error reported by a simulator adapter.
    #[error("{message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// An error that occurred while preparing the output directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OutputDirError {
    /// The existing output directory could not be removed.
    #[error("failed to clean output directory `{path}`")]
    Clean {
        /// The output directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory `{path}`")]
    Create {
        /// The output directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The created output directory could not be canonicalized, or is not valid UTF-8.
    #[error("failed to canonicalize output directory `{path}`")]
    Canonicalize {
        /// The output directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while persisting a report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportWriteError {
    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing xunit XML.
    #[error("error writing xunit output to {file}")]
    Xunit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// An error that occurs while writing a live event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[from] std::io::Error),
}

/// An error that occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] std::io::Error);

/// An error that occurred while building the test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),

    /// An error occurred while setting up signals.
    #[error("error setting up signals")]
    SignalHandlerSetupError(#[from] SignalHandlerSetupError),
}

/// Returned by [`TestRunner::try_execute`](crate::runner::TestRunner::try_execute) when the event
/// callback failed.
///
/// The run was cancelled at the first callback error. `report` still holds an outcome for every
/// planned case.
#[derive(Debug)]
pub struct TestRunnerExecuteError<E> {
    /// The report for the cancelled run.
    pub report: Report,

    /// The first error returned by the callback.
    pub report_error: E,
}

impl<E: fmt::Display> fmt::Display for TestRunnerExecuteError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error reporting test events, run cancelled after {} cases: {}",
            self.report.len(),
            self.report_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TestRunnerExecuteError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.report_error)
    }
}

/// An error that occurs while parsing a
/// [`TestThreads`](crate::config::TestThreads) value.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for test-threads: {input}\n(hint: expected an integer or \"num-cpus\")"
)]
pub struct TestThreadsParseError {
    input: String,
}

impl TestThreadsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while parsing a run timeout from the command line.
#[derive(Clone, Debug, Error)]
#[error("invalid run timeout `{input}`")]
pub struct RunTimeoutParseError {
    input: String,
    #[source]
    error: humantime::DurationError,
}

impl RunTimeoutParseError {
    pub(crate) fn new(input: impl Into<String>, error: humantime::DurationError) -> Self {
        Self {
            input: input.into(),
            error,
        }
    }
}

/// An error that occurred while writing out a test list.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteTestListError {
    /// An error occurred while writing the list to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while serializing JSON, or while writing it to the provided output.
    #[error("error serializing to JSON")]
    Json(#[source] serde_json::Error),
}
