// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced during a test run, and the statuses they carry.

use crate::{list::TestInstance, plan::SimulationRun};
use chrono::{DateTime, FixedOffset};
use quick_junit::ReportUuid;
use std::{fmt, time::Duration};

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
/// [`Reporter`](crate::reporter::Reporter).
#[derive(Clone, Debug)]
pub struct TestEvent<'a> {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the test run.
    pub elapsed: Duration,

    /// The kind of test event this is.
    pub kind: TestEventKind<'a>,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind<'a> {
    /// The test run started.
    RunStarted {
        /// The UUID for this run.
        run_id: ReportUuid,

        /// The number of test cases that will be run.
        test_count: usize,

        /// The number of simulation runs they are grouped into.
        run_count: usize,

        /// The number of workers.
        worker_count: usize,
    },

    /// A simulation run was handed to a simulator session.
    SimulationStarted {
        /// The run.
        run: &'a SimulationRun<'a>,

        /// The worker executing the run.
        worker: usize,

        /// The number of runs currently executing.
        running: usize,
    },

    /// A test case received its final outcome.
    TestFinished {
        /// The test case.
        test_instance: TestInstance<'a>,

        /// The outcome, and how long the case took.
        status: CaseStatus,

        /// Statistics for the run so far, including this case.
        current_stats: RunStats,
    },

    /// A simulation run finished.
    SimulationFinished {
        /// The run.
        run: &'a SimulationRun<'a>,

        /// Whether the bench failed to elaborate.
        elaboration_failed: bool,

        /// The number of runs still executing.
        running: usize,
    },

    /// A cancellation notice was received.
    RunBeginCancel {
        /// The number of runs still executing.
        running: usize,

        /// The reason this run was cancelled.
        reason: CancelReason,
    },

    /// The test run finished.
    RunFinished {
        /// The unique ID for this run.
        run_id: ReportUuid,

        /// The time at which the run was started.
        start_time: DateTime<FixedOffset>,

        /// The amount of time it took for the run to finish.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The final outcome of a test case.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TestOutcome {
    /// The case passed.
    Passed,

    /// The case failed, or could not be executed.
    Failed,

    /// The case was not executed because an earlier case in the same simulation failed.
    Skipped,
}

impl TestOutcome {
    /// Returns true if this outcome is a pass.
    pub fn is_success(self) -> bool {
        self == Self::Passed
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a test case ended up with a non-passing outcome, when it wasn't the case's own result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutcomeReason {
    /// The bench failed to elaborate.
    ElaborationFailed,

    /// An earlier case in the same simulation failed.
    EarlierCaseFailed {
        /// The full name of the case that failed.
        name: String,
    },

    /// The run exceeded its timeout and the simulator was terminated.
    TimedOut {
        /// The configured run timeout.
        timeout: Duration,
    },

    /// The run was cancelled.
    Cancelled {
        /// The reason for cancellation.
        reason: CancelReason,
    },

    /// The simulator session crashed or broke protocol.
    SessionCrashed {
        /// A description of the failure.
        message: String,
    },

    /// A simulator session could not be started.
    SessionStartFailed {
        /// A description of the failure.
        message: String,
    },

    /// Every worker terminated before this case could be dispatched.
    NoSessionAvailable,
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElaborationFailed => write!(f, "elaboration failed"),
            Self::EarlierCaseFailed { name } => {
                write!(f, "skipped because `{name}` failed in the same simulation")
            }
            Self::TimedOut { timeout } => write!(
                f,
                "simulation run timed out after {}",
                humantime::format_duration(*timeout)
            ),
            Self::Cancelled { reason } => {
                write!(f, "run cancelled due to {}", reason.to_static_str())
            }
            Self::SessionCrashed { message } => write!(f, "simulator session failed: {message}"),
            Self::SessionStartFailed { message } => {
                write!(f, "failed to start simulator session: {message}")
            }
            Self::NoSessionAvailable => {
                write!(f, "no simulator session available to execute the run")
            }
        }
    }
}

/// The outcome of a single test case, with timing information.
#[derive(Clone, Debug)]
pub struct CaseStatus {
    /// The outcome.
    pub outcome: TestOutcome,

    /// Why the outcome was forced, if it wasn't the case's own result.
    pub reason: Option<OutcomeReason>,

    /// When the case started, or when it was given its outcome if it never ran.
    pub start_time: DateTime<FixedOffset>,

    /// How long the case took.
    pub time_taken: Duration,
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of test cases expected to run at the beginning.
    pub initial_test_count: usize,

    /// The total number of simulation runs expected at the beginning.
    pub initial_run_count: usize,

    /// The number of test cases that have an outcome.
    pub finished_count: usize,

    /// The number of simulation runs that finished.
    pub runs_finished: usize,

    /// The number of test cases that passed.
    pub passed: usize,

    /// The number of test cases that failed.
    pub failed: usize,

    /// The number of test cases that were skipped.
    pub skipped: usize,

    /// The number of simulation runs whose bench failed to elaborate.
    pub elaboration_failed: usize,
}

impl RunStats {
    /// Returns true if every test case passed.
    ///
    /// An empty run counts as a success.
    pub fn is_success(&self) -> bool {
        self.finished_count == self.initial_test_count && self.failed == 0 && self.skipped == 0
    }

    pub(crate) fn on_test_finished(&mut self, outcome: TestOutcome) {
        self.finished_count += 1;
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
        }
    }
}

// Note: the order here matters -- it indicates severity of cancellation
/// The reason why a test run is being cancelled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CancelReason {
    /// An error occurred while reporting results.
    ReportError,

    /// A termination signal (on Unix, SIGTERM or SIGHUP) was received.
    Signal,

    /// An interrupt (on Unix, Ctrl-C) was received.
    Interrupt,
}

impl CancelReason {
    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            CancelReason::ReportError => "reporting error",
            CancelReason::Signal => "signal",
            CancelReason::Interrupt => "interrupt",
        }
    }
}
