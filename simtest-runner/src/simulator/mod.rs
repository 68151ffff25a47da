// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interface to external simulators.
//!
//! A [`Simulator`] starts [`SimulatorProcess`]es. Each process elaborates benches and runs cases
//! one request at a time. [`CommandSimulator`] drives a simulator program over a line protocol.

mod command;

pub use command::*;

use crate::{
    errors::{SessionFatalError, SessionStartError},
    list::TestBenchId,
};
use quick_junit::ReportUuid;
use std::future::Future;

/// Information passed to a simulator when a session is started.
#[derive(Copy, Clone, Debug)]
pub struct SessionContext {
    /// The unique ID of the test run.
    pub run_id: ReportUuid,

    /// The index of the worker that owns the session.
    pub worker: usize,
}

/// The result of elaborating a bench.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElaborateResult {
    /// The bench elaborated successfully.
    Success,

    /// The bench failed to elaborate.
    Failure,
}

/// The result of running a single case.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CaseResult {
    /// The case passed.
    Passed,

    /// The case failed.
    Failed,
}

/// Starts simulator processes.
pub trait Simulator: Send + Sync {
    /// The process type started by this simulator.
    type Process: SimulatorProcess;

    /// Starts a new simulator process.
    fn start(
        &self,
        cx: SessionContext,
    ) -> impl Future<Output = Result<Self::Process, SessionStartError>> + Send;
}

/// A live simulator process.
///
/// Requests are issued one at a time. Any error returned from a request means the process can no
/// longer be used, and it will be terminated.
pub trait SimulatorProcess: Send {
    /// Elaborates `bench`.
    fn elaborate(
        &mut self,
        bench: &TestBenchId,
    ) -> impl Future<Output = Result<ElaborateResult, SessionFatalError>> + Send;

    /// Runs a case of `bench`, or the whole bench if it has no named cases. The bench has already
    /// been elaborated.
    fn run_case(
        &mut self,
        bench: &TestBenchId,
        case_name: Option<&str>,
    ) -> impl Future<Output = Result<CaseResult, SessionFatalError>> + Send;

    /// Stops the process. Must not fail: errors are logged and the process is killed.
    fn terminate(&mut self) -> impl Future<Output = ()> + Send;
}
