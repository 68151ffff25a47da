// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Simulator sessions: executing simulation runs against a live simulator process.
//!
//! A [`SimulatorSession`] wraps one [`SimulatorProcess`]. Each worker owns a [`SessionSlot`],
//! which starts a session lazily, reuses it across runs in persistent mode, and replaces it after
//! a crash or a timeout.

use crate::{
    config::SessionMode,
    errors::{DisplayErrorChain, SessionFatalError, SessionStartError},
    plan::SimulationRun,
    reporter::events::{CancelReason, CaseStatus, OutcomeReason, TestOutcome},
    simulator::{CaseResult, ElaborateResult, SessionContext, Simulator, SimulatorProcess},
    time::{StopwatchStart, stopwatch},
};
use std::{future::Future, time::Duration};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, warn};

/// What a simulation run does once its bench is elaborated.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RunKind {
    /// Run every case after elaborating the bench.
    #[default]
    Simulate,

    /// Stop after elaboration. Cases of benches that elaborate successfully pass.
    ElaborateOnly,
}

/// Observes run cancellation.
///
/// Cancellation is sticky: once set, every receiver sees it, including ones created afterwards.
#[derive(Clone, Debug)]
pub(crate) struct CancelReceiver {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelReceiver {
    pub(crate) fn new(rx: watch::Receiver<Option<CancelReason>>) -> Self {
        Self { rx }
    }

    pub(crate) fn reason(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Waits until the run is cancelled. Never completes if the sender is dropped first.
    pub(crate) async fn cancelled(&mut self) -> CancelReason {
        if let Ok(reason) = self.rx.wait_for(Option::is_some).await {
            if let Some(reason) = *reason {
                return reason;
            }
        }
        std::future::pending().await
    }
}

/// The outcomes of a simulation run: one status per case, in run order.
#[derive(Clone, Debug)]
pub(crate) struct RunExecuteStatus {
    pub(crate) statuses: Vec<CaseStatus>,
    pub(crate) elaboration_failed: bool,
}

impl RunExecuteStatus {
    /// Fails every case in the run without executing it.
    pub(crate) fn fail_all(run: &SimulationRun<'_>, reason: OutcomeReason) -> Self {
        let stopwatch = stopwatch();
        let statuses = run
            .cases()
            .iter()
            .map(|_| case_status(TestOutcome::Failed, Some(reason.clone()), &stopwatch))
            .collect();
        Self {
            statuses,
            elaboration_failed: false,
        }
    }
}

/// Why a request to the simulator did not produce a result.
#[derive(Debug)]
enum Interrupted {
    TimedOut(Duration),
    Cancelled(CancelReason),
    Fatal(SessionFatalError),
}

/// A live simulator process, and whether it can still be used.
#[derive(Debug)]
pub(crate) struct SimulatorSession<P> {
    process: P,
    healthy: bool,
}

impl<P: SimulatorProcess> SimulatorSession<P> {
    pub(crate) fn new(process: P) -> Self {
        Self {
            process,
            healthy: true,
        }
    }

    /// Returns false once the process has crashed or been terminated.
    pub(crate) fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Executes a simulation run, producing exactly one status per case in run order.
    ///
    /// The bench is always elaborated first. If it fails to elaborate, every case fails. Once a
    /// case fails, the remaining cases are skipped. If the run times out, is cancelled, or the
    /// process crashes, the process is terminated and the current and remaining cases fail.
    pub(crate) async fn execute(
        &mut self,
        run: &SimulationRun<'_>,
        kind: RunKind,
        timeout: Option<Duration>,
        cancel: &mut CancelReceiver,
    ) -> RunExecuteStatus {
        let bench = run.bench_id();
        let deadline = timeout.map(|timeout| (Instant::now() + timeout, timeout));
        let mut statuses = Vec::with_capacity(run.cases().len());

        if let Some(reason) = cancel.reason() {
            return RunExecuteStatus::fail_all(run, OutcomeReason::Cancelled { reason });
        }

        let elab_stopwatch = stopwatch();
        match guarded(self.process.elaborate(bench), deadline, cancel).await {
            Ok(ElaborateResult::Success) => {}
            Ok(ElaborateResult::Failure) => {
                debug!(%bench, "bench failed to elaborate");
                for _ in run.cases() {
                    statuses.push(case_status(
                        TestOutcome::Failed,
                        Some(OutcomeReason::ElaborationFailed),
                        &elab_stopwatch,
                    ));
                }
                return RunExecuteStatus {
                    statuses,
                    elaboration_failed: true,
                };
            }
            Err(interrupted) => {
                let reason = self.on_interrupted(run, interrupted).await;
                return RunExecuteStatus::fail_all(run, reason);
            }
        }

        if kind == RunKind::ElaborateOnly {
            for _ in run.cases() {
                statuses.push(case_status(TestOutcome::Passed, None, &elab_stopwatch));
            }
            return RunExecuteStatus {
                statuses,
                elaboration_failed: false,
            };
        }

        let mut failed_case: Option<&str> = None;
        for (position, test) in run.cases().iter().enumerate() {
            let case_stopwatch = stopwatch();
            if let Some(name) = failed_case {
                statuses.push(case_status(
                    TestOutcome::Skipped,
                    Some(OutcomeReason::EarlierCaseFailed {
                        name: name.to_owned(),
                    }),
                    &case_stopwatch,
                ));
                continue;
            }

            match guarded(
                self.process.run_case(bench, test.case_name()),
                deadline,
                cancel,
            )
            .await
            {
                Ok(CaseResult::Passed) => {
                    statuses.push(case_status(TestOutcome::Passed, None, &case_stopwatch));
                }
                Ok(CaseResult::Failed) => {
                    statuses.push(case_status(TestOutcome::Failed, None, &case_stopwatch));
                    failed_case = Some(test.name());
                }
                Err(interrupted) => {
                    let reason = self.on_interrupted(run, interrupted).await;
                    statuses.push(case_status(
                        TestOutcome::Failed,
                        Some(reason.clone()),
                        &case_stopwatch,
                    ));
                    let remaining_stopwatch = stopwatch();
                    for _ in &run.cases()[position + 1..] {
                        statuses.push(case_status(
                            TestOutcome::Failed,
                            Some(reason.clone()),
                            &remaining_stopwatch,
                        ));
                    }
                    break;
                }
            }
        }

        RunExecuteStatus {
            statuses,
            elaboration_failed: false,
        }
    }

    /// Terminates the process if it is still usable.
    pub(crate) async fn terminate(&mut self) {
        if self.healthy {
            self.healthy = false;
            self.process.terminate().await;
        }
    }

    async fn on_interrupted(
        &mut self,
        run: &SimulationRun<'_>,
        interrupted: Interrupted,
    ) -> OutcomeReason {
        let bench = run.bench_id();
        let reason = match interrupted {
            Interrupted::TimedOut(timeout) => {
                warn!(
                    "simulation run for {bench} timed out after {}, terminating simulator",
                    humantime::format_duration(timeout)
                );
                OutcomeReason::TimedOut { timeout }
            }
            Interrupted::Cancelled(reason) => {
                debug!(%bench, ?reason, "run cancelled, terminating simulator");
                OutcomeReason::Cancelled { reason }
            }
            Interrupted::Fatal(error) => {
                let message = DisplayErrorChain::new(error).to_string();
                warn!("simulator session crashed while running {bench}: {message}");
                OutcomeReason::SessionCrashed { message }
            }
        };
        self.terminate().await;
        reason
    }
}

/// Drives a simulator request, racing it against the run deadline and cancellation.
async fn guarded<T>(
    request: impl Future<Output = Result<T, SessionFatalError>>,
    deadline: Option<(Instant, Duration)>,
    cancel: &mut CancelReceiver,
) -> Result<T, Interrupted> {
    let deadline_fut = async {
        match deadline {
            Some((deadline, timeout)) => {
                tokio::time::sleep_until(deadline).await;
                timeout
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;

        res = request => res.map_err(Interrupted::Fatal),
        reason = cancel.cancelled() => Err(Interrupted::Cancelled(reason)),
        timeout = deadline_fut => Err(Interrupted::TimedOut(timeout)),
    }
}

fn case_status(
    outcome: TestOutcome,
    reason: Option<OutcomeReason>,
    stopwatch: &StopwatchStart,
) -> CaseStatus {
    let snapshot = stopwatch.snapshot();
    CaseStatus {
        outcome,
        reason,
        start_time: snapshot.start_time,
        time_taken: snapshot.duration,
    }
}

/// The simulator session owned by a worker.
///
/// The session is started on first use. In persistent mode it is kept for the next run unless it
/// crashed or timed out; in transient mode it is terminated after every run.
pub(crate) struct SessionSlot<'s, S: Simulator> {
    simulator: &'s S,
    mode: SessionMode,
    cx: SessionContext,
    session: Option<SimulatorSession<S::Process>>,
}

impl<'s, S: Simulator> SessionSlot<'s, S> {
    pub(crate) fn new(simulator: &'s S, mode: SessionMode, cx: SessionContext) -> Self {
        Self {
            simulator,
            mode,
            cx,
            session: None,
        }
    }

    /// Returns a healthy session, starting a new one if necessary.
    pub(crate) async fn acquire(
        &mut self,
    ) -> Result<&mut SimulatorSession<S::Process>, SessionStartError> {
        let session = match self.session.take() {
            Some(session) if session.is_healthy() => session,
            _ => {
                debug!(worker = self.cx.worker, "starting simulator session");
                SimulatorSession::new(self.simulator.start(self.cx).await?)
            }
        };
        Ok(self.session.insert(session))
    }

    /// Called after every run. Drops sessions that can no longer be used, and terminates
    /// transient sessions.
    pub(crate) async fn release(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };
        if !session.is_healthy() {
            debug!(worker = self.cx.worker, "recycling crashed simulator session");
            self.session = None;
        } else if self.mode == SessionMode::Transient {
            session.terminate().await;
            self.session = None;
        }
    }

    /// Terminates the session, if any.
    pub(crate) async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.terminate().await;
        }
    }
}
