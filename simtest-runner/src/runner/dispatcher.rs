// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The controller for the test runner.
//!
//! This module interfaces with the external world and the workers. It receives events from the
//! workers and from signal handling, sends events to the reporter, and assembles the final
//! report.

use super::ExecutorEvent;
use crate::{
    plan::SimulationRun,
    reporter::{
        Report, ReportAggregator, ReportEntry,
        events::{CancelReason, RunStats, TestEvent, TestEventKind},
    },
    session::RunExecuteStatus,
    signal::SignalHandler,
    time::StopwatchStart,
};
use chrono::Local;
use debug_ignore::DebugIgnore;
use quick_junit::ReportUuid;
use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tracing::debug;

/// Context for the dispatcher.
///
/// This struct is responsible for coordinating events from the outside world and communicating
/// with the workers.
#[derive_where::derive_where(Debug; E)]
pub(super) struct DispatcherContext<'a, F, E> {
    callback: DebugIgnore<F>,
    run_id: ReportUuid,
    stopwatch: StopwatchStart,
    run_stats: RunStats,
    running: usize,
    cancel_state: Option<CancelReason>,
    cancel_tx: watch::Sender<Option<CancelReason>>,
    aggregator: ReportAggregator,
    // Set to the first error returned by the callback.
    first_error: Option<E>,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a, F, E> DispatcherContext<'a, F, E>
where
    F: FnMut(TestEvent<'a>) -> Result<(), E>,
{
    pub(super) fn new(
        callback: F,
        run_id: ReportUuid,
        initial_test_count: usize,
        initial_run_count: usize,
        cancel_tx: watch::Sender<Option<CancelReason>>,
    ) -> Self {
        Self {
            callback: DebugIgnore(callback),
            run_id,
            stopwatch: crate::time::stopwatch(),
            run_stats: RunStats {
                initial_test_count,
                initial_run_count,
                ..RunStats::default()
            },
            running: 0,
            cancel_state: None,
            cancel_tx,
            aggregator: ReportAggregator::new(),
            first_error: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Runs the dispatcher to completion, until `executor_rx` is closed.
    pub(super) async fn run(
        &mut self,
        mut executor_rx: UnboundedReceiver<ExecutorEvent<'a>>,
        signal_handler: &mut SignalHandler,
    ) {
        let mut signals_done = false;

        loop {
            let internal_event = tokio::select! {
                internal_event = executor_rx.recv() => {
                    match internal_event {
                        Some(event) => InternalEvent::Executor(event),
                        None => {
                            // All runs have been completed.
                            break;
                        }
                    }
                },
                internal_event = signal_handler.recv(), if !signals_done => {
                    match internal_event {
                        Some(reason) => InternalEvent::Signal(reason),
                        None => {
                            signals_done = true;
                            continue;
                        }
                    }
                },
            };

            self.handle_event(internal_event);
        }
    }

    pub(super) fn run_started(&mut self, worker_count: usize) {
        self.basic_callback(TestEventKind::RunStarted {
            run_id: self.run_id,
            test_count: self.run_stats.initial_test_count,
            run_count: self.run_stats.initial_run_count,
            worker_count,
        })
    }

    /// Reports the end of the run, and returns the collected report.
    pub(super) fn run_finished(&mut self) -> Report {
        let snapshot = self.stopwatch.snapshot();
        self.basic_callback(TestEventKind::RunFinished {
            run_id: self.run_id,
            start_time: snapshot.start_time,
            elapsed: snapshot.duration,
            run_stats: self.run_stats,
        });
        std::mem::take(&mut self.aggregator).finish(
            self.run_id,
            snapshot.start_time,
            snapshot.duration,
        )
    }

    pub(super) fn into_first_error(self) -> Option<E> {
        self.first_error
    }

    fn basic_callback(&mut self, kind: TestEventKind<'a>) {
        let snapshot = self.stopwatch.snapshot();
        let event = TestEvent {
            timestamp: Local::now().fixed_offset(),
            elapsed: snapshot.duration,
            kind,
        };
        if let Err(error) = (self.callback)(event) {
            // Keep reporting events in case the callback starts working again, but only hold on
            // to the first error.
            if self.first_error.is_none() {
                self.first_error = Some(error);
                self.begin_cancel(CancelReason::ReportError);
            }
        }
    }

    fn handle_event(&mut self, event: InternalEvent<'a>) {
        match event {
            InternalEvent::Executor(ExecutorEvent::Started { run, worker }) => {
                self.running += 1;
                debug!(run = run.index(), bench = %run.bench_id(), worker, "run started");
                self.basic_callback(TestEventKind::SimulationStarted {
                    run,
                    worker,
                    running: self.running,
                });
            }
            InternalEvent::Executor(ExecutorEvent::Finished { run, status }) => {
                self.running -= 1;
                self.finish_run(run, status);
            }
            InternalEvent::Executor(ExecutorEvent::NotDispatched { run, status }) => {
                self.finish_run(run, status);
            }
            InternalEvent::Signal(reason) => self.begin_cancel(reason),
        }
    }

    fn finish_run(&mut self, run: &'a SimulationRun<'a>, status: RunExecuteStatus) {
        debug_assert_eq!(
            run.cases().len(),
            status.statuses.len(),
            "one status per case"
        );

        for (position, (test_instance, case_status)) in
            run.cases().iter().zip(status.statuses).enumerate()
        {
            self.run_stats.on_test_finished(case_status.outcome);
            self.aggregator.add(ReportEntry::new(
                run,
                position,
                *test_instance,
                case_status.clone(),
            ));
            self.basic_callback(TestEventKind::TestFinished {
                test_instance: *test_instance,
                status: case_status,
                current_stats: self.run_stats,
            });
        }

        self.run_stats.runs_finished += 1;
        if status.elaboration_failed {
            self.run_stats.elaboration_failed += 1;
        }
        self.basic_callback(TestEventKind::SimulationFinished {
            run,
            elaboration_failed: status.elaboration_failed,
            running: self.running,
        });
    }

    /// Begins cancellation of the run, if the current cancel state is less severe than `reason`.
    fn begin_cancel(&mut self, reason: CancelReason) {
        if self.cancel_state < Some(reason) {
            self.cancel_state = Some(reason);
            self.cancel_tx.send_replace(Some(reason));
            self.basic_callback(TestEventKind::RunBeginCancel {
                running: self.running,
                reason,
            });
        }
    }
}

#[derive(Debug)]
enum InternalEvent<'a> {
    Executor(ExecutorEvent<'a>),
    Signal(CancelReason),
}
