// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{DispatcherContext, ExecutorEvent};
use crate::{
    config::{SessionMode, TestThreads},
    errors::{DisplayErrorChain, TestRunnerBuildError, TestRunnerExecuteError},
    plan::{RunPlan, SimulationRun},
    reporter::{
        Report,
        events::{OutcomeReason, TestEvent},
    },
    session::{CancelReceiver, RunExecuteStatus, RunKind, SessionSlot},
    signal::{SignalHandler, SignalHandlerKind},
    simulator::{SessionContext, Simulator},
};
use quick_junit::ReportUuid;
use std::{collections::VecDeque, convert::Infallible, fmt, time::Duration};
use tokio::{
    runtime::Runtime,
    sync::{
        Mutex,
        mpsc::{UnboundedSender, unbounded_channel},
        watch,
    },
};
use tracing::{debug, warn};

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    test_threads: Option<TestThreads>,
    session_mode: SessionMode,
    run_kind: RunKind,
    run_timeout: Option<Duration>,
}

impl TestRunnerBuilder {
    /// Sets the number of workers, each of which owns one simulator session at a time.
    ///
    /// Defaults to 1.
    pub fn set_test_threads(&mut self, test_threads: TestThreads) -> &mut Self {
        self.test_threads = Some(test_threads);
        self
    }

    /// Sets whether simulator sessions are reused across runs.
    pub fn set_session_mode(&mut self, session_mode: SessionMode) -> &mut Self {
        self.session_mode = session_mode;
        self
    }

    /// Sets whether runs execute their cases or stop after elaboration.
    pub fn set_run_kind(&mut self, run_kind: RunKind) -> &mut Self {
        self.run_kind = run_kind;
        self
    }

    /// Sets the maximum duration of a single simulation run, including elaboration.
    pub fn set_run_timeout(&mut self, run_timeout: Duration) -> &mut Self {
        self.run_timeout = Some(run_timeout);
        self
    }

    /// Creates a new test runner.
    pub fn build<'a, S: Simulator>(
        self,
        plan: &'a RunPlan<'a>,
        simulator: &'a S,
        signal_handler: SignalHandlerKind,
    ) -> Result<TestRunner<'a, S>, TestRunnerBuildError> {
        let test_threads = self.test_threads.map_or(1, TestThreads::compute).max(1);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("simtest-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;
        let _guard = runtime.enter();

        // signal_handler.build() must be called from within the guard.
        let signal_handler = signal_handler.build()?;

        Ok(TestRunner {
            inner: TestRunnerInner {
                plan,
                simulator,
                test_threads,
                session_mode: self.session_mode,
                run_kind: self.run_kind,
                run_timeout: self.run_timeout,
                runtime,
                run_id: ReportUuid::new_v4(),
            },
            signal_handler,
        })
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner<'a, S> {
    inner: TestRunnerInner<'a, S>,
    signal_handler: SignalHandler,
}

impl<'a, S: Simulator> TestRunner<'a, S> {
    /// The unique ID of this run.
    pub fn run_id(&self) -> ReportUuid {
        self.inner.run_id
    }

    /// Executes the planned runs.
    ///
    /// The callback is called with live events as the run progresses.
    pub fn execute<F>(self, mut callback: F) -> Report
    where
        F: FnMut(TestEvent<'a>) + Send,
    {
        match self.try_execute::<Infallible, _>(|test_event| {
            callback(test_event);
            Ok(())
        }) {
            Ok(report) => report,
            Err(error) => match error.report_error {},
        }
    }

    /// Executes the planned runs.
    ///
    /// Accepts a callback that is called with live events. If the callback returns an error, the
    /// run is cancelled, and the first error is returned along with the report once every session
    /// has been shut down.
    pub fn try_execute<E, F>(mut self, callback: F) -> Result<Report, TestRunnerExecuteError<E>>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E> + Send,
        E: fmt::Debug + Send,
    {
        let (report, first_error) = self.inner.execute(&mut self.signal_handler, callback);

        // Simulator stderr forwarding tasks may outlive their processes. Don't wait for them.
        self.inner.runtime.shutdown_background();

        match first_error {
            None => Ok(report),
            Some(report_error) => Err(TestRunnerExecuteError {
                report,
                report_error,
            }),
        }
    }
}

#[derive(Debug)]
struct TestRunnerInner<'a, S> {
    plan: &'a RunPlan<'a>,
    simulator: &'a S,
    test_threads: usize,
    session_mode: SessionMode,
    run_kind: RunKind,
    run_timeout: Option<Duration>,
    runtime: Runtime,
    run_id: ReportUuid,
}

impl<'a, S: Simulator> TestRunnerInner<'a, S> {
    fn execute<F, E>(&self, signal_handler: &mut SignalHandler, callback: F) -> (Report, Option<E>)
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E>,
    {
        let plan = self.plan;
        let worker_count = self.test_threads.min(plan.run_count());
        let (cancel_tx, cancel_rx) = watch::channel(None);

        let mut dispatcher_cx = DispatcherContext::new(
            callback,
            self.run_id,
            plan.test_count(),
            plan.run_count(),
            cancel_tx,
        );
        dispatcher_cx.run_started(worker_count);

        let queue: Mutex<VecDeque<&'a SimulationRun<'a>>> = Mutex::new(plan.runs().iter().collect());
        let (executor_tx, executor_rx) = unbounded_channel();

        let queue_ref = &queue;
        let workers_fut = async move {
            let workers = (0..worker_count).map(|worker| {
                self.run_worker(
                    worker,
                    queue_ref,
                    CancelReceiver::new(cancel_rx.clone()),
                    executor_tx.clone(),
                )
            });
            futures::future::join_all(workers).await;

            // Anything still queued was never picked up, either because the run was cancelled
            // or because every worker failed to start a session.
            let cancel = CancelReceiver::new(cancel_rx);
            loop {
                let next = queue_ref.lock().await.pop_front();
                let Some(run) = next else {
                    break;
                };
                let reason = match cancel.reason() {
                    Some(reason) => OutcomeReason::Cancelled { reason },
                    None => OutcomeReason::NoSessionAvailable,
                };
                let _ = executor_tx.send(ExecutorEvent::NotDispatched {
                    run,
                    status: RunExecuteStatus::fail_all(run, reason),
                });
            }
            // executor_tx is dropped here, which lets the dispatcher finish.
        };

        self.runtime.block_on(async {
            tokio::join!(dispatcher_cx.run(executor_rx, signal_handler), workers_fut);
        });

        let report = dispatcher_cx.run_finished();
        (report, dispatcher_cx.into_first_error())
    }

    async fn run_worker(
        &self,
        worker: usize,
        queue: &Mutex<VecDeque<&'a SimulationRun<'a>>>,
        mut cancel: CancelReceiver,
        executor_tx: UnboundedSender<ExecutorEvent<'a>>,
    ) {
        let cx = SessionContext {
            run_id: self.run_id,
            worker,
        };
        let mut slot = SessionSlot::new(self.simulator, self.session_mode, cx);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let next = queue.lock().await.pop_front();
            let Some(run) = next else {
                break;
            };

            let _ = executor_tx.send(ExecutorEvent::Started { run, worker });
            let status = match slot.acquire().await {
                Ok(session) => {
                    session
                        .execute(run, self.run_kind, self.run_timeout, &mut cancel)
                        .await
                }
                Err(error) => {
                    let message = DisplayErrorChain::new(error).to_string();
                    warn!("worker {worker} failed to start a simulator session: {message}");
                    let _ = executor_tx.send(ExecutorEvent::Finished {
                        run,
                        status: RunExecuteStatus::fail_all(
                            run,
                            OutcomeReason::SessionStartFailed { message },
                        ),
                    });
                    break;
                }
            };
            slot.release().await;
            let _ = executor_tx.send(ExecutorEvent::Finished { run, status });
        }

        slot.shutdown().await;
        debug!(worker, "worker finished");
    }
}
