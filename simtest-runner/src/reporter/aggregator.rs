// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collecting per-case outcomes into a [`Report`].

use super::events::{CaseStatus, TestOutcome};
use crate::{list::TestBenchId, list::TestInstance, plan::SimulationRun};
use chrono::{DateTime, FixedOffset};
use quick_junit::ReportUuid;
use simtest_metadata::SimtestExitCode;
use smol_str::SmolStr;
use std::time::Duration;

/// One line of a [`Report`]: a test case and its outcome.
#[derive(Clone, Debug)]
pub struct ReportEntry {
    name: String,
    bench: TestBenchId,
    case_name: Option<SmolStr>,
    run_index: usize,
    position: usize,
    status: CaseStatus,
}

impl ReportEntry {
    /// Creates a new entry for a case that was executed as part of `run`.
    ///
    /// `position` is the index of the case within the run.
    pub fn new(
        run: &SimulationRun<'_>,
        position: usize,
        test_instance: TestInstance<'_>,
        status: CaseStatus,
    ) -> Self {
        Self {
            name: test_instance.name().to_owned(),
            bench: test_instance.bench_id().clone(),
            case_name: test_instance.case_name().map(SmolStr::new),
            run_index: run.index(),
            position,
            status,
        }
    }

    /// The full hierarchical name of the case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bench the case belongs to.
    pub fn bench(&self) -> &TestBenchId {
        &self.bench
    }

    /// The case name within the bench, if the bench has named cases.
    pub fn case_name(&self) -> Option<&str> {
        self.case_name.as_deref()
    }

    /// The outcome of the case.
    pub fn outcome(&self) -> TestOutcome {
        self.status.outcome
    }

    /// The full status of the case.
    pub fn status(&self) -> &CaseStatus {
        &self.status
    }
}

/// The result of a test run: one entry per selected test case, in a stable order.
///
/// Entries are grouped by simulation run in plan order, and by canonical position within each
/// run. Since the plan keeps a bench's runs together, entries for a bench are contiguous. The
/// order in which runs completed has no effect.
#[derive(Clone, Debug)]
pub struct Report {
    run_id: ReportUuid,
    start_time: DateTime<FixedOffset>,
    elapsed: Duration,
    entries: Vec<ReportEntry>,
}

impl Report {
    /// Creates a report from a set of entries, sorting them into report order.
    pub fn new(
        run_id: ReportUuid,
        start_time: DateTime<FixedOffset>,
        elapsed: Duration,
        mut entries: Vec<ReportEntry>,
    ) -> Self {
        entries.sort_by_key(|entry| (entry.run_index, entry.position));
        Self {
            run_id,
            start_time,
            elapsed,
            entries,
        }
    }

    /// The unique ID of the run.
    pub fn run_id(&self) -> ReportUuid {
        self.run_id
    }

    /// When the run started.
    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    /// How long the run took.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The entries, in report order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the report has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if every entry passed. Vacuously true for an empty report.
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome().is_success())
    }

    /// The process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        SimtestExitCode::for_run(self.all_passed())
    }

    /// Iterates over `(outcome, name)` pairs in report order.
    pub fn outcomes(&self) -> impl ExactSizeIterator<Item = (TestOutcome, &str)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.outcome(), entry.name()))
    }
}

/// Accumulates entries as simulation runs finish, in any order.
#[derive(Debug, Default)]
pub(crate) struct ReportAggregator {
    entries: Vec<ReportEntry>,
}

impl ReportAggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn finish(
        self,
        run_id: ReportUuid,
        start_time: DateTime<FixedOffset>,
        elapsed: Duration,
    ) -> Report {
        Report::new(run_id, start_time, elapsed, self.entries)
    }
}
