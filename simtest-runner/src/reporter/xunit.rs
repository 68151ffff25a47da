// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Writing reports in the xunit (JUnit-compatible) XML format.

use super::{
    aggregator::Report,
    events::{CaseStatus, TestOutcome},
};
use crate::{errors::ReportWriteError, list::TestBenchId};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;

/// A destination a finished [`Report`] is persisted to.
pub trait ReportSink {
    /// Persists the report.
    ///
    /// Implementations must produce the same output for the same report.
    fn write_report(&self, report: &Report) -> Result<(), ReportWriteError>;
}

/// Writes reports as xunit XML files.
#[derive(Clone, Debug)]
pub struct XunitSink {
    path: Utf8PathBuf,
}

impl XunitSink {
    /// The name of the top-level `<testsuites>` element.
    pub const REPORT_NAME: &'static str = "simtest-run";

    /// Creates a sink writing to `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this sink writes to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub(crate) fn to_junit(&self, report: &Report) -> quick_junit::Report {
        let mut test_suites: IndexMap<&TestBenchId, TestSuite> = IndexMap::new();
        for entry in report.entries() {
            let test_suite = test_suites
                .entry(entry.bench())
                .or_insert_with(|| TestSuite::new(entry.bench().to_string()));

            let mut testcase = TestCase::new(entry.name(), testcase_status(entry.status()));
            testcase
                .set_classname(entry.bench().to_string())
                .set_timestamp(entry.status().start_time)
                .set_time(entry.status().time_taken);
            test_suite.add_test_case(testcase);
        }

        let mut junit = quick_junit::Report::new(Self::REPORT_NAME);
        junit
            .set_report_uuid(report.run_id())
            .set_timestamp(report.start_time())
            .set_time(report.elapsed())
            .add_test_suites(test_suites.into_values());
        junit
    }
}

impl ReportSink for XunitSink {
    fn write_report(&self, report: &Report) -> Result<(), ReportWriteError> {
        let junit = self.to_junit(report);

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|error| ReportWriteError::Fs {
                file: dir.to_path_buf(),
                error,
            })?;
        }

        let f = File::create(&self.path).map_err(|error| ReportWriteError::Fs {
            file: self.path.clone(),
            error,
        })?;
        junit
            .serialize(f)
            .map_err(|error| ReportWriteError::Xunit {
                file: self.path.clone(),
                error,
            })
    }
}

fn testcase_status(status: &CaseStatus) -> TestCaseStatus {
    let mut testcase_status = match status.outcome {
        TestOutcome::Passed => return TestCaseStatus::success(),
        TestOutcome::Failed => TestCaseStatus::non_success(NonSuccessKind::Failure),
        TestOutcome::Skipped => TestCaseStatus::skipped(),
    };
    if let Some(reason) = &status.reason {
        testcase_status.set_message(reason.to_string());
    }
    testcase_status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        list::{ExecutionMode, TestBenchDecl, TestRegistry},
        plan::RunPlan,
        reporter::{aggregator::ReportEntry, events::OutcomeReason},
        test_filter::TestFilter,
    };
    use chrono::{FixedOffset, TimeZone};
    use quick_junit::ReportUuid;
    use std::time::Duration;

    fn sample_report() -> Report {
        let registry = TestRegistry::new([
            TestBenchDecl::new("lib", "tb_pass", ExecutionMode::Isolated),
            TestBenchDecl::new("lib", "tb_same_sim", ExecutionMode::SameSimulation)
                .with_cases(["Test 1", "Test 2", "Test 3"]),
        ])
        .expect("valid registry");
        let selection = TestFilter::all().select(&registry).expect("matches");
        let plan = RunPlan::new(&selection);
        let start_time = FixedOffset::east_opt(0)
            .expect("valid offset")
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp");

        let outcomes = [
            (TestOutcome::Passed, None),
            (TestOutcome::Passed, None),
            (TestOutcome::Failed, None),
            (
                TestOutcome::Skipped,
                Some(OutcomeReason::EarlierCaseFailed {
                    name: "lib.tb_same_sim.Test 2".to_owned(),
                }),
            ),
        ];
        let mut outcomes = outcomes.into_iter();
        let mut entries = Vec::new();
        for run in plan.runs() {
            for (position, test) in run.cases().iter().enumerate() {
                let (outcome, reason) = outcomes.next().expect("one outcome per case");
                entries.push(ReportEntry::new(
                    run,
                    position,
                    *test,
                    CaseStatus {
                        outcome,
                        reason,
                        start_time,
                        time_taken: Duration::from_millis(250),
                    },
                ));
            }
        }

        Report::new(
            ReportUuid::new_v4(),
            start_time,
            Duration::from_secs(2),
            entries,
        )
    }

    #[test]
    fn suites_per_bench() {
        let report = sample_report();
        let sink = XunitSink::new("out/xunit.xml");
        let junit = sink.to_junit(&report);

        assert_eq!(junit.tests, 4);
        assert_eq!(junit.failures, 1);
        let suites: Vec<_> = junit
            .test_suites
            .iter()
            .map(|suite| (suite.name.as_str(), suite.test_cases.len()))
            .collect();
        assert_eq!(suites, vec![("lib.tb_pass", 1), ("lib.tb_same_sim", 3)]);

        let names: Vec<_> = junit.test_suites[1]
            .test_cases
            .iter()
            .map(|case| case.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "lib.tb_same_sim.Test 1",
                "lib.tb_same_sim.Test 2",
                "lib.tb_same_sim.Test 3"
            ]
        );
    }

    #[test]
    fn write_is_idempotent() {
        let report = sample_report();
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let sink = XunitSink::new(dir.path().join("nested/xunit.xml"));

        sink.write_report(&report).expect("first write succeeds");
        let first = std::fs::read(sink.path()).expect("report exists");
        sink.write_report(&report).expect("second write succeeds");
        let second = std::fs::read(sink.path()).expect("report exists");
        assert_eq!(first, second);

        let xml = String::from_utf8(first).expect("valid UTF-8");
        assert!(xml.contains(r#"name="lib.tb_same_sim.Test 3""#), "{xml}");
        assert!(xml.contains("<skipped"), "{xml}");
        assert!(xml.contains("<failure"), "{xml}");
    }
}
