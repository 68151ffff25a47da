// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out live test events in a human-readable form.

use super::events::{CaseStatus, RunStats, TestEvent, TestEventKind, TestOutcome};
use crate::helpers::{format_duration, plural};
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use swrite::{SWrite, swrite};

#[derive(Debug)]
pub(crate) struct TestDisplayer {
    styles: Styles,
    verbose: bool,
    // Non-passing cases, printed again after the summary.
    final_outcomes: Vec<(TestOutcome, String)>,
}

impl TestDisplayer {
    pub(crate) fn new(colorize: bool, verbose: bool) -> Self {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }
        Self {
            styles,
            verbose,
            final_outcomes: Vec::new(),
        }
    }

    pub(crate) fn write_event(
        &mut self,
        event: &TestEvent<'_>,
        mut writer: impl Write,
    ) -> io::Result<()> {
        match &event.kind {
            TestEventKind::RunStarted {
                test_count,
                run_count,
                worker_count,
                ..
            } => {
                writeln!(
                    writer,
                    "{:>12} {} {} across {} {} ({} {})",
                    "Starting".style(self.styles.pass),
                    test_count.style(self.styles.count),
                    plural::tests_str(*test_count),
                    run_count.style(self.styles.count),
                    plural::runs_str(*run_count),
                    worker_count.style(self.styles.count),
                    plural::workers_str(*worker_count),
                )?;
            }
            TestEventKind::SimulationStarted { run, worker, .. } => {
                if self.verbose {
                    writeln!(
                        writer,
                        "{:>12} [worker {worker}] {} ({} {})",
                        "START".style(self.styles.pass),
                        run.bench_id().style(self.styles.bench_id),
                        run.cases().len().style(self.styles.count),
                        plural::tests_str(run.cases().len()),
                    )?;
                }
            }
            TestEventKind::TestFinished {
                test_instance,
                status,
                ..
            } => {
                self.write_status_line(test_instance.name(), status, &mut writer)?;
                if !status.outcome.is_success() {
                    self.final_outcomes
                        .push((status.outcome, test_instance.name().to_owned()));
                }
            }
            TestEventKind::SimulationFinished {
                run,
                elaboration_failed,
                ..
            } => {
                if *elaboration_failed {
                    writeln!(
                        writer,
                        "{:>12} {}",
                        "ELAB FAIL".style(self.styles.fail),
                        run.bench_id().style(self.styles.bench_id),
                    )?;
                }
            }
            TestEventKind::RunBeginCancel { running, reason } => {
                write!(
                    writer,
                    "{:>12} due to {}",
                    "Canceling".style(self.styles.fail),
                    reason.to_static_str().style(self.styles.fail),
                )?;
                if *running > 0 {
                    write!(
                        writer,
                        ": {} {} running",
                        running.style(self.styles.count),
                        plural::runs_str(*running),
                    )?;
                }
                writeln!(writer)?;
            }
            TestEventKind::RunFinished {
                elapsed, run_stats, ..
            } => {
                let summary_style = if run_stats.is_success() {
                    self.styles.pass
                } else {
                    self.styles.fail
                };
                write!(
                    writer,
                    "------------\n{:>12} {} ",
                    "Summary".style(summary_style),
                    format_duration(*elapsed),
                )?;

                write!(writer, "{}", run_stats.finished_count.style(self.styles.count))?;
                if run_stats.finished_count != run_stats.initial_test_count {
                    write!(
                        writer,
                        "/{}",
                        run_stats.initial_test_count.style(self.styles.count)
                    )?;
                }
                let tests_str = plural::tests_plural_if(
                    run_stats.initial_test_count != 1 || run_stats.finished_count != 1,
                );
                writeln!(
                    writer,
                    " {tests_str} run: {}",
                    self.summary_str(run_stats)
                )?;

                for (outcome, name) in &self.final_outcomes {
                    let (label, style) = self.outcome_label(*outcome);
                    writeln!(writer, "{:>12} {}", label.style(style), name)?;
                }
            }
        }

        Ok(())
    }

    fn write_status_line(
        &self,
        name: &str,
        status: &CaseStatus,
        writer: &mut impl Write,
    ) -> io::Result<()> {
        let (label, style) = self.outcome_label(status.outcome);
        write!(
            writer,
            "{:>12} {} {}",
            label.style(style),
            format_duration(status.time_taken),
            name.style(self.styles.test_name),
        )?;
        if let Some(reason) = &status.reason {
            write!(writer, " ({reason})")?;
        }
        writeln!(writer)
    }

    fn outcome_label(&self, outcome: TestOutcome) -> (&'static str, Style) {
        match outcome {
            TestOutcome::Passed => ("PASS", self.styles.pass),
            TestOutcome::Failed => ("FAIL", self.styles.fail),
            TestOutcome::Skipped => ("SKIP", self.styles.skip),
        }
    }

    fn summary_str(&self, run_stats: &RunStats) -> String {
        let mut parts = vec![format!(
            "{} {}",
            run_stats.passed.style(self.styles.count),
            "passed".style(self.styles.pass)
        )];
        if run_stats.failed > 0 {
            let mut failed = format!(
                "{} {}",
                run_stats.failed.style(self.styles.count),
                "failed".style(self.styles.fail)
            );
            if run_stats.elaboration_failed > 0 {
                swrite!(
                    failed,
                    " ({} {} failed to elaborate)",
                    run_stats.elaboration_failed.style(self.styles.count),
                    plural::runs_str(run_stats.elaboration_failed),
                );
            }
            parts.push(failed);
        }
        parts.push(format!(
            "{} {}",
            run_stats.skipped.style(self.styles.count),
            "skipped".style(self.styles.skip)
        ));
        parts.join(", ")
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    test_name: Style,
    bench_id: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.test_name = Style::new().blue().bold();
        self.bench_id = Style::new().magenta().bold();
    }
}
