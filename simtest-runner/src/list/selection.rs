// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{TestInstance, TestRegistry};
use crate::errors::WriteTestListError;
use owo_colors::{OwoColorize, Style};
use simtest_metadata::TestListSummary;
use std::io::{self, Write};

/// How `simtest list` prints a [`Selection`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ListFormat {
    /// Selected cases grouped by bench. Verbose output also shows unselected cases and each
    /// bench's execution mode.
    Human {
        /// Whether to produce verbose output.
        verbose: bool,
    },

    /// A [`TestListSummary`] as compact JSON.
    Json,

    /// A [`TestListSummary`] as indented JSON.
    JsonPretty,
}

/// An ordered, deduplicated list of test cases drawn from a [`TestRegistry`].
///
/// Selections are produced by [`TestFilter::select`](crate::test_filter::TestFilter::select).
/// Cases are kept in registry declaration order.
#[derive(Clone, Debug)]
pub struct Selection<'a> {
    registry: &'a TestRegistry,
    tests: Vec<TestInstance<'a>>,
    selected: Vec<bool>,
}

impl<'a> Selection<'a> {
    pub(crate) fn new(
        registry: &'a TestRegistry,
        tests: impl IntoIterator<Item = TestInstance<'a>>,
    ) -> Self {
        let mut selected = vec![false; registry.test_count()];
        let tests = tests
            .into_iter()
            .filter(|test| !std::mem::replace(&mut selected[test.index()], true))
            .collect();
        Self {
            registry,
            tests,
            selected,
        }
    }

    /// Returns a selection that contains no test cases.
    pub fn empty(registry: &'a TestRegistry) -> Self {
        Self::new(registry, std::iter::empty())
    }

    /// The registry this selection was drawn from.
    pub fn registry(&self) -> &'a TestRegistry {
        self.registry
    }

    /// The number of selected cases.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if no cases are selected.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Iterates over the selected cases in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = TestInstance<'a>> + '_ {
        self.tests.iter().copied()
    }

    /// Returns true if `test` is part of this selection.
    pub fn contains(&self, test: TestInstance<'_>) -> bool {
        self.selected.get(test.index()).copied().unwrap_or(false)
    }

    /// Produces a machine-readable summary of the registry, with this selection marked.
    pub fn to_summary(&self) -> TestListSummary {
        self.registry.to_summary(|test| self.contains(test))
    }

    /// Outputs this selection to the given writer.
    pub fn write(
        &self,
        format: ListFormat,
        writer: impl Write,
        colorize: bool,
    ) -> Result<(), WriteTestListError> {
        match format {
            ListFormat::Human { verbose } => self
                .write_human(writer, verbose, colorize)
                .map_err(WriteTestListError::Io),
            ListFormat::Json => serde_json::to_writer(writer, &self.to_summary())
                .map_err(WriteTestListError::Json),
            ListFormat::JsonPretty => serde_json::to_writer_pretty(writer, &self.to_summary())
                .map_err(WriteTestListError::Json),
        }
    }

    /// Outputs this selection as an uncolored string with the given format.
    pub fn to_string(&self, format: ListFormat) -> Result<String, WriteTestListError> {
        let mut buf = Vec::with_capacity(1024);
        self.write(format, &mut buf, false)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn write_human(&self, mut writer: impl Write, verbose: bool, colorize: bool) -> io::Result<()> {
        let styles = if colorize {
            ListStyles::colorized()
        } else {
            ListStyles::default()
        };

        for bench in self.registry.benches() {
            // Skip benches with nothing selected, unless this is verbose output.
            if !verbose
                && !self
                    .registry
                    .bench_tests(bench)
                    .any(|test| self.contains(test))
            {
                continue;
            }

            writeln!(writer, "{}:", bench.id().style(styles.bench_id))?;
            if verbose {
                writeln!(writer, "  {} {}", "mode:".style(styles.field), bench.mode())?;
            }

            for test in self.registry.bench_tests(bench) {
                let selected = self.contains(test);
                if !selected && !verbose {
                    continue;
                }
                let label = test.case_name().unwrap_or("(bench)");
                write!(writer, "    {}", label.style(styles.case_name))?;
                if !selected {
                    write!(writer, " (skipped)")?;
                }
                writeln!(writer)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct ListStyles {
    bench_id: Style,
    case_name: Style,
    field: Style,
}

impl ListStyles {
    fn colorized() -> Self {
        Self {
            bench_id: Style::new().magenta().bold(),
            case_name: Style::new().blue().bold(),
            field: Style::new().yellow().bold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{ExecutionMode, TestBenchDecl};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn registry() -> TestRegistry {
        TestRegistry::new([
            TestBenchDecl::new("lib", "tb_pass", ExecutionMode::Isolated),
            TestBenchDecl::new("lib", "tb_same_sim", ExecutionMode::SameSimulation)
                .with_cases(["Test 1", "Test 2", "Test 3"]),
        ])
        .expect("valid registry")
    }

    #[test]
    fn dedup_and_membership() {
        let registry = registry();
        let test_2 = registry.get("lib.tb_same_sim.Test 2").expect("exists");
        let tb_pass = registry.get("lib.tb_pass").expect("exists");
        let selection = Selection::new(&registry, [test_2, tb_pass, test_2]);
        assert_eq!(selection.len(), 2);
        assert!(selection.contains(test_2));
        assert!(selection.contains(tb_pass));
        assert!(!selection.contains(registry.get("lib.tb_same_sim.Test 1").expect("exists")));
        assert!(Selection::empty(&registry).is_empty());
    }

    #[test]
    fn write_human() {
        let registry = registry();
        let selection = Selection::new(
            &registry,
            [registry.get("lib.tb_same_sim.Test 2").expect("exists")],
        );

        let output = selection
            .to_string(ListFormat::Human { verbose: false })
            .expect("writing to a buffer succeeds");
        assert_eq!(
            output,
            indoc! {"
                lib.tb_same_sim:
                    Test 2
            "}
        );

        let output = selection
            .to_string(ListFormat::Human { verbose: true })
            .expect("writing to a buffer succeeds");
        assert_eq!(
            output,
            indoc! {"
                lib.tb_pass:
                  mode: isolated
                    (bench) (skipped)
                lib.tb_same_sim:
                  mode: same-simulation
                    Test 1 (skipped)
                    Test 2
                    Test 3 (skipped)
            "}
        );
    }

    #[test]
    fn write_json() {
        let registry = registry();
        let selection = Selection::new(&registry, registry.iter_tests());
        let output = selection
            .to_string(ListFormat::Json)
            .expect("writing to a buffer succeeds");
        assert_eq!(output.lines().count(), 1, "compact JSON is one line");
        let summary = TestListSummary::parse_json(&output).expect("valid JSON");
        assert_eq!(summary.test_count, 4);
        assert_eq!(summary.selected_count, 4);
        assert_eq!(summary, selection.to_summary());

        let pretty = selection
            .to_string(ListFormat::JsonPretty)
            .expect("writing to a buffer succeeds");
        assert!(pretty.lines().count() > 1, "pretty JSON is indented");
        assert_eq!(
            TestListSummary::parse_json(&pretty).expect("valid JSON"),
            summary
        );
    }
}
