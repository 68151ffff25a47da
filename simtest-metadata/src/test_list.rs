// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Root element for a serializable list of test benches and test cases, produced by
/// `simtest list -T json`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestListSummary {
    /// The total number of test cases declared in the registry.
    pub test_count: usize,

    /// The number of test cases matched by the selection patterns.
    pub selected_count: usize,

    /// Test benches, in declaration order.
    pub benches: Vec<TestBenchSummary>,
}

impl TestListSummary {
    /// Creates a new, empty summary.
    pub fn new() -> Self {
        Self {
            test_count: 0,
            selected_count: 0,
            benches: Vec::new(),
        }
    }

    /// Parses JSON output from `simtest list -T json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }

    /// Iterates over the full hierarchical names of the selected test cases, in list order.
    pub fn selected_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.benches.iter().flat_map(|bench| {
            bench
                .cases
                .iter()
                .filter(|case| case.selected)
                .map(|case| case.name.as_str())
        })
    }
}

impl Default for TestListSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// A test bench in a [`TestListSummary`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestBenchSummary {
    /// The library the bench is compiled into.
    pub library: SmolStr,

    /// The bench name, unique within its library.
    pub name: SmolStr,

    /// How the cases of this bench are executed.
    pub mode: ExecutionModeSummary,

    /// The cases of this bench in canonical order.
    pub cases: Vec<TestCaseSummary>,
}

/// The execution mode of a test bench.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionModeSummary {
    /// Every case runs in its own simulation.
    Isolated,

    /// All selected cases run in order inside one simulation.
    SameSimulation,
}

/// A test case in a [`TestBenchSummary`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestCaseSummary {
    /// The full hierarchical name, `library.bench[.case]`.
    pub name: String,

    /// The case name, or `None` for a bench without named cases.
    pub case_name: Option<SmolStr>,

    /// Whether the case was matched by the selection patterns.
    pub selected: bool,
}
