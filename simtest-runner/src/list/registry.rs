// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{IdentifierKind, RegistryBuildError};
use serde::Deserialize;
use simtest_metadata::{
    ExecutionModeSummary, TestBenchSummary, TestCaseSummary, TestListSummary,
};
use smol_str::SmolStr;
use std::{collections::HashMap, fmt, ops::Range};

/// The identity of a test bench: `library.bench`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TestBenchId {
    library: SmolStr,
    name: SmolStr,
}

impl TestBenchId {
    /// Creates a new bench identifier. Validation happens when the bench is added to a
    /// [`TestRegistry`].
    pub fn new(library: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
        }
    }

    /// The library the bench is compiled into.
    pub fn library(&self) -> &str {
        &self.library
    }

    /// The bench name, unique within its library.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TestBenchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.library, self.name)
    }
}

/// How the cases of a test bench are executed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Every case is its own simulation run.
    #[default]
    Isolated,

    /// All selected cases run in canonical order inside a single simulation run.
    SameSimulation,
}

impl ExecutionMode {
    pub(crate) fn to_summary(self) -> ExecutionModeSummary {
        match self {
            Self::Isolated => ExecutionModeSummary::Isolated,
            Self::SameSimulation => ExecutionModeSummary::SameSimulation,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolated => write!(f, "isolated"),
            Self::SameSimulation => write!(f, "same-simulation"),
        }
    }
}

/// The declaration of a test bench, as it appears in a manifest.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TestBenchDecl {
    /// The library the bench is compiled into.
    pub library: SmolStr,

    /// The bench name.
    pub name: SmolStr,

    /// How the cases are executed.
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Case names in canonical order. If empty, the bench itself is a single unnamed case.
    #[serde(default)]
    pub cases: Vec<SmolStr>,
}

impl TestBenchDecl {
    /// Creates a new declaration with no named cases.
    pub fn new(library: impl Into<SmolStr>, name: impl Into<SmolStr>, mode: ExecutionMode) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            mode,
            cases: Vec::new(),
        }
    }

    /// Appends named cases, in canonical order.
    pub fn with_cases(mut self, cases: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.cases.extend(cases.into_iter().map(Into::into));
        self
    }
}

/// A test bench in the registry.
#[derive(Clone, Debug)]
pub struct TestBench {
    id: TestBenchId,
    mode: ExecutionMode,
    cases: Range<usize>,
}

impl TestBench {
    /// The bench identifier.
    pub fn id(&self) -> &TestBenchId {
        &self.id
    }

    /// The execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The number of cases declared by this bench. Benches without named cases have one.
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }
}

/// A test case in the registry.
#[derive(Clone, Debug)]
pub struct TestCase {
    name: String,
    case_name: Option<SmolStr>,
    index: usize,
    bench_index: usize,
    position: usize,
}

/// A reference to a test case together with the bench that owns it.
#[derive(Copy, Clone, Debug)]
pub struct TestInstance<'a> {
    /// The bench this case belongs to.
    pub bench: &'a TestBench,

    case: &'a TestCase,
}

impl<'a> TestInstance<'a> {
    /// The full hierarchical name, `library.bench[.case]`.
    pub fn name(&self) -> &'a str {
        &self.case.name
    }

    /// The case name within the bench, or `None` if the bench has no named cases.
    pub fn case_name(&self) -> Option<&'a str> {
        self.case.case_name.as_deref()
    }

    /// The identifier of the owning bench.
    pub fn bench_id(&self) -> &'a TestBenchId {
        &self.bench.id
    }

    /// The position of this case in the bench's canonical order.
    pub fn position(&self) -> usize {
        self.case.position
    }

    /// The index of this case in the registry's declaration order.
    pub fn index(&self) -> usize {
        self.case.index
    }
}

impl PartialEq for TestInstance<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.case.index == other.case.index
    }
}

impl Eq for TestInstance<'_> {}

/// The catalog of every declared test bench and test case.
///
/// The registry is built once and never changes afterwards. Cases are stored in declaration order,
/// with each bench's cases contiguous and in canonical order.
#[derive(Clone, Debug)]
pub struct TestRegistry {
    benches: Vec<TestBench>,
    cases: Vec<TestCase>,
    by_name: HashMap<String, usize>,
}

impl TestRegistry {
    /// Builds a registry from bench declarations, validating names along the way.
    pub fn new(
        decls: impl IntoIterator<Item = TestBenchDecl>,
    ) -> Result<Self, RegistryBuildError> {
        let mut benches: Vec<TestBench> = Vec::new();
        let mut cases = Vec::new();
        let mut by_name = HashMap::new();
        let mut bench_ids = HashMap::new();

        for decl in decls {
            validate_identifier(IdentifierKind::Library, &decl.library)?;
            validate_identifier(IdentifierKind::Bench, &decl.name)?;
            let id = TestBenchId::new(decl.library, decl.name);
            if bench_ids.insert(id.clone(), benches.len()).is_some() {
                return Err(RegistryBuildError::DuplicateBench { bench: id });
            }

            let bench_index = benches.len();
            let start = cases.len();
            if decl.cases.is_empty() {
                let name = id.to_string();
                by_name.insert(name.clone(), cases.len());
                cases.push(TestCase {
                    name,
                    case_name: None,
                    index: cases.len(),
                    bench_index,
                    position: 0,
                });
            } else {
                for (position, case_name) in decl.cases.into_iter().enumerate() {
                    validate_case_name(&id, &case_name)?;
                    let name = format!("{id}.{case_name}");
                    if by_name.insert(name.clone(), cases.len()).is_some() {
                        return Err(RegistryBuildError::DuplicateCase {
                            bench: id,
                            case_name,
                        });
                    }
                    cases.push(TestCase {
                        name,
                        case_name: Some(case_name),
                        index: cases.len(),
                        bench_index,
                        position,
                    });
                }
            }

            benches.push(TestBench {
                id,
                mode: decl.mode,
                cases: start..cases.len(),
            });
        }

        Ok(Self {
            benches,
            cases,
            by_name,
        })
    }

    /// Returns the total number of declared test cases.
    pub fn test_count(&self) -> usize {
        self.cases.len()
    }

    /// Returns the number of declared benches.
    pub fn bench_count(&self) -> usize {
        self.benches.len()
    }

    /// Iterates over benches in declaration order.
    pub fn benches(&self) -> impl ExactSizeIterator<Item = &TestBench> + '_ {
        self.benches.iter()
    }

    /// Iterates over every test case in declaration order.
    pub fn iter_tests(&self) -> impl ExactSizeIterator<Item = TestInstance<'_>> + '_ {
        self.cases.iter().map(|case| self.instance(case))
    }

    /// Iterates over the cases of a bench in canonical order.
    pub fn bench_tests<'a>(
        &'a self,
        bench: &'a TestBench,
    ) -> impl ExactSizeIterator<Item = TestInstance<'a>> + 'a {
        self.cases[bench.cases.clone()]
            .iter()
            .map(|case| self.instance(case))
    }

    /// Looks up a test case by its full hierarchical name.
    pub fn get(&self, name: &str) -> Option<TestInstance<'_>> {
        self.by_name
            .get(name)
            .map(|&index| self.instance(&self.cases[index]))
    }

    /// Produces a machine-readable summary, marking the cases for which `is_selected` is true.
    pub fn to_summary(&self, mut is_selected: impl FnMut(TestInstance<'_>) -> bool) -> TestListSummary {
        let mut summary = TestListSummary::new();
        summary.test_count = self.test_count();
        for bench in &self.benches {
            let cases: Vec<_> = self
                .bench_tests(bench)
                .map(|instance| {
                    let selected = is_selected(instance);
                    summary.selected_count += usize::from(selected);
                    TestCaseSummary {
                        name: instance.name().to_owned(),
                        case_name: instance.case_name().map(SmolStr::new),
                        selected,
                    }
                })
                .collect();
            summary.benches.push(TestBenchSummary {
                library: bench.id.library.clone(),
                name: bench.id.name.clone(),
                mode: bench.mode.to_summary(),
                cases,
            });
        }
        summary
    }

    fn instance<'a>(&'a self, case: &'a TestCase) -> TestInstance<'a> {
        TestInstance {
            bench: &self.benches[case.bench_index],
            case,
        }
    }
}

fn validate_identifier(kind: IdentifierKind, value: &str) -> Result<(), RegistryBuildError> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value.contains('.') {
        "must not contain `.`"
    } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        "must not contain whitespace or control characters"
    } else {
        return Ok(());
    };
    Err(RegistryBuildError::InvalidIdentifier {
        kind,
        value: value.to_owned(),
        reason,
    })
}

fn validate_case_name(bench: &TestBenchId, case_name: &str) -> Result<(), RegistryBuildError> {
    // Case names travel over a line-oriented protocol, so newlines can't be allowed.
    let reason = if case_name.trim().is_empty() {
        "must not be empty"
    } else if case_name.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(RegistryBuildError::InvalidCaseName {
        bench: bench.clone(),
        case_name: case_name.to_owned(),
        reason,
    })
}
