// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partitioning a selection into simulation runs.

use crate::list::{ExecutionMode, Selection, TestBench, TestBenchId, TestInstance};
use indexmap::IndexMap;

/// One unit of work dispatched to a worker: an ordered list of cases from a single bench.
#[derive(Clone, Debug)]
pub struct SimulationRun<'a> {
    index: usize,
    bench: &'a TestBench,
    cases: Vec<TestInstance<'a>>,
}

impl<'a> SimulationRun<'a> {
    /// The position of this run in the plan.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The bench all cases in this run belong to.
    pub fn bench(&self) -> &'a TestBench {
        self.bench
    }

    /// The bench identifier.
    pub fn bench_id(&self) -> &'a TestBenchId {
        self.bench.id()
    }

    /// The cases to execute, in order.
    pub fn cases(&self) -> &[TestInstance<'a>] {
        &self.cases
    }
}

/// The ordered list of simulation runs for a selection.
#[derive(Clone, Debug)]
pub struct RunPlan<'a> {
    runs: Vec<SimulationRun<'a>>,
    test_count: usize,
}

impl<'a> RunPlan<'a> {
    /// Partitions a selection into simulation runs.
    ///
    /// Benches are ordered by their first appearance in the selection. A same-simulation bench
    /// becomes a single run holding its selected cases in canonical order. Every selected case of
    /// an isolated bench becomes its own run, in selection order.
    pub fn new(selection: &Selection<'a>) -> Self {
        let mut by_bench: IndexMap<&'a TestBenchId, (&'a TestBench, Vec<TestInstance<'a>>)> =
            IndexMap::new();
        for test in selection.iter() {
            by_bench
                .entry(test.bench_id())
                .or_insert_with(|| (test.bench, Vec::new()))
                .1
                .push(test);
        }

        let mut runs = Vec::new();
        for (bench, mut cases) in by_bench.into_values() {
            match bench.mode() {
                ExecutionMode::SameSimulation => {
                    cases.sort_by_key(|test| test.position());
                    runs.push(SimulationRun {
                        index: runs.len(),
                        bench,
                        cases,
                    });
                }
                ExecutionMode::Isolated => {
                    for test in cases {
                        runs.push(SimulationRun {
                            index: runs.len(),
                            bench,
                            cases: vec![test],
                        });
                    }
                }
            }
        }

        Self {
            runs,
            test_count: selection.len(),
        }
    }

    /// The runs, in plan order.
    pub fn runs(&self) -> &[SimulationRun<'a>] {
        &self.runs
    }

    /// The number of runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// The number of cases across all runs.
    pub fn test_count(&self) -> usize {
        self.test_count
    }
}
