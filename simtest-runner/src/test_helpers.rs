// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory simulator with scripted results, for exercising sessions and the runner.

use crate::{
    errors::{SessionFatalError, SessionStartError},
    list::TestBenchId,
    simulator::{CaseResult, ElaborateResult, SessionContext, Simulator, SimulatorProcess},
};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CaseScript {
    Fail,
    Crash,
    Hang,
}

#[derive(Debug, Default)]
struct ScriptState {
    elaboration_failures: HashSet<String>,
    cases: HashMap<String, CaseScript>,
    max_starts: Option<usize>,
    starts: usize,
    terminations: usize,
    requests: Vec<String>,
}

/// Every case passes and every bench elaborates unless scripted otherwise. Cases are identified
/// by their full name.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScriptedSimulator {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSimulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_elaboration(&self, bench: &str) {
        self.lock().elaboration_failures.insert(bench.to_owned());
    }

    pub(crate) fn fail_case(&self, name: &str) {
        self.lock().cases.insert(name.to_owned(), CaseScript::Fail);
    }

    /// The process reports a fatal error when asked to run this case.
    pub(crate) fn crash_case(&self, name: &str) {
        self.lock().cases.insert(name.to_owned(), CaseScript::Crash);
    }

    /// The process never replies when asked to run this case.
    pub(crate) fn hang_case(&self, name: &str) {
        self.lock().cases.insert(name.to_owned(), CaseScript::Hang);
    }

    /// Sessions after the first `count` fail to start.
    pub(crate) fn limit_starts(&self, count: usize) {
        self.lock().max_starts = Some(count);
    }

    pub(crate) fn starts(&self) -> usize {
        self.lock().starts
    }

    pub(crate) fn terminations(&self) -> usize {
        self.lock().terminations
    }

    /// Requests received across all processes, in order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }
}

impl Simulator for ScriptedSimulator {
    type Process = ScriptedProcess;

    async fn start(&self, _cx: SessionContext) -> Result<Self::Process, SessionStartError> {
        let mut state = self.lock();
        if state.max_starts.is_some_and(|max| state.starts >= max) {
            return Err(SessionStartError::Other {
                message: "no simulator licenses available".to_owned(),
            });
        }
        state.starts += 1;
        Ok(ScriptedProcess {
            state: self.state.clone(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedProcess {
    state: Arc<Mutex<ScriptState>>,
}

impl SimulatorProcess for ScriptedProcess {
    async fn elaborate(&mut self, bench: &TestBenchId) -> Result<ElaborateResult, SessionFatalError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("elaborate {bench}"));
        if state.elaboration_failures.contains(&bench.to_string()) {
            Ok(ElaborateResult::Failure)
        } else {
            Ok(ElaborateResult::Success)
        }
    }

    async fn run_case(
        &mut self,
        bench: &TestBenchId,
        case_name: Option<&str>,
    ) -> Result<CaseResult, SessionFatalError> {
        let name = match case_name {
            Some(case_name) => format!("{bench}.{case_name}"),
            None => bench.to_string(),
        };
        let script = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(format!("run {name}"));
            state.cases.get(&name).copied()
        };

        match script {
            None => Ok(CaseResult::Passed),
            Some(CaseScript::Fail) => Ok(CaseResult::Failed),
            Some(CaseScript::Crash) => Err(SessionFatalError::Other {
                message: "simulator crashed".to_owned(),
            }),
            Some(CaseScript::Hang) => std::future::pending().await,
        }
    }

    async fn terminate(&mut self) {
        self.state.lock().unwrap().terminations += 1;
    }
}
