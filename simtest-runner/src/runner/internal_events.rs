// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal events used between the runner components.
//!
//! These are sent by the workers (the part that drives simulator sessions) to the dispatcher
//! (the part that coordinates with the reporter and the outside world).

use crate::{plan::SimulationRun, session::RunExecuteStatus};

#[derive(Debug)]
pub(super) enum ExecutorEvent<'a> {
    /// A worker picked up a run.
    Started {
        run: &'a SimulationRun<'a>,
        worker: usize,
    },

    /// A run finished, with one status per case.
    Finished {
        run: &'a SimulationRun<'a>,
        status: RunExecuteStatus,
    },

    /// A run was never handed to a worker.
    NotDispatched {
        run: &'a SimulationRun<'a>,
        status: RunExecuteStatus,
    },
}
