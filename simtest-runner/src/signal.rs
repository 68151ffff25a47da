// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cancelling a run on process signals.
//!
//! An interrupt (SIGINT, or Ctrl-C on Windows) cancels with [`CancelReason::Interrupt`]. On Unix,
//! SIGTERM and SIGHUP cancel with [`CancelReason::Signal`].

use crate::{errors::SignalHandlerSetupError, reporter::events::CancelReason};
use tracing::debug;

/// The kind of signal handling to set up for a test run.
///
/// A `SignalHandlerKind` can be passed into
/// [`TestRunnerBuilder::build`](crate::runner::TestRunnerBuilder::build).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SignalHandlerKind {
    /// Cancel the run on interrupt and termination signals.
    Standard,

    /// Ignore signals. Useful for tests.
    Noop,
}

impl SignalHandlerKind {
    /// Must be called from within a Tokio runtime.
    pub(crate) fn build(self) -> Result<SignalHandler, SignalHandlerSetupError> {
        let listeners = match self {
            Self::Standard => imp::standard_listeners()?,
            Self::Noop => Vec::new(),
        };
        Ok(SignalHandler { listeners })
    }
}

/// Waits on every registered signal, yielding the cancel reason each one maps to.
#[derive(Debug)]
pub(crate) struct SignalHandler {
    listeners: Vec<SignalListener>,
}

impl SignalHandler {
    /// Returns `None` once no more signals can be received.
    pub(crate) async fn recv(&mut self) -> Option<CancelReason> {
        while !self.listeners.is_empty() {
            let (received, index, pending) = futures::future::select_all(
                self.listeners
                    .iter_mut()
                    .map(|listener| Box::pin(listener.recv())),
            )
            .await;
            drop(pending);

            match received {
                Some(reason) => return Some(reason),
                None => {
                    let listener = self.listeners.swap_remove(index);
                    debug!(signal = listener.name, "signal stream closed");
                }
            }
        }
        None
    }
}

#[derive(Debug)]
struct SignalListener {
    name: &'static str,
    reason: CancelReason,
    stream: imp::SignalStream,
}

impl SignalListener {
    async fn recv(&mut self) -> Option<CancelReason> {
        self.stream.recv().await?;
        debug!(signal = self.name, reason = ?self.reason, "received signal");
        Some(self.reason)
    }
}

#[cfg(unix)]
mod imp {
    use super::SignalListener;
    use crate::reporter::events::CancelReason;
    use tokio::signal::unix::{SignalKind, signal};

    pub(super) type SignalStream = tokio::signal::unix::Signal;

    pub(super) fn standard_listeners() -> std::io::Result<Vec<SignalListener>> {
        let mut listeners = Vec::new();
        for (name, kind, reason) in [
            ("SIGINT", SignalKind::interrupt(), CancelReason::Interrupt),
            ("SIGTERM", SignalKind::terminate(), CancelReason::Signal),
            ("SIGHUP", SignalKind::hangup(), CancelReason::Signal),
        ] {
            listeners.push(SignalListener {
                name,
                reason,
                stream: signal(kind)?,
            });
        }
        Ok(listeners)
    }
}

#[cfg(windows)]
mod imp {
    use super::SignalListener;
    use crate::reporter::events::CancelReason;

    pub(super) type SignalStream = tokio::signal::windows::CtrlC;

    pub(super) fn standard_listeners() -> std::io::Result<Vec<SignalListener>> {
        Ok(vec![SignalListener {
            name: "Ctrl-C",
            reason: CancelReason::Interrupt,
            stream: tokio::signal::windows::ctrl_c()?,
        }])
    }
}
