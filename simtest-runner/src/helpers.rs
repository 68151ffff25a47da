// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for simtest-runner.

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test case" if `count` is 1, otherwise "test cases".
    pub fn tests_str(count: usize) -> &'static str {
        tests_plural_if(count != 1)
    }

    /// Returns "test cases" if `plural` is true, otherwise "test case".
    pub fn tests_plural_if(plural: bool) -> &'static str {
        if plural { "test cases" } else { "test case" }
    }

    /// Returns "run" if `count` is 1, otherwise "runs".
    pub fn runs_str(count: usize) -> &'static str {
        if count == 1 { "run" } else { "runs" }
    }

    /// Returns "worker" if `count` is 1, otherwise "workers".
    pub fn workers_str(count: usize) -> &'static str {
        if count == 1 { "worker" } else { "workers" }
    }
}

/// Write out a duration in the `[   1.234s]` form used by status lines.
pub(crate) fn format_duration(duration: std::time::Duration) -> String {
    // * > means right-align.
    // * 8 is the number of characters to pad to.
    // * .3 means print three digits after the decimal point.
    format!("[{:>8.3?}s]", duration.as_secs_f64())
}
