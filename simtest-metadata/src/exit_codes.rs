// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `simtest` failures.
///
/// A completed run exits with [`OK`](Self::OK) if every selected test passed, and with
/// [`TEST_RUN_FAILED`](Self::TEST_RUN_FAILED) otherwise. Skipped tests count as not passing.
///
/// The remaining codes are reserved for problems that prevented a run from completing.
pub enum SimtestExitCode {}

impl SimtestExitCode {
    /// Every selected test passed, or no tests were selected.
    pub const OK: i32 = 0;

    /// At least one selected test failed or was skipped.
    pub const TEST_RUN_FAILED: i32 = 1;

    /// Test patterns were provided, but none of them matched any test.
    pub const NO_TESTS_MATCHED: i32 = 4;

    /// A user issue happened while setting up a simtest invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing the report, or data to stdout or stderr, produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// Returns the exit code for a completed run, given whether every test passed.
    pub fn for_run(all_passed: bool) -> i32 {
        if all_passed {
            Self::OK
        } else {
            Self::TEST_RUN_FAILED
        }
    }
}
