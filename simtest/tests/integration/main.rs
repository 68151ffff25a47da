// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the `simtest` binary.
//!
//! These run against `fixtures/artificial`, whose simulator is a shell script speaking the line
//! protocol. Each test works on its own copy of the fixture.

#![cfg(unix)]

use color_eyre::eyre::Result;
use fixtures::{Outcome, SimtestCli, outcomes, xunit_outcomes};
use pretty_assertions::assert_eq;
use simtest_metadata::{SimtestExitCode, TestListSummary};
use temp_project::TempProject;

mod fixtures;
mod temp_project;

#[test]
fn list_json() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["list", "--message-format", "json", "lib.tb_same_sim.*"])
        .output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");

    let summary = TestListSummary::parse_json(&output.stdout)?;
    assert_eq!(summary.test_count, 11);
    assert_eq!(
        summary.selected_names().collect::<Vec<_>>(),
        vec![
            "lib.tb_same_sim.Test 1",
            "lib.tb_same_sim.Test 2",
            "lib.tb_same_sim.Test 3"
        ],
    );
    Ok(())
}

#[test]
fn failure_skips_rest_of_same_simulation() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["run", "lib.tb_pass", "lib.tb_same_sim.*"])
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::TEST_RUN_FAILED),
        "{output:?}"
    );
    assert!(output.stderr.contains("SKIP"), "{output:?}");

    assert_eq!(
        xunit_outcomes(&p.output_dir().join("xunit.xml"))?,
        outcomes(&[
            (Outcome::Passed, "lib.tb_pass"),
            (Outcome::Passed, "lib.tb_same_sim.Test 1"),
            (Outcome::Failed, "lib.tb_same_sim.Test 2"),
            (Outcome::Skipped, "lib.tb_same_sim.Test 3"),
        ]),
    );
    Ok(())
}

#[test]
fn unselected_cases_are_not_reported() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["run", "*same_sim.Test 2*"])
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::TEST_RUN_FAILED),
        "{output:?}"
    );

    assert_eq!(
        xunit_outcomes(&p.output_dir().join("xunit.xml"))?,
        outcomes(&[(Outcome::Failed, "lib.tb_same_sim.Test 2")]),
    );
    Ok(())
}

#[test]
fn elaborate_only() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["run", "--elaborate", "lib.tb_broken.*", "lib.tb_pass"])
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::TEST_RUN_FAILED),
        "{output:?}"
    );
    assert_eq!(
        xunit_outcomes(&p.output_dir().join("xunit.xml"))?,
        outcomes(&[
            (Outcome::Passed, "lib.tb_pass"),
            (Outcome::Failed, "lib.tb_broken.check"),
        ]),
    );

    let output = SimtestCli::new(&p)
        .args(["run", "--elaborate", "lib.tb_pass", "lib.tb_isolated.*"])
        .output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    Ok(())
}

#[test]
fn crashed_simulator_is_replaced() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["run", "-p", "1", "lib.tb_crash.*", "lib.tb_pass"])
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::TEST_RUN_FAILED),
        "{output:?}"
    );
    assert_eq!(
        xunit_outcomes(&p.output_dir().join("xunit.xml"))?,
        outcomes(&[
            (Outcome::Passed, "lib.tb_pass"),
            (Outcome::Passed, "lib.tb_crash.before"),
            (Outcome::Failed, "lib.tb_crash.boom"),
            (Outcome::Failed, "lib.tb_crash.after"),
        ]),
    );
    Ok(())
}

#[test]
fn run_timeout() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["run", "--run-timeout", "1s", "lib.tb_hang.*", "lib.tb_pass"])
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::TEST_RUN_FAILED),
        "{output:?}"
    );
    assert_eq!(
        xunit_outcomes(&p.output_dir().join("xunit.xml"))?,
        outcomes(&[
            (Outcome::Passed, "lib.tb_pass"),
            (Outcome::Failed, "lib.tb_hang.forever"),
        ]),
    );
    Ok(())
}

#[test]
fn session_modes() -> Result<()> {
    let args = ["run", "-p", "1", "lib.tb_pass", "lib.tb_isolated.*"];

    let p = TempProject::new()?;
    let output = SimtestCli::new(&p).args(args).output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    assert_eq!(p.sessions_started()?, 1, "persistent sessions are reused");

    let p = TempProject::new()?;
    let output = SimtestCli::new(&p).args(args).args(["--new-sim"]).output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    assert_eq!(p.sessions_started()?, 3, "one session per simulation run");
    Ok(())
}

#[test]
fn relative_paths() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::from_parent_dir(&p)
        .args(["run", "lib.tb_pass"])
        .output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    assert_eq!(
        p.sessions_started()?,
        1,
        "the simulator wrote into the output directory"
    );
    assert_eq!(
        xunit_outcomes(&p.output_dir().join("xunit.xml"))?,
        outcomes(&[(Outcome::Passed, "lib.tb_pass")]),
    );

    // A relative --output-path is resolved against the current directory, for simtest and the
    // simulator alike.
    let output = SimtestCli::from_parent_dir(&p)
        .args(["run", "--output-path", "elsewhere", "lib.tb_pass"])
        .output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    let elsewhere = p.parent_dir().join("elsewhere");
    assert!(elsewhere.join("sessions.log").is_file(), "{output:?}");
    assert!(elsewhere.join("xunit.xml").is_file(), "{output:?}");
    Ok(())
}

#[test]
fn report_written_after_output_error() -> Result<()> {
    let p = TempProject::new()?;
    let read_only = p.parent_dir().join("read-only");
    std::fs::write(&read_only, "")?;

    let output = SimtestCli::new(&p)
        .args(["run", "lib.tb_pass"])
        .unwritable_stderr(&read_only)
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::WRITE_OUTPUT_ERROR),
        "{output:?}"
    );

    let reported = xunit_outcomes(&p.output_dir().join("xunit.xml"))?;
    let names: Vec<_> = reported.iter().map(|(_, name)| name.as_str()).collect();
    assert_eq!(names, vec!["lib.tb_pass"]);
    Ok(())
}

#[test]
fn no_matches() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p).args(["run", "lib.nothing"]).output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::NO_TESTS_MATCHED),
        "{output:?}"
    );
    assert!(
        !p.output_dir().join("xunit.xml").exists(),
        "no report is written"
    );

    let output = SimtestCli::new(&p)
        .args(["run", "--no-matches", "warn", "lib.nothing"])
        .output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    assert!(output.stderr.contains("warning: "), "{output:?}");
    assert_eq!(xunit_outcomes(&p.output_dir().join("xunit.xml"))?, Vec::new());
    Ok(())
}

#[test]
fn custom_profile_and_clean() -> Result<()> {
    let p = TempProject::new()?;
    std::fs::create_dir_all(p.output_dir())?;
    let stale = p.output_dir().join("stale.txt");
    std::fs::write(&stale, "from an earlier run")?;

    let output = SimtestCli::new(&p)
        .args(["run", "-P", "ci", "--clean", "lib.tb_pass"])
        .output()?;
    assert_eq!(output.exit_code, Some(SimtestExitCode::OK), "{output:?}");
    assert!(!stale.exists(), "--clean removed the output directory");
    assert_eq!(
        xunit_outcomes(&p.output_dir().join("ci/junit.xml"))?,
        outcomes(&[(Outcome::Passed, "lib.tb_pass")]),
    );
    Ok(())
}

#[test]
fn setup_errors() -> Result<()> {
    let p = TempProject::new()?;

    let output = SimtestCli::new(&p)
        .args(["run", "-P", "nonexistent"])
        .output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::SETUP_ERROR),
        "{output:?}"
    );
    assert!(
        output.stderr.contains("profile `nonexistent` not found"),
        "{output:?}"
    );

    std::fs::write(
        p.workspace_root().join("simtest-manifest.toml"),
        "[[bench]]\nlibrary = \"lib\"\nname = \"tb.bad\"\n",
    )?;
    let output = SimtestCli::new(&p).args(["list"]).output()?;
    assert_eq!(
        output.exit_code,
        Some(SimtestExitCode::SETUP_ERROR),
        "{output:?}"
    );
    Ok(())
}
