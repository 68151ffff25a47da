// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{CaseResult, ElaborateResult, SessionContext, Simulator, SimulatorProcess};
use crate::{
    config::SimtestConfig,
    errors::{SessionFatalError, SessionStartError, SimulatorNotConfigured},
    list::TestBenchId,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, io, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
};
use tracing::{debug, warn};

/// Environment variable set to the output directory for every simulator process.
pub const OUTPUT_PATH_ENV: &str = "SIMTEST_OUTPUT_PATH";

/// Environment variable set to the run ID for every simulator process.
pub const RUN_ID_ENV: &str = "SIMTEST_RUN_ID";

/// Environment variable set to the index of the worker that owns the simulator process.
pub const WORKER_ENV: &str = "SIMTEST_WORKER";

const RESULT_PREFIX: &str = "result:";

/// A simulator driven over a line protocol on standard input and output.
///
/// For each request, simtest writes a single line to the process's standard input:
///
/// * `elaborate <library>.<bench>`
/// * `run <library>.<bench>` for benches without named cases, or
///   `run <library>.<bench> <case name>` otherwise
/// * `quit` when the session is being terminated
///
/// The process answers `elaborate` and `run` with a line `result: pass` or `result: fail`. Any
/// other output is treated as a transcript and logged at debug level. If the process exits or
/// closes its standard output before answering, the session is considered crashed.
#[derive(Clone, Debug)]
pub struct CommandSimulator {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Utf8PathBuf,
    output_path: Utf8PathBuf,
    grace_period: Duration,
}

impl CommandSimulator {
    /// Creates a simulator from the `[simulator]` section of the config.
    ///
    /// Processes are started in the workspace root.
    pub fn new(
        config: &SimtestConfig,
        output_path: impl Into<Utf8PathBuf>,
    ) -> Result<Self, SimulatorNotConfigured> {
        let simulator = config.simulator();
        let program = simulator
            .program()
            .ok_or_else(|| SimulatorNotConfigured::new(config.config_file()))?;

        Ok(Self {
            program: program.to_owned(),
            args: simulator.args().to_vec(),
            env: simulator.env().clone(),
            cwd: config.workspace_root().to_owned(),
            output_path: output_path.into(),
            grace_period: simulator.terminate_grace_period(),
        })
    }

    /// The program that is launched.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The directory processes are started in.
    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }
}

impl Simulator for CommandSimulator {
    type Process = CommandSimulatorProcess;

    async fn start(&self, cx: SessionContext) -> Result<Self::Process, SessionStartError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .envs(&self.env)
            .env(OUTPUT_PATH_ENV, &self.output_path)
            .env(RUN_ID_ENV, cx.run_id.to_string())
            .env(WORKER_ENV, cx.worker.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|error| SessionStartError::Spawn {
            program: self.program.clone(),
            error,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SessionStartError::MissingStdio {
                program: self.program.clone(),
            });
        };
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, cx.worker));
        }

        debug!(
            program = %self.program,
            pid = ?child.id(),
            worker = cx.worker,
            "started simulator process",
        );

        Ok(CommandSimulatorProcess {
            program: self.program.clone(),
            worker: cx.worker,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            grace_period: self.grace_period,
        })
    }
}

/// A running simulator process started by [`CommandSimulator`].
#[derive(Debug)]
pub struct CommandSimulatorProcess {
    program: String,
    worker: usize,
    child: Child,
    // None once `quit` has been sent.
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    grace_period: Duration,
}

impl CommandSimulatorProcess {
    async fn request(&mut self, request: String) -> Result<bool, SessionFatalError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SessionFatalError::Write {
                request,
                error: io::Error::new(io::ErrorKind::BrokenPipe, "simulator input is closed"),
            });
        };

        let line = format!("{request}\n");
        let write_res = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(error) => Err(error),
        };
        if let Err(error) = write_res {
            return Err(SessionFatalError::Write { request, error });
        }

        loop {
            match self.stdout.next_line().await {
                Ok(Some(line)) => {
                    let Some(result) = line.strip_prefix(RESULT_PREFIX) else {
                        debug!(worker = self.worker, "{line}");
                        continue;
                    };
                    return match result.trim() {
                        "pass" => Ok(true),
                        "fail" => Ok(false),
                        other => Err(SessionFatalError::InvalidResult {
                            request,
                            result: other.to_owned(),
                        }),
                    };
                }
                Ok(None) => return Err(SessionFatalError::UnexpectedEof { request }),
                Err(error) => return Err(SessionFatalError::Read { request, error }),
            }
        }
    }
}

impl SimulatorProcess for CommandSimulatorProcess {
    async fn elaborate(&mut self, bench: &TestBenchId) -> Result<ElaborateResult, SessionFatalError> {
        match self.request(format!("elaborate {bench}")).await? {
            true => Ok(ElaborateResult::Success),
            false => Ok(ElaborateResult::Failure),
        }
    }

    async fn run_case(
        &mut self,
        bench: &TestBenchId,
        case_name: Option<&str>,
    ) -> Result<CaseResult, SessionFatalError> {
        let request = match case_name {
            Some(case_name) => format!("run {bench} {case_name}"),
            None => format!("run {bench}"),
        };
        match self.request(request).await? {
            true => Ok(CaseResult::Passed),
            false => Ok(CaseResult::Failed),
        }
    }

    async fn terminate(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            // The process may already have exited, so write errors are expected here. Dropping
            // stdin closes the pipe.
            if stdin.write_all(b"quit\n").await.is_ok() {
                let _ = stdin.flush().await;
            }
        }

        match tokio::time::timeout(self.grace_period, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(
                    program = %self.program,
                    worker = self.worker,
                    "simulator process exited with {status}",
                );
            }
            Ok(Err(error)) => {
                warn!(
                    "error waiting for simulator `{}` to exit: {error}",
                    self.program
                );
            }
            Err(_) => {
                debug!(
                    program = %self.program,
                    worker = self.worker,
                    "simulator did not exit within {}, killing it",
                    humantime::format_duration(self.grace_period),
                );
                if let Err(error) = self.child.kill().await {
                    warn!("error killing simulator `{}`: {error}", self.program);
                }
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, worker: usize) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(worker, "{line}");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::SimtestConfig;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const DRIVER: &str = indoc! {r#"
        while IFS= read -r line; do
            case "$line" in
                "elaborate lib.tb_broken") echo "error: unbound component"; echo "result: fail" ;;
                elaborate*) echo "result: pass" ;;
                "run lib.tb_env")
                    if [ -n "$SIMTEST_OUTPUT_PATH" ] && [ "$SIMTEST_WORKER" = "3" ]; then
                        echo "result: pass"
                    else
                        echo "result: fail"
                    fi ;;
                "run lib.tb Test 1") echo "result: pass" ;;
                "run lib.tb Test 2") echo "result: fail" ;;
                "run lib.tb crash") exit 3 ;;
                "run lib.tb garbled") echo "result: maybe" ;;
                quit) exit 0 ;;
            esac
        done
    "#};

    fn simulator(dir: &Utf8Path) -> CommandSimulator {
        let config_dir = dir.join(".config");
        std::fs::create_dir_all(&config_dir).expect("created .config");
        std::fs::write(dir.join("driver.sh"), DRIVER).expect("wrote driver");
        std::fs::write(
            config_dir.join("simtest.toml"),
            indoc! {r#"
                [simulator]
                program = "sh"
                args = ["driver.sh"]
                terminate-grace-period = "1s"
            "#},
        )
        .expect("wrote config");
        let config = SimtestConfig::from_sources(dir, None).expect("valid config");
        CommandSimulator::new(&config, dir.join("out")).expect("simulator configured")
    }

    fn cx() -> SessionContext {
        SessionContext {
            run_id: quick_junit::ReportUuid::new_v4(),
            worker: 3,
        }
    }

    #[tokio::test]
    async fn line_protocol() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let simulator = simulator(dir.path());
        let mut process = simulator.start(cx()).await.expect("started");
        let bench = TestBenchId::new("lib", "tb");

        assert_eq!(
            process.elaborate(&bench).await.expect("replied"),
            ElaborateResult::Success
        );
        assert_eq!(
            process
                .elaborate(&TestBenchId::new("lib", "tb_broken"))
                .await
                .expect("replied"),
            ElaborateResult::Failure
        );
        assert_eq!(
            process.run_case(&bench, Some("Test 1")).await.expect("replied"),
            CaseResult::Passed
        );
        assert_eq!(
            process.run_case(&bench, Some("Test 2")).await.expect("replied"),
            CaseResult::Failed
        );
        assert_eq!(
            process
                .run_case(&TestBenchId::new("lib", "tb_env"), None)
                .await
                .expect("replied"),
            CaseResult::Passed,
            "environment is passed to the simulator"
        );
        process.terminate().await;
    }

    #[tokio::test]
    async fn crash_and_protocol_errors() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let simulator = simulator(dir.path());
        let bench = TestBenchId::new("lib", "tb");

        let mut process = simulator.start(cx()).await.expect("started");
        let err = process
            .run_case(&bench, Some("garbled"))
            .await
            .expect_err("invalid result");
        assert!(
            matches!(err, SessionFatalError::InvalidResult { ref result, .. } if result == "maybe"),
            "{err}"
        );
        process.terminate().await;

        let mut process = simulator.start(cx()).await.expect("started");
        let err = process
            .run_case(&bench, Some("crash"))
            .await
            .expect_err("simulator exits");
        assert!(
            matches!(err, SessionFatalError::UnexpectedEof { .. }),
            "{err}"
        );
        process.terminate().await;
    }

    #[tokio::test]
    async fn spawn_failure() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let mut simulator = simulator(dir.path());
        simulator.program = "/nonexistent/simulator".to_owned();
        let err = simulator.start(cx()).await.expect_err("spawn fails");
        assert!(matches!(err, SessionStartError::Spawn { .. }), "{err}");
    }
}
