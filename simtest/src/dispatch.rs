// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use simtest_metadata::SimtestExitCode;
use simtest_runner::{
    config::{
        NoMatchesBehavior, SessionMode, SimtestConfig, SimtestProfile, TestThreads,
        parse_run_timeout,
    },
    errors::{DisplayErrorChain, TestRunnerExecuteError, WriteTestListError},
    helpers::plural,
    list::{ListFormat, Selection, TestManifest},
    output_dir,
    plan::RunPlan,
    reporter::ReporterBuilder,
    runner::TestRunnerBuilder,
    session::RunKind,
    signal::SignalHandlerKind,
    simulator::CommandSimulator,
    test_filter::TestFilter,
};
use std::{io::Write, time::Duration};
use supports_color::Stream;
use tracing::{info, warn};

/// A test runner for HDL test benches.
///
/// Test benches are declared in a manifest. Selected cases are run on a pool of simulator
/// sessions, with results shown live and persisted as an xunit report.
#[derive(Debug, Parser)]
#[command(name = "simtest", version, styles = crate::output::clap_styles::style())]
pub struct SimtestApp {
    /// Path to the test manifest [default: simtest-manifest.toml]
    #[arg(long, global = true, value_name = "PATH")]
    manifest_path: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl SimtestApp {
    /// Initializes the output context and logging.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(
        self,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let base = BaseApp::new(self.manifest_path, &self.config_opts, output)?;

        match self.command {
            Command::List {
                filter_opts,
                message_format,
            } => base.exec_list(&filter_opts, message_format, output_writer),
            Command::Run(run_opts) => base.exec_run(&run_opts, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: workspace-root/.config/simtest.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List test cases in the manifest
    ///
    /// Selected cases are marked. Use --message-format json for machine-readable output.
    List {
        #[command(flatten)]
        filter_opts: FilterOpts,

        /// Output format
        #[arg(
            short = 'T',
            long,
            value_enum,
            default_value_t,
            help_heading = "Output options",
            value_name = "FMT"
        )]
        message_format: MessageFormatOpts,
    },

    /// Run test cases
    ///
    /// Selected cases are grouped into simulation runs, and runs are dispatched to a pool of
    /// simulator sessions.
    Run(RunOpts),
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl MessageFormatOpts {
    fn to_list_format(self, verbose: bool) -> ListFormat {
        match self {
            Self::Human => ListFormat::Human { verbose },
            Self::Json => ListFormat::Json,
            Self::JsonPretty => ListFormat::JsonPretty,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum NoMatchesOpt {
    Pass,
    Warn,
    Fail,
}

impl From<NoMatchesOpt> for NoMatchesBehavior {
    fn from(opt: NoMatchesOpt) -> Self {
        match opt {
            NoMatchesOpt::Pass => Self::Pass,
            NoMatchesOpt::Warn => Self::Warn,
            NoMatchesOpt::Fail => Self::Fail,
        }
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Filter options")]
struct FilterOpts {
    /// Simtest profile to use
    #[arg(long, short = 'P', env = "SIMTEST_PROFILE")]
    profile: Option<String>,

    /// Match patterns case-insensitively [default: from profile]
    #[arg(long)]
    ignore_case: bool,

    /// Behavior if no test cases match the patterns [default: from profile]
    #[arg(long, value_enum, value_name = "ACTION")]
    no_matches: Option<NoMatchesOpt>,

    /// Test name patterns, where `*` matches any sequence of characters
    #[arg(value_name = "PATTERNS")]
    patterns: Vec<String>,
}

impl FilterOpts {
    fn profile_name(&self) -> &str {
        self.profile
            .as_deref()
            .unwrap_or(SimtestConfig::DEFAULT_PROFILE)
    }
}

#[derive(Debug, Default, Args)]
struct RunOpts {
    #[command(flatten)]
    filter_opts: FilterOpts,

    #[command(flatten)]
    runner_opts: TestRunnerOpts,

    #[command(flatten)]
    output_dir_opts: OutputDirOpts,
}

/// Test runner options.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Runner options")]
struct TestRunnerOpts {
    /// Number of simulator sessions to run in parallel [default: from profile]
    #[arg(
        long,
        short = 'p',
        value_name = "N",
        allow_negative_numbers = true,
        env = "SIMTEST_TEST_THREADS"
    )]
    test_threads: Option<TestThreads>,

    /// Only elaborate test benches, without running cases
    #[arg(long)]
    elaborate: bool,

    /// Start a new simulator session for every simulation run
    #[arg(long)]
    new_sim: bool,

    /// Maximum duration of a single simulation run [default: from profile]
    #[arg(long, value_name = "DURATION", value_parser = parse_run_timeout)]
    run_timeout: Option<Duration>,
}

impl TestRunnerOpts {
    fn to_builder(&self, profile: &SimtestProfile<'_>) -> TestRunnerBuilder {
        let mut builder = TestRunnerBuilder::default();
        builder.set_test_threads(self.test_threads.unwrap_or_else(|| profile.test_threads()));
        if self.new_sim {
            builder.set_session_mode(SessionMode::Transient);
        } else {
            builder.set_session_mode(profile.session_mode());
        }
        if self.elaborate {
            builder.set_run_kind(RunKind::ElaborateOnly);
        }
        if let Some(run_timeout) = self.run_timeout.or_else(|| profile.run_timeout()) {
            builder.set_run_timeout(run_timeout);
        }
        builder
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Output options")]
struct OutputDirOpts {
    /// Remove the output directory before running
    #[arg(long)]
    clean: bool,

    /// Output directory for simulator artifacts and reports, relative to the current directory
    /// [default: from profile, relative to the manifest]
    #[arg(long, value_name = "DIR")]
    output_path: Option<Utf8PathBuf>,

    /// Path of the xunit report, relative to the output directory [default: from profile]
    #[arg(long, value_name = "FILE")]
    xunit_xml: Option<Utf8PathBuf>,
}

struct BaseApp {
    manifest: TestManifest,
    config: SimtestConfig,
    output: OutputContext,
}

impl BaseApp {
    fn new(
        manifest_path: Option<Utf8PathBuf>,
        config_opts: &ConfigOpts,
        output: OutputContext,
    ) -> Result<Self, ExpectedError> {
        let manifest_path =
            manifest_path.unwrap_or_else(|| Utf8PathBuf::from(TestManifest::DEFAULT_NAME));
        let manifest = TestManifest::from_path(manifest_path)?;
        let config = SimtestConfig::from_sources(
            manifest.workspace_root(),
            config_opts.config_file.as_deref(),
        )?;

        Ok(Self {
            manifest,
            config,
            output,
        })
    }

    /// Resolves the patterns against the registry, applying the no-match policy.
    fn select(
        &self,
        filter_opts: &FilterOpts,
        profile: &SimtestProfile<'_>,
    ) -> Result<Selection<'_>, ExpectedError> {
        let registry = self.manifest.registry();
        let ignore_case = filter_opts.ignore_case || profile.ignore_case();
        let filter = TestFilter::new(filter_opts.patterns.iter().cloned(), ignore_case)?;
        let no_matches = filter_opts
            .no_matches
            .map_or_else(|| profile.no_matches(), NoMatchesBehavior::from);

        match filter.select(registry) {
            Ok(selection) => Ok(selection),
            Err(err) => match no_matches {
                NoMatchesBehavior::Fail => Err(err.into()),
                NoMatchesBehavior::Warn => {
                    warn!("{err}");
                    Ok(Selection::empty(registry))
                }
                NoMatchesBehavior::Pass => Ok(Selection::empty(registry)),
            },
        }
    }

    fn exec_list(
        &self,
        filter_opts: &FilterOpts,
        message_format: MessageFormatOpts,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let profile = self.config.profile(filter_opts.profile_name())?;
        let selection = self.select(filter_opts, &profile)?;

        let mut writer = output_writer.stdout_writer();
        selection.write(
            message_format.to_list_format(self.output.verbose),
            &mut writer,
            self.output.color.should_colorize(Stream::Stdout),
        )?;
        writer.flush().map_err(WriteTestListError::Io)?;

        Ok(SimtestExitCode::OK)
    }

    fn exec_run(
        &self,
        run_opts: &RunOpts,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let profile = self.config.profile(run_opts.filter_opts.profile_name())?;
        let selection = self.select(&run_opts.filter_opts, &profile)?;
        let plan = RunPlan::new(&selection);

        let output_dir_opts = &run_opts.output_dir_opts;
        let output_path = output_dir_opts
            .output_path
            .clone()
            .unwrap_or_else(|| profile.output_path());
        // Simulators run in the workspace root, so they are handed the canonical path.
        let output_path = output_dir::prepare(&output_path, output_dir_opts.clean)?;

        let simulator = CommandSimulator::new(&self.config, output_path.clone())?;
        info!(
            "running {} {} in {} simulation {} with profile `{}`",
            plan.test_count(),
            plural::tests_str(plan.test_count()),
            plan.run_count(),
            plural::runs_str(plan.run_count()),
            profile.name(),
        );

        let mut reporter_builder = ReporterBuilder::default();
        reporter_builder
            .set_colorize(self.output.color.should_colorize(Stream::Stderr))
            .set_verbose(self.output.verbose);
        let xunit_xml = output_dir_opts
            .xunit_xml
            .as_deref()
            .or_else(|| profile.xunit_xml());
        if let Some(xunit_xml) = xunit_xml {
            reporter_builder.set_xunit_path(output_path.join(xunit_xml));
        }
        let mut reporter = reporter_builder.build(output_writer.reporter_output());

        let runner = run_opts.runner_opts.to_builder(&profile).build(
            &plan,
            &simulator,
            SignalHandlerKind::Standard,
        )?;
        let report = match runner.try_execute(|event| reporter.report_event(event)) {
            Ok(report) => report,
            Err(TestRunnerExecuteError {
                report,
                report_error,
            }) => {
                // The live output is broken, but the report files may still be writable.
                if let Err(error) = reporter.finalize(&report) {
                    warn!(
                        "failed to write report after an output error: {}",
                        DisplayErrorChain::new(error)
                    );
                }
                return Err(report_error.into());
            }
        };

        Ok(reporter.finalize(&report)?)
    }
}
