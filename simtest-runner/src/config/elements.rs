// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::get_num_cpus,
    errors::{RunTimeoutParseError, TestThreadsParseError},
};
use serde::Deserialize;
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr, time::Duration};

/// Type for the test-threads config key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestThreads {
    /// Run with a specified number of workers.
    Count(usize),

    /// Run with a number of workers equal to the logical CPU count.
    NumCpus,
}

impl TestThreads {
    /// Gets the actual number of workers computed at runtime.
    pub fn compute(self) -> usize {
        match self {
            Self::Count(threads) => threads,
            Self::NumCpus => get_num_cpus(),
        }
    }
}

impl FromStr for TestThreads {
    type Err = TestThreadsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "num-cpus" {
            return Ok(Self::NumCpus);
        }

        match s.parse::<isize>() {
            Err(e) => Err(TestThreadsParseError::new(format!("{s} ({e})"))),
            Ok(0) => Err(TestThreadsParseError::new("0 (test threads may not be 0)")),
            Ok(j) if j < 0 => Ok(TestThreads::Count(
                (get_num_cpus() as isize + j).max(1) as usize,
            )),
            Ok(j) => Ok(TestThreads::Count(j as usize)),
        }
    }
}

impl fmt::Display for TestThreads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(threads) => write!(f, "{threads}"),
            Self::NumCpus => write!(f, "num-cpus"),
        }
    }
}

impl<'de> Deserialize<'de> for TestThreads {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = TestThreads;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a non-zero integer or the string \"num-cpus\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v == "num-cpus" {
                    Ok(TestThreads::NumCpus)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    ))
                }
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v.cmp(&0) {
                    Ordering::Greater => Ok(TestThreads::Count(v as usize)),
                    Ordering::Less => Ok(TestThreads::Count(
                        (get_num_cpus() as i64 + v).max(1) as usize,
                    )),
                    Ordering::Equal => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v {
                    0 => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    )),
                    v => Ok(TestThreads::Count(v as usize)),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Whether simulator processes are reused across simulation runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// A worker keeps its simulator process alive between runs, replacing it only after a crash
    /// or timeout.
    #[default]
    Persistent,

    /// Every run gets a fresh simulator process, which is terminated when the run ends.
    Transient,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// What to do when selection patterns are given but none of them matches.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoMatchesBehavior {
    /// Run zero tests and exit successfully.
    Pass,

    /// Print a warning, then run zero tests and exit successfully.
    Warn,

    /// Fail with a distinct exit code and write no report.
    #[default]
    Fail,
}

/// The `[simulator]` section: how to launch the simulator driver.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulatorConfig {
    #[serde(default)]
    program: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(with = "humantime_serde")]
    terminate_grace_period: Duration,
}

impl SimulatorConfig {
    /// The program to launch, if configured.
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref().filter(|program| !program.is_empty())
    }

    /// Arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables set for the program.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// How long to wait for the simulator to exit after asking it to quit.
    pub fn terminate_grace_period(&self) -> Duration {
        self.terminate_grace_period
    }
}

/// Parses a run timeout from the command line, for example `90s` or `5m`.
pub fn parse_run_timeout(input: &str) -> Result<Duration, RunTimeoutParseError> {
    humantime::parse_duration(input).map_err(|error| RunTimeoutParseError::new(input, error))
}
