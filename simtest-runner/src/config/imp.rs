// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{NoMatchesBehavior, SessionMode, SimulatorConfig, TestThreads};
use crate::errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
    time::Duration,
};
use tracing::warn;

/// Gets the number of available CPUs and caches the value.
#[inline]
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Overall configuration for simtest.
///
/// This is the root data structure for simtest configuration. Most runner-specific configuration
/// is managed through [profiles](SimtestProfile), obtained through the [`profile`](Self::profile)
/// method.
#[derive(Clone, Debug)]
pub struct SimtestConfig {
    workspace_root: Utf8PathBuf,
    config_file: Utf8PathBuf,
    inner: SimtestConfigImpl,
}

impl SimtestConfig {
    /// The default location of the config within the workspace: `.config/simtest.toml`.
    pub const CONFIG_PATH: &'static str = ".config/simtest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the simtest config from the given file, or if not specified from
    /// `.config/simtest.toml` in the workspace root.
    ///
    /// If no config file is specified and the workspace doesn't have `.config/simtest.toml`, uses
    /// the default config options.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, required) = match config_file {
            Some(file) => (file.to_owned(), true),
            None => (workspace_root.join(Self::CONFIG_PATH), false),
        };

        let builder = Self::make_default_config()
            .add_source(File::new(config_file.as_str(), FileFormat::Toml).required(required));
        let (inner, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !ignored.is_empty() {
            let keys = ignored.into_iter().collect::<Vec<_>>().join(", ");
            warn!("ignoring unknown configuration keys in config file {config_file}: {keys}");
        }

        Ok(Self {
            workspace_root,
            config_file,
            inner,
        })
    }

    /// The workspace root the config was read for.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// The repository config file that was layered on top of the defaults.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// The `[simulator]` section.
    pub fn simulator(&self) -> &SimulatorConfig {
        &self.inner.simulator
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<SimtestProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(self.inner.other_profiles.get(other).ok_or_else(|| {
                ProfileNotFound::new(other, self.inner.all_profiles())
            })?),
        };

        Ok(SimtestProfile {
            name: name.to_owned(),
            workspace_root: &self.workspace_root,
            default_profile: &self.inner.default_profile,
            custom_profile,
        })
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(SimtestConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(ConfigParseErrorKind::Build)?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: SimtestConfigDeserialize =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // The config crate also reports the key. Drop it from the inner error so it's only
                // printed once.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::Deserialize(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config.into_config_impl(), ignored))
    }
}

/// A simtest profile, with per-key fallback to the default profile.
///
/// Returned by [`SimtestConfig::profile`].
#[derive(Clone, Debug)]
pub struct SimtestProfile<'cfg> {
    name: String,
    workspace_root: &'cfg Utf8Path,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl SimtestProfile<'_> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of workers to run with.
    pub fn test_threads(&self) -> TestThreads {
        self.custom_profile
            .and_then(|profile| profile.test_threads)
            .unwrap_or(self.default_profile.test_threads)
    }

    /// Returns whether simulator processes are reused across runs.
    pub fn session_mode(&self) -> SessionMode {
        self.custom_profile
            .and_then(|profile| profile.session_mode)
            .unwrap_or(self.default_profile.session_mode)
    }

    /// Returns the per-run timeout, if any.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.custom_profile
            .and_then(|profile| profile.run_timeout)
            .or(self.default_profile.run_timeout)
    }

    /// Returns the absolute output directory.
    pub fn output_path(&self) -> Utf8PathBuf {
        let output_path = self
            .custom_profile
            .and_then(|profile| profile.output_path.as_deref())
            .unwrap_or(&self.default_profile.output_path);
        self.workspace_root.join(output_path)
    }

    /// Returns the xunit report path, relative to the output directory.
    pub fn xunit_xml(&self) -> Option<&Utf8Path> {
        self.custom_profile
            .and_then(|profile| profile.xunit_xml.as_deref())
            .or(self.default_profile.xunit_xml.as_deref())
            .filter(|path| !path.as_str().is_empty())
    }

    /// Returns whether selection patterns are matched case-insensitively.
    pub fn ignore_case(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.ignore_case)
            .unwrap_or(self.default_profile.ignore_case)
    }

    /// Returns what to do when patterns match nothing.
    pub fn no_matches(&self) -> NoMatchesBehavior {
        self.custom_profile
            .and_then(|profile| profile.no_matches)
            .unwrap_or(self.default_profile.no_matches)
    }
}

#[derive(Clone, Debug)]
struct SimtestConfigImpl {
    simulator: SimulatorConfig,
    default_profile: DefaultProfileImpl,
    other_profiles: BTreeMap<String, CustomProfileImpl>,
}

impl SimtestConfigImpl {
    fn all_profiles(&self) -> impl Iterator<Item = &str> {
        self.other_profiles
            .keys()
            .map(|key| key.as_str())
            .chain(std::iter::once(SimtestConfig::DEFAULT_PROFILE))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SimtestConfigDeserialize {
    simulator: SimulatorConfig,
    #[serde(rename = "profile")]
    profiles: BTreeMap<String, CustomProfileImpl>,
}

impl SimtestConfigDeserialize {
    fn into_config_impl(mut self) -> SimtestConfigImpl {
        let p = self
            .profiles
            .remove(SimtestConfig::DEFAULT_PROFILE)
            .expect("default profile should exist");
        let default_profile = DefaultProfileImpl::new(p);

        SimtestConfigImpl {
            simulator: self.simulator,
            default_profile,
            other_profiles: self.profiles,
        }
    }
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    test_threads: TestThreads,
    session_mode: SessionMode,
    run_timeout: Option<Duration>,
    output_path: Utf8PathBuf,
    xunit_xml: Option<Utf8PathBuf>,
    ignore_case: bool,
    no_matches: NoMatchesBehavior,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Self {
        Self {
            test_threads: p
                .test_threads
                .expect("test-threads present in default profile"),
            session_mode: p
                .session_mode
                .expect("session-mode present in default profile"),
            run_timeout: p.run_timeout,
            output_path: p
                .output_path
                .expect("output-path present in default profile"),
            xunit_xml: p.xunit_xml,
            ignore_case: p
                .ignore_case
                .expect("ignore-case present in default profile"),
            no_matches: p
                .no_matches
                .expect("no-matches present in default profile"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    test_threads: Option<TestThreads>,
    #[serde(default)]
    session_mode: Option<SessionMode>,
    #[serde(default, with = "humantime_serde")]
    run_timeout: Option<Duration>,
    #[serde(default)]
    output_path: Option<Utf8PathBuf>,
    #[serde(default)]
    xunit_xml: Option<Utf8PathBuf>,
    #[serde(default)]
    ignore_case: Option<bool>,
    #[serde(default)]
    no_matches: Option<NoMatchesBehavior>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn default_config(workspace_root: &str) -> SimtestConfig {
        let (inner, ignored) =
            SimtestConfig::build_and_deserialize_config(&SimtestConfig::make_default_config())
                .expect("default config is valid");
        assert!(ignored.is_empty(), "default config has no unknown keys");
        SimtestConfig {
            workspace_root: workspace_root.into(),
            config_file: Utf8PathBuf::from(workspace_root).join(SimtestConfig::CONFIG_PATH),
            inner,
        }
    }

    fn temp_workspace(config_contents: &str) -> Utf8TempDir {
        let workspace = camino_tempfile::tempdir().expect("created temp dir");
        let config_path = workspace.path().join(SimtestConfig::CONFIG_PATH);
        std::fs::create_dir_all(config_path.parent().expect("config path has a parent"))
            .expect("created .config");
        std::fs::write(&config_path, config_contents).expect("wrote config");
        workspace
    }

    #[test]
    fn default_config_is_valid() {
        let config = default_config("/fake/workspace");
        let profile = config
            .profile(SimtestConfig::DEFAULT_PROFILE)
            .expect("default profile exists");
        assert_eq!(profile.test_threads(), TestThreads::Count(1));
        assert_eq!(profile.session_mode(), SessionMode::Persistent);
        assert_eq!(profile.run_timeout(), None);
        assert_eq!(profile.output_path(), "/fake/workspace/simtest_out");
        assert_eq!(profile.xunit_xml(), Some(Utf8Path::new("xunit.xml")));
        assert!(!profile.ignore_case());
        assert_eq!(profile.no_matches(), NoMatchesBehavior::Fail);
        assert_eq!(config.simulator().program(), None);
        assert_eq!(
            config.simulator().terminate_grace_period(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn custom_profile_falls_back_to_default() {
        let workspace = temp_workspace(indoc! {r#"
            [simulator]
            program = "sh"
            args = ["driver.sh"]

            [profile.default]
            test-threads = 4

            [profile.ci]
            session-mode = "transient"
            run-timeout = "2m"
            no-matches = "warn"
        "#});
        let config =
            SimtestConfig::from_sources(workspace.path(), None).expect("config is valid");
        assert_eq!(config.simulator().program(), Some("sh"));
        assert_eq!(config.simulator().args(), ["driver.sh".to_owned()]);

        let default = config.profile("default").expect("default profile exists");
        assert_eq!(default.test_threads(), TestThreads::Count(4));
        assert_eq!(default.session_mode(), SessionMode::Persistent);

        let ci = config.profile("ci").expect("ci profile exists");
        assert_eq!(ci.name(), "ci");
        assert_eq!(ci.test_threads(), TestThreads::Count(4));
        assert_eq!(ci.session_mode(), SessionMode::Transient);
        assert_eq!(ci.run_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(ci.no_matches(), NoMatchesBehavior::Warn);
        assert_eq!(ci.output_path(), workspace.path().join("simtest_out"));
    }

    #[test]
    fn unknown_profile() {
        let workspace = temp_workspace(indoc! {r#"
            [profile.ci]
            test-threads = 2
        "#});
        let config =
            SimtestConfig::from_sources(workspace.path(), None).expect("config is valid");
        let err = config.profile("nightly").expect_err("profile does not exist");
        assert_eq!(
            err.to_string(),
            "profile `nightly` not found (known profiles: ci, default)"
        );
    }

    #[test]
    fn invalid_value_reports_path() {
        let workspace = temp_workspace(indoc! {r#"
            [profile.default]
            test-threads = 0
        "#});
        let err = SimtestConfig::from_sources(workspace.path(), None)
            .expect_err("zero test threads is invalid");
        match err.kind() {
            ConfigParseErrorKind::Deserialize(error) => {
                assert_eq!(error.path().to_string(), "profile.default.test-threads");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn explicit_config_file_is_required() {
        let workspace = camino_tempfile::tempdir().expect("created temp dir");
        let missing = workspace.path().join("missing.toml");
        SimtestConfig::from_sources(workspace.path(), Some(&missing))
            .expect_err("explicitly passed config files must exist");

        SimtestConfig::from_sources(workspace.path(), None)
            .expect("the default config location is optional");
    }
}
