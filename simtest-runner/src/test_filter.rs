// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving test name patterns against the registry.
//!
//! The main structure in this module is [`TestFilter`].

use crate::{
    errors::{NoMatchError, TestFilterBuildError},
    list::{Selection, TestRegistry},
};
use regex::{RegexSet, RegexSetBuilder};
use tracing::warn;

/// A compiled set of glob patterns, matched against full hierarchical test names.
///
/// `*` matches any sequence of characters, including `.` and spaces. Every other character is
/// literal. Multiple patterns are combined with OR semantics.
#[derive(Clone, Debug)]
pub struct TestFilter {
    patterns: Vec<String>,
    // None if no patterns were supplied, in which case everything matches.
    set: Option<RegexSet>,
}

impl TestFilter {
    /// Compiles the given patterns.
    pub fn new(
        patterns: impl IntoIterator<Item = impl Into<String>>,
        ignore_case: bool,
    ) -> Result<Self, TestFilterBuildError> {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = if patterns.is_empty() {
            None
        } else {
            let set = RegexSetBuilder::new(patterns.iter().map(|pattern| glob_to_regex(pattern)))
                .case_insensitive(ignore_case)
                .dot_matches_new_line(true)
                .build()
                .map_err(TestFilterBuildError::new)?;
            Some(set)
        };

        Ok(Self { patterns, set })
    }

    /// Returns a filter that matches every test case.
    pub fn all() -> Self {
        Self {
            patterns: Vec::new(),
            set: None,
        }
    }

    /// The patterns this filter was built from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if the full hierarchical name matches any pattern.
    pub fn is_match(&self, name: &str) -> bool {
        match &self.set {
            Some(set) => set.is_match(name),
            None => true,
        }
    }

    /// Resolves the patterns against the registry.
    ///
    /// The selection is in registry order, with each case appearing at most once. Patterns that
    /// match nothing produce a warning, unless every pattern matches nothing, in which case this
    /// returns a [`NoMatchError`].
    pub fn select<'a>(&self, registry: &'a TestRegistry) -> Result<Selection<'a>, NoMatchError> {
        let Some(set) = &self.set else {
            return Ok(Selection::new(registry, registry.iter_tests()));
        };

        let mut pattern_matched = vec![false; self.patterns.len()];
        let tests: Vec<_> = registry
            .iter_tests()
            .filter(|test| {
                let matches = set.matches(test.name());
                for index in matches.iter() {
                    pattern_matched[index] = true;
                }
                matches.matched_any()
            })
            .collect();

        if tests.is_empty() {
            return Err(NoMatchError::new(self.patterns.clone()));
        }

        for (pattern, _) in self
            .patterns
            .iter()
            .zip(&pattern_matched)
            .filter(|(_, matched)| !**matched)
        {
            warn!("pattern `{pattern}` did not match any test cases");
        }

        Ok(Selection::new(registry, tests))
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}
