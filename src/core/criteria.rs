//! The immutable description of what a search run considers a match.

use super::error::CoreError;
use super::skip::build_skip_matcher;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper size bound used when the caller does not restrict file size.
pub const UNBOUNDED_SIZE: u64 = u64::MAX;

/// Case-folds `s` one character at a time.
///
/// Unlike `str::to_lowercase` this ignores context: `Σ`, `σ` and the
/// word-final `ς` all fold to `σ`, wherever they appear.
fn fold_case(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ς' { 'σ' } else { c })
        .collect()
}

/// How the name pattern is compared against a file's base name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive equality with the base name.
    Exact,
    /// Case-insensitive containment within the base name.
    #[default]
    Substring,
}

/// Match criteria for one search run.
///
/// Built once with the `with_*` methods and then handed to the engine, which
/// shares it read-only with its worker. Comparisons are case-insensitive using
/// Unicode lowercasing, so results never depend on the process locale.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    roots: Vec<PathBuf>,
    name_pattern: String,
    folded_pattern: String,
    match_mode: MatchMode,
    extension: Option<String>,
    min_size_bytes: u64,
    max_size_bytes: u64,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    skip_patterns: Vec<String>,
    follow_links: bool,
}

impl SearchCriteria {
    /// Creates criteria with substring matching and no extension, size or date limits.
    pub fn new<I, P>(roots: I, name_pattern: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let name_pattern = name_pattern.into();
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            folded_pattern: fold_case(&name_pattern),
            name_pattern,
            match_mode: MatchMode::default(),
            extension: None,
            min_size_bytes: 0,
            max_size_bytes: UNBOUNDED_SIZE,
            date_from: None,
            date_to: None,
            skip_patterns: Vec::new(),
            follow_links: false,
        }
    }

    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    /// Restricts results to names ending with `extension`.
    ///
    /// The leading dot is optional (`"png"` and `".png"` are equivalent). An
    /// empty value removes the filter.
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        let trimmed = extension.as_ref().trim();
        self.extension = if trimmed.is_empty() || trimmed == "." {
            None
        } else if trimmed.starts_with('.') {
            Some(fold_case(trimmed))
        } else {
            Some(format!(".{}", fold_case(trimmed)))
        };
        self
    }

    /// Sets the inclusive size range in bytes.
    pub fn with_size_range(mut self, min_size_bytes: u64, max_size_bytes: u64) -> Self {
        self.min_size_bytes = min_size_bytes;
        self.max_size_bytes = max_size_bytes;
        self
    }

    /// Sets the inclusive modification-date range. Either bound may be open.
    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Gitignore-style patterns for directories and files that are never visited.
    pub fn with_skip_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn name_pattern(&self) -> &str {
        &self.name_pattern
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// The normalised extension filter (lowercase, with leading dot).
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn size_range(&self) -> (u64, u64) {
        (self.min_size_bytes, self.max_size_bytes)
    }

    pub fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.date_from, self.date_to)
    }

    pub fn skip_patterns(&self) -> &[String] {
        &self.skip_patterns
    }

    pub fn follow_links(&self) -> bool {
        self.follow_links
    }

    /// Checks the contract a run relies on. Called by the engine before any
    /// traversal starts.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.roots.is_empty() {
            return Err(CoreError::NoRoots);
        }
        if self.name_pattern.trim().is_empty() {
            return Err(CoreError::EmptyNamePattern);
        }
        if self.min_size_bytes > self.max_size_bytes {
            return Err(CoreError::InvalidSizeRange {
                min: self.min_size_bytes,
                max: self.max_size_bytes,
            });
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(CoreError::InvalidDateRange { from, to });
            }
        }
        // Patterns are root-independent; compile once against the first root to reject bad globs early.
        build_skip_matcher(&self.roots[0], &self.skip_patterns)?;
        Ok(())
    }

    /// Evaluates every active predicate: extension, name, size, then date.
    ///
    /// `base_name` is the file name without its final dot-delimited suffix;
    /// `full_name` is the complete file name.
    pub fn matches(
        &self,
        base_name: &str,
        full_name: &str,
        size_bytes: u64,
        modified: NaiveDate,
    ) -> bool {
        if let Some(extension) = &self.extension {
            if !fold_case(full_name).ends_with(extension.as_str()) {
                return false;
            }
        }

        let folded_base = fold_case(base_name);
        let name_ok = match self.match_mode {
            MatchMode::Exact => folded_base == self.folded_pattern,
            MatchMode::Substring => folded_base.contains(&self.folded_pattern),
        };
        if !name_ok {
            return false;
        }

        if size_bytes < self.min_size_bytes || size_bytes > self.max_size_bytes {
            return false;
        }

        if self.date_from.is_some_and(|from| modified < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| modified > to) {
            return false;
        }

        true
    }

    /// Convenience wrapper around [`matches`](Self::matches) that derives both
    /// names from `path`.
    pub fn matches_path(&self, path: &Path, size_bytes: u64, modified: NaiveDate) -> bool {
        let Some(full_name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_else(|| full_name.clone());
        self.matches(&base_name, &full_name, size_bytes, modified)
    }
}
