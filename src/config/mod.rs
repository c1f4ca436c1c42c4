pub mod settings;

use crate::core::{CoreError, MatchMode, SearchCriteria, DEFAULT_EVENT_BUFFER, UNBOUNDED_SIZE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes per kilobyte as entered by the user.
pub const BYTES_PER_KB: u64 = 1024;

/// Persisted search settings: the last criteria the user searched with.
///
/// Sizes are stored in kilobytes, the unit the user types; they are turned
/// into bytes by [`FinderConfig::to_criteria`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FinderConfig {
    pub roots: Vec<PathBuf>,
    pub name_pattern: String,
    pub match_mode: MatchMode,
    pub extension: Option<String>,
    pub min_size_kb: u64,
    pub max_size_kb: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub skip_patterns: Vec<String>,
    pub follow_links: bool,
    pub event_buffer: usize,
}

impl FinderConfig {
    /// Builds validated criteria from these settings.
    pub fn to_criteria(&self) -> Result<SearchCriteria, CoreError> {
        let min_bytes = kb_to_bytes(self.min_size_kb);
        let max_bytes = self.max_size_kb.map_or(UNBOUNDED_SIZE, kb_to_bytes);

        let criteria = SearchCriteria::new(self.roots.iter().cloned(), self.name_pattern.trim())
            .with_match_mode(self.match_mode)
            .with_extension(self.extension.as_deref().unwrap_or_default())
            .with_size_range(min_bytes, max_bytes)
            .with_date_range(self.date_from, self.date_to)
            .with_skip_patterns(self.skip_patterns.iter().cloned())
            .with_follow_links(self.follow_links);

        criteria.validate()?;
        Ok(criteria)
    }

    /// Replaces the roots, dropping duplicates while keeping the first occurrence.
    pub fn set_roots<I, P>(&mut self, roots: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.roots.clear();
        for root in roots {
            let root = root.as_ref().to_path_buf();
            if !self.roots.contains(&root) {
                self.roots.push(root);
            }
        }
    }
}

fn kb_to_bytes(kb: u64) -> u64 {
    kb.saturating_mul(BYTES_PER_KB)
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            roots: directories::UserDirs::new()
                .map(|dirs| vec![dirs.home_dir().to_path_buf()])
                .unwrap_or_default(),
            name_pattern: String::new(),
            match_mode: MatchMode::Substring,
            extension: None,
            min_size_kb: 0,
            max_size_kb: None,
            date_from: None,
            date_to: None,
            skip_patterns: Vec::new(),
            follow_links: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}
