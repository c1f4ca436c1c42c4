use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::config::{settings, FinderConfig};
use crate::core::MatchMode;

/// Find files by name, extension, size and modification date.
///
/// Options that are not given fall back to the saved settings.
#[derive(Parser, Debug)]
#[command(name = "file-finder", author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to search, in order
    pub roots: Vec<PathBuf>,

    /// Name to look for, compared against file names without their extension
    #[arg(short, long)]
    pub name: Option<String>,

    /// Require the whole name to match instead of a substring
    #[arg(long, conflicts_with = "substring")]
    pub exact: bool,

    /// Accept names that contain the pattern
    #[arg(long)]
    pub substring: bool,

    /// Only consider files with this extension, e.g. ".png"
    #[arg(short = 'e', long = "ext")]
    pub extension: Option<String>,

    /// Minimum file size in kilobytes
    #[arg(long)]
    pub min_kb: Option<u64>,

    /// Maximum file size in kilobytes
    #[arg(long)]
    pub max_kb: Option<u64>,

    /// Drop any saved maximum size
    #[arg(long, conflicts_with = "max_kb")]
    pub no_max_kb: bool,

    /// Earliest modification date (YYYY-MM-DD), inclusive
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Latest modification date (YYYY-MM-DD), inclusive
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Drop any saved date bounds
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub any_date: bool,

    /// Gitignore-style pattern to skip; repeatable
    #[arg(long = "skip", value_name = "PATTERN")]
    pub skip: Vec<String>,

    /// Follow symbolic links while walking
    #[arg(long, overrides_with = "no_follow_links")]
    pub follow_links: bool,

    /// Do not follow symbolic links, even if the saved settings do
    #[arg(long, overrides_with = "follow_links")]
    pub no_follow_links: bool,

    /// Cancel the search after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Settings file to read (and write with --save)
    #[arg(long, env = "FILE_FINDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Persist the effective settings for the next run
    #[arg(long)]
    pub save: bool,

    /// Start from the settings in this file instead of the saved ones
    #[arg(long, value_name = "FILE")]
    pub import: Option<PathBuf>,

    /// Write the effective settings to this file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected a date as YYYY-MM-DD: {e}"))
}

impl Cli {
    /// Builds the settings for this invocation: the imported or saved
    /// settings, overlaid with the command-line options, exported if requested.
    pub fn effective_config(&self) -> Result<FinderConfig> {
        let mut config = match &self.import {
            Some(path) => settings::import_config(path)?,
            None => settings::load_config(self.config.as_deref())?,
        };
        self.apply_to(&mut config);

        if let Some(path) = &self.export {
            settings::export_config(&config, path)?;
        }
        Ok(config)
    }

    /// Overlays the options given on the command line onto `config`.
    pub fn apply_to(&self, config: &mut FinderConfig) {
        if !self.roots.is_empty() {
            config.set_roots(&self.roots);
        }
        if let Some(name) = &self.name {
            config.name_pattern = name.clone();
        }
        if self.exact {
            config.match_mode = MatchMode::Exact;
        } else if self.substring {
            config.match_mode = MatchMode::Substring;
        }
        if let Some(extension) = &self.extension {
            config.extension = Some(extension.clone()).filter(|e| !e.trim().is_empty());
        }
        if let Some(min_kb) = self.min_kb {
            config.min_size_kb = min_kb;
        }
        if self.max_kb.is_some() || self.no_max_kb {
            config.max_size_kb = self.max_kb;
        }
        if self.any_date {
            config.date_from = None;
            config.date_to = None;
        }
        if self.from.is_some() {
            config.date_from = self.from;
        }
        if self.to.is_some() {
            config.date_to = self.to;
        }
        if !self.skip.is_empty() {
            config.skip_patterns = self.skip.clone();
        }
        if self.follow_links {
            config.follow_links = true;
        } else if self.no_follow_links {
            config.follow_links = false;
        }
    }
}
