//! Defines the events delivered from the search tasks to the consumer.

use crate::core::SearchSummary;
use std::path::PathBuf;

/// Events sent from the background search tasks to whoever drives the finder.
///
/// Every variant tied to a run carries its `run_id`, so a consumer can tell a
/// superseded run's completion apart from the current one.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// A new run was accepted and its traversal has started.
    SearchStarted { run_id: u64 },
    /// A file matching the current criteria was found.
    MatchFound { run_id: u64, path: PathBuf },
    /// The run ended, either naturally or because it was cancelled.
    SearchFinished { run_id: u64, summary: SearchSummary },
    /// An error message to be displayed to the user.
    ShowError(String),
}
