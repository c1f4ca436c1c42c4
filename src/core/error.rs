//! Defines the custom error type for the `core` module.

use chrono::NaiveDate;
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// Only contract violations and worker failures end up here. I/O problems on
/// individual entries or roots are recovered inside the traversal and never
/// surface as a `CoreError`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No root directory was supplied.
    #[error("At least one root directory is required")]
    NoRoots,

    /// The name pattern is empty or only whitespace.
    #[error("Name pattern must not be empty")]
    EmptyNamePattern,

    /// The size bounds are inverted.
    #[error("Invalid size range: minimum {min} bytes exceeds maximum {max} bytes")]
    InvalidSizeRange { min: u64, max: u64 },

    /// The date bounds are inverted.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    /// A skip pattern could not be compiled.
    #[error("Invalid skip pattern: {0}")]
    InvalidSkipPattern(#[from] ignore::Error),

    /// The operating system refused to start the traversal worker.
    #[error("Failed to spawn search worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The traversal worker panicked before reporting completion.
    #[error("Search worker panicked")]
    WorkerPanicked,

    /// Represents an error that occurred when a Tokio task was joined.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
