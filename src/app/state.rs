//! Defines the central, mutable state of the finder.

use crate::config::FinderConfig;
use crate::core::{SearchHandle, SearchSummary};
use std::path::PathBuf;

/// Holds the complete, mutable state of one caller context.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` so the driver and the
/// forwarding task can share it. At most one run is active at a time.
pub struct FinderState {
    /// The search settings used for the next run.
    pub config: FinderConfig,
    /// Where the settings are persisted after a run starts. `None` disables saving.
    pub config_path: Option<PathBuf>,
    /// `true` while the current run has not reported completion.
    pub is_searching: bool,
    /// Matches of the current run, in the order they were found.
    pub results: Vec<PathBuf>,
    /// The completion summary of the most recent finished run.
    pub last_summary: Option<SearchSummary>,
    /// Identifier of the current run. Events of older runs are discarded.
    pub run_id: u64,
    /// A handle to the currently running search, allowing it to be cancelled.
    pub search_handle: Option<SearchHandle>,
}

impl FinderState {
    pub fn new(config: FinderConfig) -> Self {
        Self {
            config,
            config_path: None,
            is_searching: false,
            results: Vec::new(),
            last_summary: None,
            run_id: 0,
            search_handle: None,
        }
    }

    /// Requests cancellation of the current run and hands its handle back so
    /// the caller can wait for the worker outside the lock.
    pub fn cancel_current_search(&mut self) -> Option<SearchHandle> {
        let handle = self.search_handle.take();
        match &handle {
            Some(handle) => {
                tracing::info!("Cancelling search run {}.", self.run_id);
                handle.cancel();
            }
            None => tracing::debug!("cancel_current_search called without an active run."),
        }
        self.is_searching = false;
        handle
    }

    /// Installs `handle` as the current run and returns its new run id.
    pub fn begin_run(&mut self, handle: SearchHandle) -> u64 {
        self.run_id += 1;
        self.search_handle = Some(handle);
        self.is_searching = true;
        self.results.clear();
        self.last_summary = None;
        self.run_id
    }

    pub fn is_current(&self, run_id: u64) -> bool {
        self.run_id == run_id
    }

    /// Records the completion of `run_id` if it is still the current run.
    pub fn finish_run(&mut self, run_id: u64, summary: SearchSummary) -> bool {
        if !self.is_current(run_id) {
            return false;
        }
        self.is_searching = false;
        self.last_summary = Some(summary);
        self.search_handle = None;
        true
    }
}
