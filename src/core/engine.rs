//! Background traversal that streams matching paths while staying cancellable.

use super::error::CoreError;
use super::skip::{build_skip_matcher, is_skipped};
use super::SearchCriteria;
use chrono::{DateTime, Local};
use ignore::{DirEntry, WalkBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// Number of undelivered events a run may hold before the worker waits for the consumer.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// An event emitted by a running search.
///
/// A run produces zero or more `MatchFound` events followed by exactly one
/// `Completed`. Nothing is sent after `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    MatchFound { path: PathBuf },
    Completed(SearchSummary),
}

/// The outcome carried by the completion event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    /// `true` if at least one match event was emitted.
    pub any_match_found: bool,
    /// `true` if the run stopped before exhausting every root.
    ///
    /// Set by an observed cancel request and also when the event receiver was
    /// dropped mid-run, since nobody is left to consume further matches.
    pub cancelled: bool,
    pub match_count: usize,
    /// Regular files whose metadata was read and evaluated.
    pub files_examined: usize,
    /// Entries and subtrees dropped because they could not be read.
    pub entries_skipped: usize,
}

/// Lifecycle of a run as seen through its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    CancelRequested,
    Completed,
}

#[derive(Debug, Default)]
struct RunShared {
    cancel_flag: AtomicBool,
    /// Wakes a worker parked on a full channel.
    cancel_notify: Notify,
    completed: AtomicBool,
    match_count: AtomicUsize,
}

/// Caller-side handle to one run: request cancellation, observe state, wait.
#[derive(Debug)]
pub struct SearchHandle {
    shared: Arc<RunShared>,
    worker: thread::JoinHandle<SearchSummary>,
}

impl SearchHandle {
    /// Requests cooperative termination. A no-op once the run has completed.
    pub fn cancel(&self) {
        if self.shared.completed.load(Ordering::SeqCst) {
            return;
        }
        if !self.shared.cancel_flag.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested for active search.");
            self.shared.cancel_notify.notify_one();
        }
    }

    pub fn state(&self) -> RunState {
        if self.shared.completed.load(Ordering::SeqCst) {
            RunState::Completed
        } else if self.shared.cancel_flag.load(Ordering::SeqCst) {
            RunState::CancelRequested
        } else {
            RunState::Running
        }
    }

    /// Matches emitted so far.
    pub fn match_count(&self) -> usize {
        self.shared.match_count.load(Ordering::SeqCst)
    }

    /// Blocks until the worker has exited and returns the final summary.
    ///
    /// The worker parks while the event channel is full, so keep draining the
    /// receiver (or drop it) while waiting.
    pub fn wait(self) -> Result<SearchSummary, CoreError> {
        self.worker.join().map_err(|_| CoreError::WorkerPanicked)
    }

    /// Async counterpart of [`wait`](Self::wait) for callers on a Tokio runtime.
    pub async fn wait_async(self) -> Result<SearchSummary, CoreError> {
        tokio::task::spawn_blocking(move || self.wait()).await?
    }
}

/// A started run: its handle plus the stream of events it produces.
#[derive(Debug)]
pub struct SearchRun {
    pub handle: SearchHandle,
    pub events: mpsc::Receiver<SearchEvent>,
}

impl SearchRun {
    /// Drains the run on the current thread and returns every match in emission order.
    ///
    /// Must not be called from within an async context.
    pub fn collect_blocking(mut self) -> Result<(Vec<PathBuf>, SearchSummary), CoreError> {
        let mut matches = Vec::new();
        let mut completed = None;
        while let Some(event) = self.events.blocking_recv() {
            match event {
                SearchEvent::MatchFound { path } => matches.push(path),
                SearchEvent::Completed(summary) => completed = Some(summary),
            }
        }
        let joined = self.handle.wait()?;
        Ok((matches, completed.unwrap_or(joined)))
    }
}

/// Starts search runs on dedicated worker threads.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    event_buffer: usize,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many events may queue up before the worker waits for the consumer.
    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }

    /// Validates `criteria` and starts traversing its roots in the background.
    ///
    /// Contract violations are reported here and no run is created.
    pub fn start(&self, criteria: SearchCriteria) -> Result<SearchRun, CoreError> {
        criteria.validate()?;

        let (sender, events) = mpsc::channel(self.event_buffer);
        let shared = Arc::new(RunShared::default());
        let traversal = Traversal {
            criteria,
            shared: shared.clone(),
            sender,
            summary: SearchSummary::default(),
        };

        let worker = thread::Builder::new()
            .name("file-finder-search".to_string())
            .spawn(move || traversal.run())
            .map_err(CoreError::WorkerSpawn)?;

        Ok(SearchRun {
            handle: SearchHandle { shared, worker },
            events,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The worker-side state of one run. Owned exclusively by the worker thread.
struct Traversal {
    criteria: SearchCriteria,
    shared: Arc<RunShared>,
    sender: mpsc::Sender<SearchEvent>,
    summary: SearchSummary,
}

impl Traversal {
    fn run(mut self) -> SearchSummary {
        let started = Instant::now();
        tracing::info!(
            "🔎 Search started: {:?} ({:?}) across {} root(s)",
            self.criteria.name_pattern(),
            self.criteria.match_mode(),
            self.criteria.roots().len()
        );

        // Only drives sends that wait on a full channel; no tasks are spawned on it.
        let flow = match Builder::new_current_thread().build() {
            Ok(runtime) => self.walk_roots(&runtime),
            Err(e) => {
                tracing::error!("Failed to create the event runtime: {}", e);
                Flow::Stop
            }
        };

        self.summary.cancelled = flow == Flow::Stop;
        self.summary.any_match_found = self.summary.match_count > 0;
        let summary = self.summary;

        tracing::info!(
            "✅ Search finished in {:?}: {} match(es), {} file(s) examined, {} entries skipped, cancelled: {}",
            started.elapsed(),
            summary.match_count,
            summary.files_examined,
            summary.entries_skipped,
            summary.cancelled
        );

        // Terminal before the consumer can see the completion, so a cancel
        // issued in reaction to it is already a no-op.
        self.shared.completed.store(true, Ordering::SeqCst);
        self.deliver_completion(summary);
        summary
    }

    fn walk_roots(&mut self, runtime: &Runtime) -> Flow {
        let roots = self.criteria.roots().to_vec();
        for root in &roots {
            if self.walk_root(runtime, root) == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn cancel_requested(&self) -> bool {
        self.shared.cancel_flag.load(Ordering::SeqCst)
    }

    fn walk_root(&mut self, runtime: &Runtime, root: &Path) -> Flow {
        if self.cancel_requested() {
            return Flow::Stop;
        }

        match std::fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                tracing::warn!("Skipping root {:?}: not a directory", root);
                return Flow::Continue;
            }
            Err(e) => {
                tracing::warn!("Skipping root {:?}: {}", root, e);
                return Flow::Continue;
            }
        }

        let matcher = match build_skip_matcher(root, self.criteria.skip_patterns()) {
            Ok(matcher) => matcher,
            Err(e) => {
                tracing::warn!("Skipping root {:?}: {}", root, e);
                return Flow::Continue;
            }
        };

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(self.criteria.follow_links())
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                entry.depth() == 0 || !is_skipped(&matcher, entry.path(), is_dir)
            })
            .build();

        for result in walker {
            if self.cancel_requested() {
                tracing::info!("🛑 Search cancelled while walking {:?}", root);
                return Flow::Stop;
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    self.summary.entries_skipped += 1;
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            if self.visit_file(runtime, &entry) == Flow::Stop {
                return Flow::Stop;
            }
        }

        Flow::Continue
    }

    fn visit_file(&mut self, runtime: &Runtime, entry: &DirEntry) -> Flow {
        let path = entry.path();
        let (size, modified) = match entry
            .metadata()
            .map_err(std::io::Error::other)
            .and_then(|md| Ok((md.len(), md.modified()?)))
        {
            Ok(read) => read,
            Err(e) => {
                tracing::debug!("Skipping {:?}: {}", path, e);
                self.summary.entries_skipped += 1;
                return Flow::Continue;
            }
        };

        self.summary.files_examined += 1;
        let modified_date = DateTime::<Local>::from(modified).date_naive();
        if !self.criteria.matches_path(path, size, modified_date) {
            return Flow::Continue;
        }

        // No match may be emitted once a cancel request has been observed.
        if self.cancel_requested() {
            return Flow::Stop;
        }

        tracing::trace!("Match: {:?}", path);
        let event = SearchEvent::MatchFound {
            path: path.to_path_buf(),
        };
        if !self.deliver_match(runtime, event) {
            return Flow::Stop;
        }

        self.summary.match_count += 1;
        self.shared.match_count.fetch_add(1, Ordering::SeqCst);
        Flow::Continue
    }

    /// Sends a match, waiting while the channel is full. Returns `false` if
    /// the receiver is gone or a cancel request arrived first.
    fn deliver_match(&self, runtime: &Runtime, event: SearchEvent) -> bool {
        let event = match self.sender.try_send(event) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Event receiver dropped; stopping search.");
                return false;
            }
            Err(TrySendError::Full(event)) => event,
        };

        runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.shared.cancel_notify.notified() => false,
                sent = self.sender.send(event) => match sent {
                    Ok(()) => true,
                    Err(_) => {
                        tracing::debug!("Event receiver dropped; stopping search.");
                        false
                    }
                },
            }
        })
    }

    /// Sends the completion event. Never interrupted by cancellation; only a
    /// dropped receiver loses it.
    fn deliver_completion(&self, summary: SearchSummary) {
        if self
            .sender
            .blocking_send(SearchEvent::Completed(summary))
            .is_err()
        {
            tracing::debug!("Event receiver dropped before completion was delivered.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MatchMode;
    use crate::utils::test_helpers::{running_as_root, setup_test_logging};
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, bytes: usize) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, vec![b'x'; bytes]).unwrap();
        path
    }

    fn run(criteria: SearchCriteria) -> (Vec<PathBuf>, SearchSummary) {
        SearchEngine::new()
            .start(criteria)
            .expect("criteria should be valid")
            .collect_blocking()
            .expect("worker should not panic")
    }

    #[test]
    fn test_finds_matches_in_depth_first_order() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let b = touch(root, "b/report_b.txt", 1);
        let a_nested = touch(root, "a/deep/report_deep.txt", 1);
        let a = touch(root, "a/report_a.txt", 1);
        let top = touch(root, "report_top.txt", 1);
        touch(root, "a/unrelated.txt", 1);

        let (found, summary) = run(SearchCriteria::new([root], "report"));

        assert_eq!(found, vec![a_nested, a, b, top]);
        assert_eq!(
            summary,
            SearchSummary {
                any_match_found: true,
                cancelled: false,
                match_count: 4,
                files_examined: 5,
                entries_skipped: 0,
            }
        );
    }

    #[test]
    fn test_empty_result() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("file_{i}.txt"), 10);
        }

        let (found, summary) = run(SearchCriteria::new([dir.path()], "missing"));

        assert!(found.is_empty());
        assert!(!summary.any_match_found);
        assert!(!summary.cancelled);
        assert_eq!(summary.files_examined, 5);
    }

    #[test]
    fn test_multiple_roots_and_invalid_root() {
        setup_test_logging();
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let one = touch(first.path(), "photo.png", 1);
        let two = touch(second.path(), "nested/photo.png", 1);
        let missing = first.path().join("does-not-exist");

        let criteria = SearchCriteria::new(
            [first.path().to_path_buf(), missing, second.path().to_path_buf()],
            "photo",
        )
        .with_extension(".png");
        let (found, summary) = run(criteria);

        assert_eq!(found.len(), 2);
        assert!(found.contains(&one));
        assert!(found.contains(&two));
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_root_that_is_a_file_contributes_nothing() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let file = touch(dir.path(), "match.txt", 1);

        let (found, summary) = run(SearchCriteria::new([file], "match"));

        assert!(found.is_empty());
        assert!(!summary.any_match_found);
        assert!(!summary.cancelled);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_skipped() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        for i in 0..9 {
            touch(dir.path(), &format!("data_{i}.csv"), 4);
        }
        std::os::unix::fs::symlink(
            dir.path().join("nowhere.csv"),
            dir.path().join("data_broken.csv"),
        )
        .unwrap();

        let criteria = SearchCriteria::new([dir.path()], "data").with_follow_links(true);
        let (found, summary) = run(criteria);

        assert_eq!(found.len(), 9);
        assert!(summary.any_match_found);
        assert!(!summary.cancelled);
        assert_eq!(summary.entries_skipped, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed_by_default() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let target = touch(dir.path(), "real/notes.md", 1);
        std::os::unix::fs::symlink(&target, dir.path().join("notes_link.md")).unwrap();

        let (found, _) = run(SearchCriteria::new([dir.path()], "notes"));

        assert_eq!(found, vec![target]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        if running_as_root() {
            return;
        }
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let visible = touch(dir.path(), "open/log_1.txt", 1);
        touch(dir.path(), "locked/log_2.txt", 1);
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let (found, summary) = run(SearchCriteria::new([dir.path()], "log"));

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(found, vec![visible]);
        assert!(!summary.cancelled);
        assert!(summary.entries_skipped >= 1);
    }

    #[test]
    fn test_skip_patterns_prune_subtrees() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let kept = touch(dir.path(), "src/index.js", 1);
        touch(dir.path(), "node_modules/pkg/index.js", 1);
        touch(dir.path(), "src/index.tmp", 1);

        let criteria = SearchCriteria::new([dir.path()], "index")
            .with_match_mode(MatchMode::Exact)
            .with_skip_patterns(["node_modules/", "*.tmp"]);
        let (found, summary) = run(criteria);

        assert_eq!(found, vec![kept]);
        assert_eq!(summary.files_examined, 1);
    }

    #[test]
    fn test_size_filter_on_disk() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "blob_small.bin", 99);
        let low = touch(dir.path(), "blob_low.bin", 100);
        let high = touch(dir.path(), "blob_high.bin", 200);
        touch(dir.path(), "blob_big.bin", 201);

        let (found, _) = run(SearchCriteria::new([dir.path()], "blob").with_size_range(100, 200));

        assert_eq!(found, vec![high, low]);
    }

    #[test]
    fn test_date_filter_on_disk() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let fresh = touch(dir.path(), "fresh.txt", 1);
        let today = Local::now().date_naive();

        let window = SearchCriteria::new([dir.path()], "fresh")
            .with_date_range(today.pred_opt(), today.succ_opt());
        let (found, _) = run(window);
        assert_eq!(found, vec![fresh]);

        let future = SearchCriteria::new([dir.path()], "fresh")
            .with_date_range(today.succ_opt(), None);
        let (found, summary) = run(future);
        assert!(found.is_empty());
        assert!(!summary.any_match_found);
    }

    #[test]
    fn test_invalid_criteria_rejected_at_start() {
        let dir = TempDir::new().unwrap();
        let result = SearchEngine::new()
            .start(SearchCriteria::new([dir.path()], "x").with_size_range(5, 1));
        assert!(matches!(result, Err(CoreError::InvalidSizeRange { .. })));
    }

    #[test]
    fn test_cancel_after_first_match() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        for d in 0..10 {
            for f in 0..50 {
                touch(dir.path(), &format!("dir_{d}/item_{f}.txt"), 1);
            }
        }

        let mut run = SearchEngine::new()
            .with_event_buffer(1)
            .start(SearchCriteria::new([dir.path()], "item"))
            .unwrap();

        let first = run.events.blocking_recv().unwrap();
        assert!(matches!(first, SearchEvent::MatchFound { .. }));
        run.handle.cancel();
        assert_ne!(run.handle.state(), RunState::Running);

        let mut after_cancel = 0;
        let mut completion = None;
        while let Some(event) = run.events.blocking_recv() {
            match event {
                SearchEvent::MatchFound { .. } => {
                    assert!(completion.is_none(), "match after completion");
                    after_cancel += 1;
                }
                SearchEvent::Completed(summary) => completion = Some(summary),
            }
        }

        let summary = completion.expect("completion event");
        assert!(summary.cancelled);
        assert!(summary.any_match_found);
        assert!(after_cancel <= 2, "worker kept emitting after cancel");
        assert_eq!(run.handle.state(), RunState::Completed);
        assert_eq!(run.handle.wait().unwrap(), summary);
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "one.txt", 1);

        let mut run = SearchEngine::new()
            .start(SearchCriteria::new([dir.path()], "one"))
            .unwrap();
        while run.events.blocking_recv().is_some() {}

        assert_eq!(run.handle.state(), RunState::Completed);
        run.handle.cancel();
        run.handle.cancel();
        assert_eq!(run.handle.state(), RunState::Completed);
        assert_eq!(run.handle.match_count(), 1);
        assert!(!run.handle.wait().unwrap().cancelled);
    }

    #[test]
    fn test_cancel_on_completion_event_keeps_run_completed() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "done.txt", 1);

        for _ in 0..50 {
            let mut run = SearchEngine::new()
                .start(SearchCriteria::new([dir.path()], "done"))
                .unwrap();
            let summary = loop {
                match run.events.blocking_recv() {
                    Some(SearchEvent::Completed(summary)) => break summary,
                    Some(SearchEvent::MatchFound { .. }) => {}
                    None => panic!("channel closed without completion"),
                }
            };

            run.handle.cancel();
            assert_eq!(run.handle.state(), RunState::Completed);
            assert!(!summary.cancelled);
            assert_eq!(run.handle.wait().unwrap(), summary);
        }
    }

    #[test]
    fn test_cancel_wakes_worker_waiting_on_full_channel() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            touch(dir.path(), &format!("queued_{i}.txt"), 1);
        }

        let run = SearchEngine::new()
            .with_event_buffer(1)
            .start(SearchCriteria::new([dir.path()], "queued"))
            .unwrap();
        // Nothing is read, so the worker parks on its second match.
        thread::sleep(std::time::Duration::from_millis(50));
        run.handle.cancel();

        let (found, summary) = run.collect_blocking().unwrap();
        assert!(summary.cancelled);
        assert!(found.len() <= 1);
        assert_eq!(summary.match_count, found.len());
    }

    #[test]
    fn test_dropped_receiver_stops_worker() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            touch(dir.path(), &format!("hit_{i}.txt"), 1);
        }

        let run = SearchEngine::new()
            .with_event_buffer(1)
            .start(SearchCriteria::new([dir.path()], "hit"))
            .unwrap();
        drop(run.events);

        let summary = run.handle.wait().unwrap();
        assert!(summary.cancelled);
        // At most the single buffered event went out before the drop.
        assert!(summary.match_count <= 1);
    }

    #[tokio::test]
    async fn test_async_consumer() {
        setup_test_logging();
        let dir = TempDir::new().unwrap();
        let expected = touch(dir.path(), "async_target.rs", 1);

        let mut run = SearchEngine::new()
            .start(SearchCriteria::new([dir.path()], "target"))
            .unwrap();

        let mut found = Vec::new();
        let mut summary = None;
        while let Some(event) = run.events.recv().await {
            match event {
                SearchEvent::MatchFound { path } => found.push(path),
                SearchEvent::Completed(s) => summary = Some(s),
            }
        }

        assert_eq!(found, vec![expected]);
        assert!(summary.unwrap().any_match_found);
        let joined = run.handle.wait_async().await.unwrap();
        assert_eq!(joined.match_count, 1);
    }
}
