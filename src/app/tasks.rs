use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::events::UserEvent;
use super::lock_state;
use super::proxy::EventProxy;
use super::state::FinderState;

use crate::config::settings;
use crate::core::{SearchEngine, SearchEvent, SearchSummary};

/// Starts a search with the current settings.
///
/// Any previous run is cancelled and fully stopped before the new one starts.
/// The returned task forwards the run's events to `proxy` and ends once the
/// completion event has been delivered.
pub fn start_search<P: EventProxy>(proxy: P, state: Arc<Mutex<FinderState>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let previous = lock_state(&state).cancel_current_search();
        if let Some(handle) = previous {
            match handle.wait_async().await {
                Ok(summary) => tracing::info!(
                    "Previous search stopped ({} match(es), cancelled: {}).",
                    summary.match_count,
                    summary.cancelled
                ),
                Err(e) => tracing::error!("Previous search ended abnormally: {}", e),
            }
        }

        let (run_id, events) = {
            let mut state_guard = lock_state(&state);

            let criteria = match state_guard.config.to_criteria() {
                Ok(criteria) => criteria,
                Err(e) => {
                    tracing::warn!("Rejected search settings: {}", e);
                    proxy.send_event(UserEvent::ShowError(e.to_string()));
                    return;
                }
            };

            let engine = SearchEngine::new().with_event_buffer(state_guard.config.event_buffer);
            let run = match engine.start(criteria) {
                Ok(run) => run,
                Err(e) => {
                    tracing::error!("Failed to start search: {}", e);
                    proxy.send_event(UserEvent::ShowError(e.to_string()));
                    return;
                }
            };

            // Another start may have slipped in while we waited; it loses.
            if state_guard.cancel_current_search().is_some() {
                tracing::debug!("Superseding a concurrently started run.");
            }

            let run_id = state_guard.begin_run(run.handle);
            if let Some(path) = state_guard.config_path.clone() {
                if let Err(e) = settings::save_config(&state_guard.config, Some(&path)) {
                    tracing::warn!("Failed to persist search settings: {}", e);
                }
            }
            (run_id, run.events)
        };

        tracing::info!("Search run {} started.", run_id);
        proxy.send_event(UserEvent::SearchStarted { run_id });
        forward_events(run_id, events, proxy, state).await;
    })
}

/// Drains one run's events, recording them in `state` and passing them on.
async fn forward_events<P: EventProxy>(
    run_id: u64,
    mut events: mpsc::Receiver<SearchEvent>,
    proxy: P,
    state: Arc<Mutex<FinderState>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SearchEvent::MatchFound { path } => {
                {
                    let mut state_guard = lock_state(&state);
                    if !state_guard.is_current(run_id) {
                        tracing::debug!("Discarding match from superseded run {}.", run_id);
                        continue;
                    }
                    state_guard.results.push(path.clone());
                }
                proxy.send_event(UserEvent::MatchFound { run_id, path });
            }
            SearchEvent::Completed(summary) => {
                if !lock_state(&state).finish_run(run_id, summary) {
                    tracing::debug!("Run {} finished after being superseded.", run_id);
                }
                proxy.send_event(UserEvent::SearchFinished { run_id, summary });
            }
        }
    }
}

/// Requests cancellation of the active run. Does nothing when no run is active.
pub fn cancel_search(state: &Arc<Mutex<FinderState>>) {
    let state_guard = lock_state(state);
    match &state_guard.search_handle {
        Some(handle) => handle.cancel(),
        None => tracing::debug!("cancel_search called without an active run."),
    }
}

/// Cancels the active run and waits until its worker has exited.
///
/// Intended for shutdown, so no traversal outlives the process's last request.
pub async fn stop_search(state: &Arc<Mutex<FinderState>>) -> Option<SearchSummary> {
    let handle = {
        let mut state_guard = lock_state(state);
        let handle = state_guard.search_handle.take()?;
        handle.cancel();
        handle
    };

    match handle.wait_async().await {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!("Search worker ended abnormally: {}", e);
            None
        }
    }
}
