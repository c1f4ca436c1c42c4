//! The caller side of the finder: owns the active run and forwards its events.

pub mod events;
pub mod proxy;
pub mod state;
pub mod tasks;

use state::FinderState;
use std::sync::{Arc, Mutex, MutexGuard};

/// Locks the shared state, recovering the data if a previous holder panicked.
pub fn lock_state(state: &Arc<Mutex<FinderState>>) -> MutexGuard<'_, FinderState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
