//! Defines an abstraction over the event sending mechanism.

use super::events::UserEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of user events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: UserEvent);
}

/// Forwards events into an unbounded Tokio channel, e.g. the CLI's output loop.
impl EventProxy for UnboundedSender<UserEvent> {
    fn send_event(&self, event: UserEvent) {
        // A closed receiver means the consumer has gone away; the event is dropped.
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to deliver event, receiver closed: {:?}", e.0);
        }
    }
}
