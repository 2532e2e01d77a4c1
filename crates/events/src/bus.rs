//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`EditEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use lorebase_core::types::DbId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// A new edit was proposed and is open for voting.
pub const EVENT_EDIT_PROPOSED: &str = "edit.proposed";

/// A pending edit is still open and the voting window is closing.
pub const EVENT_EDIT_REMINDER: &str = "edit.reminder";

/// A pending edit was accepted.
pub const EVENT_EDIT_ACCEPTED: &str = "edit.accepted";

/// A pending edit was rejected.
pub const EVENT_EDIT_REJECTED: &str = "edit.rejected";

// ---------------------------------------------------------------------------
// EditEvent
// ---------------------------------------------------------------------------

/// A domain event in an edit's lifecycle.
///
/// Constructed via [`EditEvent::new`] and enriched with the builder method
/// [`with_payload`](EditEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEvent {
    /// Dot-separated event name, e.g. `"edit.proposed"`.
    pub event_type: String,

    /// The content piece the edit targets.
    pub content_id: DbId,

    /// The edit the event is about.
    pub edit_id: DbId,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl EditEvent {
    /// Create a new event for an edit.
    ///
    /// The payload defaults to an empty object.
    pub fn new(event_type: impl Into<String>, content_id: DbId, edit_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            content_id,
            edit_id,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`EditEvent`].
pub struct EventBus {
    sender: broadcast::Sender<EditEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: EditEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Create a new subscription that receives every event published from
    /// this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<EditEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(EditEvent::new(EVENT_EDIT_PROPOSED, 3, 7));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_EDIT_PROPOSED);
        assert_eq!(event.content_id, 3);
        assert_eq!(event.edit_id, 7);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(EditEvent::new(EVENT_EDIT_ACCEPTED, 1, 2));
    }

    #[tokio::test]
    async fn payload_builder_attaches_data() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            EditEvent::new(EVENT_EDIT_REMINDER, 3, 7)
                .with_payload(serde_json::json!({ "days_remaining": 2 })),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload["days_remaining"], 2);
    }

    #[test]
    fn event_serde_round_trip() {
        let event = EditEvent::new(EVENT_EDIT_REJECTED, 5, 9)
            .with_payload(serde_json::json!({ "vote_result": "2 for, 3 against" }));
        let json = serde_json::to_string(&event).unwrap();
        let parsed: EditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, event.event_type);
        assert_eq!(parsed.payload, event.payload);
    }
}
