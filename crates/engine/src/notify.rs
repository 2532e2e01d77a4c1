//! Notification collaborator.
//!
//! Notifications are strictly fire-and-forget: delivery failures are logged
//! and never propagate into the edit lifecycle. [`EventBusNotifier`] is the
//! production implementation; it publishes an [`EditEvent`] on the bus for
//! in-process subscribers and fans the rendered message out over email.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use lorebase_core::types::DbId;
use lorebase_events::bus::{
    EVENT_EDIT_ACCEPTED, EVENT_EDIT_PROPOSED, EVENT_EDIT_REJECTED, EVENT_EDIT_REMINDER,
};
use lorebase_events::{EditEvent, EmailDelivery, EventBus};

// ---------------------------------------------------------------------------
// Notification model
// ---------------------------------------------------------------------------

/// Which lifecycle moment a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A new edit was proposed.
    Proposed,
    /// The voting window is closing.
    Reminder,
    /// The edit was accepted.
    Accepted,
    /// The edit was rejected.
    Rejected,
}

impl NotificationKind {
    /// Event bus name for this notification.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Proposed => EVENT_EDIT_PROPOSED,
            Self::Reminder => EVENT_EDIT_REMINDER,
            Self::Accepted => EVENT_EDIT_ACCEPTED,
            Self::Rejected => EVENT_EDIT_REJECTED,
        }
    }
}

/// One rendered-and-ready notification.
#[derive(Debug, Clone)]
pub struct EditNotification {
    pub kind: NotificationKind,
    pub content_id: DbId,
    pub edit_id: DbId,
    /// Email addresses of the recipients (the content piece's authors).
    pub recipients: Vec<String>,
    pub content_name: String,
    /// The proposed text of the edit.
    pub edit_text: String,
    /// Days left in the voting window (reminders only).
    pub days_remaining: Option<i64>,
    /// Human-readable vote summary (terminal notifications only).
    pub vote_result: Option<String>,
}

/// Collaborator that delivers edit lifecycle notifications.
#[async_trait]
pub trait EditNotifier: Send + Sync {
    /// Deliver a notification. Implementations log failures internally and
    /// never return an error; finalization must not block on delivery.
    async fn notify(&self, notification: EditNotification);
}

// ---------------------------------------------------------------------------
// EventBusNotifier
// ---------------------------------------------------------------------------

/// Production notifier: bus publish plus optional email fan-out.
pub struct EventBusNotifier {
    bus: Arc<EventBus>,
    email: Option<EmailDelivery>,
}

impl EventBusNotifier {
    /// Create a notifier. Pass `None` for `email` when SMTP is not
    /// configured; bus publishing still happens.
    pub fn new(bus: Arc<EventBus>, email: Option<EmailDelivery>) -> Self {
        Self { bus, email }
    }
}

#[async_trait]
impl EditNotifier for EventBusNotifier {
    async fn notify(&self, notification: EditNotification) {
        let event = EditEvent::new(
            notification.kind.event_type(),
            notification.content_id,
            notification.edit_id,
        )
        .with_payload(serde_json::json!({
            "content_name": notification.content_name,
            "edit_text": notification.edit_text,
            "days_remaining": notification.days_remaining,
            "vote_result": notification.vote_result,
        }));
        self.bus.publish(event);

        let Some(email) = &self.email else {
            return;
        };

        let subject = render_subject(&notification);
        let body = render_body(&notification);
        let sends = notification
            .recipients
            .iter()
            .map(|to| email.deliver(to, &subject, &body));
        for (recipient, result) in notification.recipients.iter().zip(join_all(sends).await) {
            if let Err(e) = result {
                tracing::error!(
                    recipient,
                    error = %e,
                    "Notification email delivery failed"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_subject(notification: &EditNotification) -> String {
    let name = &notification.content_name;
    match notification.kind {
        NotificationKind::Proposed => format!("[Lorebase] New edit proposed on \"{name}\""),
        NotificationKind::Reminder => format!("[Lorebase] Voting closes soon on \"{name}\""),
        NotificationKind::Accepted => format!("[Lorebase] Edit accepted on \"{name}\""),
        NotificationKind::Rejected => format!("[Lorebase] Edit rejected on \"{name}\""),
    }
}

fn render_body(notification: &EditNotification) -> String {
    let mut body = match notification.kind {
        NotificationKind::Proposed => format!(
            "A new edit to \"{}\" is open for voting.\n",
            notification.content_name
        ),
        NotificationKind::Reminder => format!(
            "An edit to \"{}\" is still awaiting your vote.\n",
            notification.content_name
        ),
        NotificationKind::Accepted => format!(
            "The community accepted an edit to \"{}\".\n",
            notification.content_name
        ),
        NotificationKind::Rejected => format!(
            "The community rejected an edit to \"{}\".\n",
            notification.content_name
        ),
    };

    body.push_str("\nProposed text:\n");
    body.push_str(&notification.edit_text);
    body.push('\n');

    if let Some(days) = notification.days_remaining {
        body.push_str(&format!("\nVoting closes in {days} day(s).\n"));
    }
    if let Some(result) = &notification.vote_result {
        body.push_str(&format!("\nFinal vote: {result}\n"));
    }
    body
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(kind: NotificationKind) -> EditNotification {
        EditNotification {
            kind,
            content_id: 3,
            edit_id: 7,
            recipients: vec!["author@example.com".to_string()],
            content_name: "Kylo Ren".to_string(),
            edit_text: "the revised text".to_string(),
            days_remaining: None,
            vote_result: None,
        }
    }

    #[tokio::test]
    async fn notify_publishes_bus_event() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let notifier = EventBusNotifier::new(Arc::clone(&bus), None);

        notifier.notify(notification(NotificationKind::Proposed)).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_EDIT_PROPOSED);
        assert_eq!(event.edit_id, 7);
        assert_eq!(event.payload["content_name"], "Kylo Ren");
    }

    #[test]
    fn subject_names_the_content_piece() {
        let subject = render_subject(&notification(NotificationKind::Accepted));
        assert!(subject.contains("accepted"));
        assert!(subject.contains("Kylo Ren"));
    }

    #[test]
    fn body_includes_days_remaining_for_reminders() {
        let mut n = notification(NotificationKind::Reminder);
        n.days_remaining = Some(2);
        let body = render_body(&n);
        assert!(body.contains("2 day(s)"));
        assert!(body.contains("the revised text"));
    }

    #[test]
    fn body_includes_vote_result_for_terminal_kinds() {
        let mut n = notification(NotificationKind::Rejected);
        n.vote_result = Some("1 for, 3 against".to_string());
        let body = render_body(&n);
        assert!(body.contains("1 for, 3 against"));
    }
}
