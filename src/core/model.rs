use chrono::{DateTime, Utc};

/// Which inbound path produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// System notification-posted callback
    Notification,
    /// Push-message payload from the push service
    Push,
}

/// Normalized incoming event, alive only while one notification/message is processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub channel: EventChannel,
    /// Originating app/service identifier (package name, or push sender)
    pub source_id: String,
    pub title: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// Classifier verdict plus the display fields extracted from the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertDecision {
    pub is_alert: bool,
    pub channel: EventChannel,
    pub subject: String,
    pub origin: String,
    /// Notification body text; empty on the push path
    pub text: String,
    pub detected_at: DateTime<Utc>,
}

impl AlertDecision {
    pub fn to_pending(&self) -> PendingAlert {
        PendingAlert {
            subject: self.subject.clone(),
            origin: self.origin.clone(),
            timestamp: self.detected_at.timestamp_millis(),
        }
    }
}

/// The single record held by the mailbox. Last write wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAlert {
    pub subject: String,
    pub origin: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}
