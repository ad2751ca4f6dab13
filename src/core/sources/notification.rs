//! Adapter for system notification-posted events.
//!
//! The host hands over the posting package and the title/text extras it
//! found on the notification. Missing extras become empty strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::model::{EventChannel, RawEvent};

/// A posted status-bar notification as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedNotification {
    /// Package name of the posting app
    pub package: String,
    /// `android.title` extra
    #[serde(default)]
    pub title: Option<String>,
    /// `android.text` extra
    #[serde(default)]
    pub text: Option<String>,
}

impl PostedNotification {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            title: None,
            text: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Normalize a posted notification.
///
/// Returns `None` when the package name is missing, since the source filter
/// cannot run without it.
pub fn normalize(notification: &PostedNotification, received_at: DateTime<Utc>) -> Option<RawEvent> {
    let package = notification.package.trim();
    if package.is_empty() {
        return None;
    }

    let title = notification.title.clone().unwrap_or_default();
    let body = notification.text.clone().unwrap_or_default();

    log::debug!("Notification from: {}", package);
    log::debug!("Title: {}", title);
    log::debug!("Text: {}", body);

    Some(RawEvent {
        channel: EventChannel::Notification,
        source_id: package.to_string(),
        title,
        body,
        received_at,
    })
}
