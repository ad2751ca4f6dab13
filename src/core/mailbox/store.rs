//! Single-slot mailbox for the latest pending alert.
//!
//! Writes replace all three fields in one commit. Reads never mutate; the
//! consumer de-duplicates by timestamp.

use std::sync::Arc;

use serde_json::Value;

use super::prefs::Preferences;
use crate::core::error::Result;
use crate::core::model::PendingAlert;

pub const MAILBOX_NAMESPACE: &str = "email_alert";
pub const KEY_SUBJECT: &str = "pending_subject";
pub const KEY_FROM: &str = "pending_from";
pub const KEY_TIMESTAMP: &str = "pending_timestamp";

#[derive(Debug, Clone)]
pub struct Mailbox {
    prefs: Arc<Preferences>,
}

impl Mailbox {
    pub fn new(prefs: Arc<Preferences>) -> Self {
        Self { prefs }
    }

    /// Overwrite the slot with `alert`. Whatever the file held before is discarded.
    pub fn write(&self, alert: &PendingAlert) -> Result<()> {
        self.prefs
            .edit()
            .clear()
            .put_string(KEY_SUBJECT, alert.subject.as_str())
            .put_string(KEY_FROM, alert.origin.as_str())
            .put_i64(KEY_TIMESTAMP, alert.timestamp)
            .commit()
    }

    /// Current record, if the slot holds a complete one.
    pub fn read(&self) -> Result<Option<PendingAlert>> {
        let entries = self.prefs.all()?;
        let subject = entries.get(KEY_SUBJECT).and_then(Value::as_str);
        let origin = entries.get(KEY_FROM).and_then(Value::as_str);
        let timestamp = entries.get(KEY_TIMESTAMP).and_then(Value::as_i64);

        match (subject, origin, timestamp) {
            (Some(subject), Some(origin), Some(timestamp)) => Ok(Some(PendingAlert {
                subject: subject.to_string(),
                origin: origin.to_string(),
                timestamp,
            })),
            (None, None, None) => Ok(None),
            _ => {
                log::warn!(
                    "Ignoring incomplete pending alert in {}",
                    self.prefs.path().display()
                );
                Ok(None)
            }
        }
    }
}
