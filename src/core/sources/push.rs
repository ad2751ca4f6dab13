//! Adapter for push-service transmit messages.
//!
//! The payload is UTF-8 JSON of the shape `{"subject"?: .., "from"?: ..}`.
//! Anything else is a [`Error::MalformedPayload`] and the caller drops it.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::core::error::{Error, Result};
use crate::core::model::{EventChannel, RawEvent};

/// Subject/sender pair decoded from a push payload, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub subject: String,
    pub from: String,
}

/// Decode a raw push payload.
pub fn decode(payload: &[u8], default_subject: &str, default_from: &str) -> Result<PushMessage> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::MalformedPayload(format!("payload is not UTF-8: {e}")))?;
    log::debug!("Received push message: {}", text);

    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::MalformedPayload(format!("payload is not JSON: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(Error::MalformedPayload(
            "payload is not a JSON object".to_string(),
        ));
    };

    Ok(PushMessage {
        subject: string_field(&fields, "subject").unwrap_or_else(|| default_subject.to_string()),
        from: string_field(&fields, "from").unwrap_or_else(|| default_from.to_string()),
    })
}

/// Read an optional string field; scalar non-strings are rendered as text,
/// `null` and nested values count as absent.
pub(crate) fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Decode a payload and normalize it into a push-channel event.
pub fn normalize(
    payload: &[u8],
    default_subject: &str,
    default_from: &str,
    received_at: DateTime<Utc>,
) -> Result<RawEvent> {
    let message = decode(payload, default_subject, default_from)?;
    Ok(RawEvent {
        channel: EventChannel::Push,
        source_id: message.from,
        title: message.subject,
        body: String::new(),
        received_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_payload() {
        let message = decode(
            br#"{"subject":"Server Down","from":"ops@x.com"}"#,
            "Email Alert",
            "Unknown",
        )
        .unwrap();

        assert_eq!(message.subject, "Server Down");
        assert_eq!(message.from, "ops@x.com");
    }

    #[test]
    fn test_decode_applies_defaults() {
        let message = decode(br#"{"subject":null}"#, "Email Alert", "Unknown").unwrap();
        assert_eq!(message.subject, "Email Alert");
        assert_eq!(message.from, "Unknown");
    }

    #[test]
    fn test_decode_renders_scalars() {
        let message = decode(br#"{"subject":42,"from":true}"#, "Email Alert", "Unknown").unwrap();
        assert_eq!(message.subject, "42");
        assert_eq!(message.from, "true");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases: [&[u8]; 5] = [b"not-json", b"", b"[1,2]", b"\"text\"", &[0xff, 0xfe, 0x7b]];
        for payload in cases {
            assert!(
                matches!(decode(payload, "s", "f"), Err(Error::MalformedPayload(_))),
                "{payload:?}"
            );
        }
    }

    #[test]
    fn test_normalize_maps_fields() {
        let now = Utc::now();
        let event = normalize(br#"{"subject":"Disk full","from":"ops@x.com"}"#, "s", "f", now).unwrap();

        assert_eq!(event.channel, EventChannel::Push);
        assert_eq!(event.source_id, "ops@x.com");
        assert_eq!(event.title, "Disk full");
        assert!(event.body.is_empty());
        assert_eq!(event.received_at, now);
    }
}
