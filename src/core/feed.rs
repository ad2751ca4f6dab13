//! Server-sent-events alert feed.
//!
//! The alert server streams `event: alert` / `data: {json}` pairs from
//! `<base>/events`. Alerts from the feed are already decided by the server
//! and go straight to the consumer's handler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;

use super::consumer::{AlertHandler, ConsumedAlert, DeliveryPath};
use super::error::{Error, Result};
use super::sources::push::string_field;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Splits a byte stream into complete lines. Partial lines (including
/// split UTF-8 sequences) wait in the buffer for the next chunk.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

/// Decode one SSE line. Only `data:` lines carrying a JSON object produce an alert.
pub fn parse_line(
    line: &str,
    default_subject: &str,
    default_from: &str,
    received_at: i64,
) -> Option<ConsumedAlert> {
    let data = line.strip_prefix("data:")?.trim_start();
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(data) else {
        log::debug!("Ignoring feed data line: {}", data);
        return None;
    };

    Some(ConsumedAlert {
        subject: string_field(&fields, "subject").unwrap_or_else(|| default_subject.to_string()),
        origin: string_field(&fields, "from").unwrap_or_else(|| default_from.to_string()),
        timestamp: received_at,
        path: DeliveryPath::Feed,
    })
}

pub struct AlertFeed {
    client: reqwest::Client,
    url: String,
    default_subject: String,
    default_from: String,
}

impl AlertFeed {
    pub fn new(base_url: &str, default_subject: &str, default_from: &str) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::Config("feed URL is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{base}/events"),
            default_subject: default_subject.to_string(),
            default_from: default_from.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream alerts into `handler` until the server closes the stream or shutdown is requested.
    pub async fn run(
        &self,
        handler: Arc<dyn AlertHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let response = tokio::select! {
            response = self.client.get(&self.url).send() => response
                .map_err(|e| Error::Delivery(format!("cannot connect to {}: {e}", self.url)))?,
            _ = shutdown.changed() => return Ok(()),
        };
        if !response.status().is_success() {
            return Err(Error::Delivery(format!(
                "connection failed: {}",
                response.status()
            )));
        }
        log::info!("Connected to alert feed {}", self.url);

        let mut stream = Box::pin(response.bytes_stream());
        let mut lines = LineBuffer::default();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                chunk = stream.next() => {
                    let Some(chunk) = chunk else {
                        log::info!("Alert feed closed by server");
                        break;
                    };
                    let chunk = chunk.map_err(|e| Error::Delivery(format!("feed read failed: {e}")))?;
                    for line in lines.push(&chunk) {
                        let now = Utc::now().timestamp_millis();
                        if let Some(alert) = parse_line(&line, &self.default_subject, &self.default_from, now) {
                            handler.on_alert(&alert);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
