//! Consumer side of the hand-off.
//!
//! [`PendingAlertListener`] watches both delivery paths: it polls the
//! mailbox on a fixed interval and listens for alert signals. The same
//! alert usually shows up on both paths, so anything not newer than the
//! last processed timestamp is skipped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, TimeZone};
use tokio::sync::{broadcast, watch};

use super::emitter::{AlertSignal, SignalBus};
use super::error::Result;
use super::mailbox::store::Mailbox;
use super::model::PendingAlert;

/// How an alert reached the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    Mailbox,
    Signal,
    Feed,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedAlert {
    pub subject: String,
    pub origin: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub path: DeliveryPath,
}

impl ConsumedAlert {
    pub fn from_pending(pending: PendingAlert) -> Self {
        Self {
            subject: pending.subject,
            origin: pending.origin,
            timestamp: pending.timestamp,
            path: DeliveryPath::Mailbox,
        }
    }

    pub fn from_signal(signal: &AlertSignal) -> Self {
        Self {
            subject: signal.subject().to_string(),
            origin: signal.origin().to_string(),
            timestamp: signal.timestamp(),
            path: DeliveryPath::Signal,
        }
    }
}

/// Whatever the consuming application does with an alert.
pub trait AlertHandler: Send + Sync {
    fn on_alert(&self, alert: &ConsumedAlert);
}

/// Receivers for both well-known signal channels.
#[derive(Debug)]
pub struct SignalSubscription {
    notification: broadcast::Receiver<AlertSignal>,
    push: broadcast::Receiver<AlertSignal>,
}

impl SignalSubscription {
    pub fn subscribe(bus: &SignalBus) -> Result<Self> {
        Ok(Self {
            notification: bus.subscribe(&bus.names().notification)?,
            push: bus.subscribe(&bus.names().push)?,
        })
    }
}

pub struct PendingAlertListener {
    mailbox: Mailbox,
    last_processed: i64,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl PendingAlertListener {
    pub fn new(mailbox: Mailbox, poll_interval: Duration, error_backoff: Duration) -> Self {
        Self {
            mailbox,
            last_processed: 0,
            poll_interval,
            error_backoff,
        }
    }

    /// Passes `alert` through only if it is newer than anything seen so far.
    pub fn accept(&mut self, alert: ConsumedAlert) -> Option<ConsumedAlert> {
        if alert.timestamp <= self.last_processed {
            return None;
        }
        self.last_processed = alert.timestamp;
        Some(alert)
    }

    /// Read the mailbox once.
    pub fn poll_once(&mut self) -> Result<Option<ConsumedAlert>> {
        Ok(self
            .mailbox
            .read()?
            .and_then(|pending| self.accept(ConsumedAlert::from_pending(pending))))
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(
        mut self,
        handler: Arc<dyn AlertHandler>,
        signals: Option<SignalSubscription>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!("Push listener started");
        let (mut notification_rx, mut push_rx) = match signals {
            Some(s) => (Some(s.notification), Some(s.push)),
            None => (None, None),
        };
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.poll_once() {
                        Ok(Some(alert)) => {
                            log::info!("New push received: {} from {}", alert.subject, alert.origin);
                            handler.on_alert(&alert);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::error!("Listener error: {}", e);
                            tokio::select! {
                                () = tokio::time::sleep(self.error_backoff) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                    }
                }
                signal = recv_signal(&mut notification_rx), if notification_rx.is_some() => {
                    self.on_signal(signal, &mut notification_rx, handler.as_ref());
                }
                signal = recv_signal(&mut push_rx), if push_rx.is_some() => {
                    self.on_signal(signal, &mut push_rx, handler.as_ref());
                }
            }
        }
        self.final_sweep(&mut notification_rx, &mut push_rx, handler.as_ref());
        log::info!(
            "Push listener stopped, last alert at {}",
            self.last_processed
        );
    }

    /// Deliver whatever was queued before shutdown: buffered signals in
    /// timestamp order, then the mailbox record.
    fn final_sweep(
        &mut self,
        notification_rx: &mut Option<broadcast::Receiver<AlertSignal>>,
        push_rx: &mut Option<broadcast::Receiver<AlertSignal>>,
        handler: &dyn AlertHandler,
    ) {
        let mut queued = Vec::new();
        for rx in [notification_rx, push_rx].into_iter().flatten() {
            loop {
                match rx.try_recv() {
                    Ok(signal) => queued.push(ConsumedAlert::from_signal(&signal)),
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        log::warn!("Skipped {} alert signals during shutdown", skipped);
                    }
                    Err(_) => break,
                }
            }
        }
        queued.sort_by_key(|alert| alert.timestamp);
        for alert in queued {
            if let Some(alert) = self.accept(alert) {
                handler.on_alert(&alert);
            }
        }

        match self.poll_once() {
            Ok(Some(alert)) => handler.on_alert(&alert),
            Ok(None) => {}
            Err(e) => log::error!("Listener error: {}", e),
        }
    }

    fn on_signal(
        &mut self,
        received: std::result::Result<AlertSignal, broadcast::error::RecvError>,
        rx: &mut Option<broadcast::Receiver<AlertSignal>>,
        handler: &dyn AlertHandler,
    ) {
        match received {
            Ok(signal) => {
                if let Some(alert) = self.accept(ConsumedAlert::from_signal(&signal)) {
                    log::info!("Received alert from {}", alert.origin);
                    handler.on_alert(&alert);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Skipped {} alert signals; mailbox still holds the latest", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                *rx = None;
            }
        }
    }
}

async fn recv_signal(
    rx: &mut Option<broadcast::Receiver<AlertSignal>>,
) -> std::result::Result<AlertSignal, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Handler that counts alerts and keeps a short most-recent-first log.
#[derive(Debug)]
pub struct AlertJournal {
    capacity: usize,
    state: Mutex<JournalState>,
}

#[derive(Debug, Default)]
struct JournalState {
    count: u64,
    entries: VecDeque<String>,
}

impl AlertJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(JournalState::default()),
        }
    }

    pub fn count(&self) -> u64 {
        self.state.lock().map(|s| s.count).unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn format_entry(alert: &ConsumedAlert) -> String {
        let time = Local
            .timestamp_millis_opt(alert.timestamp)
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        format!("[{}] {} / {}", time, alert.subject, alert.origin)
    }
}

impl AlertHandler for AlertJournal {
    fn on_alert(&self, alert: &ConsumedAlert) {
        log::warn!("[Alert] {}: {}", alert.subject, alert.origin);
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.count += 1;
        state.entries.push_front(Self::format_entry(alert));
        state.entries.truncate(self.capacity);
    }
}
