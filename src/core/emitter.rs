//! Best-effort alert signals.
//!
//! A signal is fire-and-forget: when nobody listens on the channel it is
//! dropped. The mailbox is the path that survives a missing consumer.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::core::error::{Error, Result};
use crate::core::model::{AlertDecision, EventChannel};

/// Capacity of each channel; slow receivers skip older signals.
const CHANNEL_CAPACITY: usize = 16;

/// Payload of a broadcast signal. Field names follow the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertSignal {
    /// `<namespace>.NOTIFICATION_ALERT`
    NotificationAlert {
        package: String,
        title: String,
        text: String,
        timestamp: i64,
    },
    /// `<namespace>.ALERT`
    Alert {
        subject: String,
        from: String,
        timestamp: i64,
    },
}

impl AlertSignal {
    pub fn from_decision(decision: &AlertDecision) -> Self {
        let timestamp = decision.detected_at.timestamp_millis();
        match decision.channel {
            EventChannel::Notification => Self::NotificationAlert {
                package: decision.origin.clone(),
                title: decision.subject.clone(),
                text: decision.text.clone(),
                timestamp,
            },
            EventChannel::Push => Self::Alert {
                subject: decision.subject.clone(),
                from: decision.origin.clone(),
                timestamp,
            },
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Self::NotificationAlert { title, .. } => title,
            Self::Alert { subject, .. } => subject,
        }
    }

    pub fn origin(&self) -> &str {
        match self {
            Self::NotificationAlert { package, .. } => package,
            Self::Alert { from, .. } => from,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::NotificationAlert { timestamp, .. } | Self::Alert { timestamp, .. } => *timestamp,
        }
    }
}

/// Well-known channel names under an app namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub notification: String,
    pub push: String,
}

impl ChannelNames {
    pub fn new(app_namespace: &str) -> Self {
        Self {
            notification: format!("{app_namespace}.NOTIFICATION_ALERT"),
            push: format!("{app_namespace}.ALERT"),
        }
    }

    pub fn for_channel(&self, channel: EventChannel) -> &str {
        match channel {
            EventChannel::Notification => &self.notification,
            EventChannel::Push => &self.push,
        }
    }
}

/// Sink for alert signals. Implementations must not block on listeners and
/// must not fail the caller.
pub trait SignalEmitter: Send + Sync {
    fn emit(&self, decision: &AlertDecision);
}

/// In-process broadcast bus keyed by channel name.
#[derive(Debug)]
pub struct SignalBus {
    names: ChannelNames,
    channels: RwLock<HashMap<String, broadcast::Sender<AlertSignal>>>,
}

impl SignalBus {
    pub fn new(app_namespace: &str) -> Self {
        Self {
            names: ChannelNames::new(app_namespace),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    /// Listen on a channel by name.
    pub fn subscribe(&self, channel_name: &str) -> Result<broadcast::Receiver<AlertSignal>> {
        let mut channels = self
            .channels
            .write()
            .map_err(|_| Error::Delivery("signal bus lock poisoned".to_string()))?;
        let sender = channels
            .entry(channel_name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }

    /// Send a signal; returns how many receivers got it.
    pub fn send(&self, channel_name: &str, signal: AlertSignal) -> Result<usize> {
        let channels = self
            .channels
            .read()
            .map_err(|_| Error::Delivery("signal bus lock poisoned".to_string()))?;
        let Some(sender) = channels.get(channel_name) else {
            return Ok(0);
        };
        // SendError only means there are no receivers right now
        Ok(sender.send(signal).unwrap_or(0))
    }
}

impl SignalEmitter for SignalBus {
    fn emit(&self, decision: &AlertDecision) {
        let channel_name = self.names.for_channel(decision.channel);
        match self.send(channel_name, AlertSignal::from_decision(decision)) {
            Ok(0) => log::debug!("No listener on {}, signal dropped", channel_name),
            Ok(n) => log::debug!("Alert signal sent on {} to {} listener(s)", channel_name, n),
            Err(e) => log::warn!("Failed to send alert signal on {}: {}", channel_name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const NS: &str = "com.emailmonitor.emailalert";

    fn decision(channel: EventChannel) -> AlertDecision {
        AlertDecision {
            is_alert: true,
            channel,
            subject: "Price Alert".to_string(),
            origin: "com.tradingview.app".to_string(),
            text: "BTC crossed target".to_string(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_channel_names() {
        let names = ChannelNames::new(NS);
        assert_eq!(names.notification, "com.emailmonitor.emailalert.NOTIFICATION_ALERT");
        assert_eq!(names.for_channel(EventChannel::Push), "com.emailmonitor.emailalert.ALERT");
    }

    #[test]
    fn test_signal_fields_follow_channel() {
        let notify = AlertSignal::from_decision(&decision(EventChannel::Notification));
        assert!(matches!(
            &notify,
            AlertSignal::NotificationAlert { package, text, .. }
                if package == "com.tradingview.app" && text == "BTC crossed target"
        ));

        let push = AlertSignal::from_decision(&decision(EventChannel::Push));
        assert_eq!(push.subject(), "Price Alert");
        assert_eq!(push.origin(), "com.tradingview.app");
        assert!(matches!(push, AlertSignal::Alert { .. }));
    }

    #[test]
    fn test_emit_without_listener_is_dropped() {
        let bus = SignalBus::new(NS);
        bus.emit(&decision(EventChannel::Notification));

        let signal = AlertSignal::from_decision(&decision(EventChannel::Notification));
        assert_eq!(bus.send(&bus.names().notification, signal).unwrap(), 0);
    }

    #[test]
    fn test_emit_reaches_subscriber() {
        let bus = SignalBus::new(NS);
        let mut rx = bus.subscribe(&bus.names().push).unwrap();
        let mut other = bus.subscribe(&bus.names().notification).unwrap();

        let decision = decision(EventChannel::Push);
        bus.emit(&decision);

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.timestamp(), decision.detected_at.timestamp_millis());
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_does_not_fail_emit() {
        let bus = SignalBus::new(NS);
        let rx = bus.subscribe(&bus.names().push).unwrap();
        drop(rx);

        bus.emit(&decision(EventChannel::Push));
        let signal = AlertSignal::from_decision(&decision(EventChannel::Push));
        assert_eq!(bus.send(&bus.names().push, signal).unwrap(), 0);
    }
}
