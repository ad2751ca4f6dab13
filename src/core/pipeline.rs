use std::sync::Arc;

use chrono::Utc;

use super::alerts::classifier::AlertClassifier;
use super::alerts::model::FilterConfig;
use super::emitter::SignalEmitter;
use super::mailbox::client_id::ClientRegistry;
use super::mailbox::store::Mailbox;
use super::mailbox::StateStore;
use super::model::{AlertDecision, RawEvent};
use super::scheduler::Scheduler;
use super::sources::{notification, push};
use notification::PostedNotification;

/// Durable write plus best-effort signal for one positive decision.
struct Handoff {
    mailbox: Mailbox,
    emitter: Arc<dyn SignalEmitter>,
}

impl Handoff {
    fn deliver(&self, decision: &AlertDecision) {
        let pending = decision.to_pending();
        match self.mailbox.write(&pending) {
            Ok(()) => log::debug!("Pending alert saved: {}", pending.subject),
            Err(e) => log::error!("Failed to save pending alert '{}': {}", pending.subject, e),
        }
        self.emitter.emit(decision);
    }
}

/// Entry point for host callbacks from both event channels.
///
/// Every callback is processed to completion or dropped; nothing here
/// returns an error to the host.
pub struct AlertPipeline {
    classifier: AlertClassifier,
    default_subject: String,
    default_from: String,
    handoff: Arc<Handoff>,
    clients: ClientRegistry,
    scheduler: Arc<dyn Scheduler>,
}

impl AlertPipeline {
    pub fn new(
        filters: &FilterConfig,
        store: &StateStore,
        emitter: Arc<dyn SignalEmitter>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            classifier: AlertClassifier::new(filters),
            default_subject: filters.default_subject.clone(),
            default_from: filters.default_from.clone(),
            handoff: Arc::new(Handoff {
                mailbox: store.mailbox().clone(),
                emitter,
            }),
            clients: store.clients().clone(),
            scheduler,
        }
    }

    /// Notification-posted callback. Returns the decision when it was an alert.
    pub fn on_notification_posted(&self, posted: &PostedNotification) -> Option<AlertDecision> {
        let Some(event) = notification::normalize(posted, Utc::now()) else {
            log::warn!("Dropping notification without package name");
            return None;
        };
        self.process(&event)
    }

    /// Push transmit-message callback. Malformed payloads are logged and dropped.
    pub fn on_push_message(&self, payload: &[u8]) -> Option<AlertDecision> {
        match push::normalize(payload, &self.default_subject, &self.default_from, Utc::now()) {
            Ok(event) => self.process(&event),
            Err(e) => {
                log::warn!("Dropping push message: {}", e);
                None
            }
        }
    }

    /// Push-service client registration callback.
    pub fn on_client_id(&self, client_id: &str) {
        log::info!("Client ID: {}", client_id);
        match self.clients.save(client_id) {
            Ok(true) => {}
            Ok(false) => log::warn!("Ignoring blank client ID"),
            Err(e) => log::error!("Failed to store client ID: {}", e),
        }
    }

    /// Classify a normalized event and hand positive decisions to the scheduler.
    pub fn process(&self, event: &RawEvent) -> Option<AlertDecision> {
        let decision = self.classifier.classify(event);
        if !decision.is_alert {
            return None;
        }

        log::info!(
            "Alert detected from {}: {}",
            decision.origin,
            decision.subject
        );
        let handoff = Arc::clone(&self.handoff);
        let scheduled = decision.clone();
        self.scheduler
            .schedule(Box::new(move || handoff.deliver(&scheduled)));
        Some(decision)
    }

    pub fn client_id(&self) -> Option<String> {
        self.clients.get().unwrap_or_else(|e| {
            log::warn!("Failed to read client ID: {}", e);
            None
        })
    }
}
