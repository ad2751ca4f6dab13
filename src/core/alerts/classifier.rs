// Alert classifier - maps a normalized event to an alert decision.
//
// Pure: the verdict depends only on the event and the filter config.

use super::model::FilterConfig;
use super::triggers::{KeywordFilter, SourceFilter};
use crate::core::model::{AlertDecision, EventChannel, RawEvent};

pub struct AlertClassifier {
    sources: SourceFilter,
    keywords: KeywordFilter,
    trust_push_channel: bool,
}

impl AlertClassifier {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            sources: SourceFilter::new(config.producers()),
            keywords: KeywordFilter::new(config.keywords.values().flatten()),
            trust_push_channel: config.trust_push_channel,
        }
    }

    /// Classify one event.
    ///
    /// Notification events must come from a relevant producer and mention an
    /// alert keyword. Push events skip both filters when the push channel is
    /// trusted, since the alert server only pushes alerts.
    pub fn classify(&self, event: &RawEvent) -> AlertDecision {
        let is_alert = match event.channel {
            EventChannel::Push if self.trust_push_channel => true,
            _ => self.passes_filters(event),
        };

        AlertDecision {
            is_alert,
            channel: event.channel,
            subject: event.title.clone(),
            origin: event.source_id.clone(),
            text: event.body.clone(),
            detected_at: event.received_at,
        }
    }

    fn passes_filters(&self, event: &RawEvent) -> bool {
        let Some(producer) = self.sources.matches(&event.source_id) else {
            return false;
        };

        match self.keywords.matches(&event.title, &event.body) {
            Some(keyword) => {
                log::debug!(
                    "{} producer {} matched keyword '{}'",
                    producer.display_name(),
                    event.source_id,
                    keyword
                );
                true
            }
            None => false,
        }
    }
}
