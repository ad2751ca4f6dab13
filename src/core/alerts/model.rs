// Alert filter configuration.
//
// Persisted inside settings.json under `filters`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::{Error, Result};

/// Group a relevant producer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProducerKind {
    /// Trading platform price/indicator alerts
    Trading,
    /// Email clients relaying alert mails
    Email,
}

impl ProducerKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Trading => "Trading",
            Self::Email => "Email",
        }
    }
}

/// Producer allow-lists, multilingual keyword set and push defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Substrings identifying trading-alert apps (case-sensitive)
    #[serde(default = "default_trading_sources")]
    pub trading_sources: Vec<String>,
    /// Substrings identifying email clients (case-sensitive)
    #[serde(default = "default_email_sources")]
    pub email_sources: Vec<String>,
    /// Alert keywords per language tag
    #[serde(default = "default_keywords")]
    pub keywords: BTreeMap<String, Vec<String>>,
    /// Subject used when a push payload carries none
    #[serde(default = "default_subject")]
    pub default_subject: String,
    /// Sender used when a push payload carries none
    #[serde(default = "default_from")]
    pub default_from: String,
    /// Push payloads come pre-filtered from the alert server
    #[serde(default = "default_trust_push")]
    pub trust_push_channel: bool,
}

fn default_trading_sources() -> Vec<String> {
    vec!["tradingview".to_string()]
}

fn default_email_sources() -> Vec<String> {
    ["email", "gmail", "com.google.android.gm", "qq.reader"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_keywords() -> BTreeMap<String, Vec<String>> {
    let mut keywords = BTreeMap::new();
    keywords.insert("en".to_string(), vec!["alert".to_string()]);
    keywords.insert(
        "zh-Hans".to_string(),
        vec!["警报".to_string(), "提醒".to_string()],
    );
    keywords.insert("zh-Hant".to_string(), vec!["警報".to_string()]);
    keywords
}

fn default_subject() -> String {
    "Email Alert".to_string()
}

fn default_from() -> String {
    "Unknown".to_string()
}

fn default_trust_push() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            trading_sources: default_trading_sources(),
            email_sources: default_email_sources(),
            keywords: default_keywords(),
            default_subject: default_subject(),
            default_from: default_from(),
            trust_push_channel: default_trust_push(),
        }
    }
}

impl FilterConfig {
    /// All producer patterns tagged with their group.
    pub fn producers(&self) -> impl Iterator<Item = (ProducerKind, &str)> {
        self.trading_sources
            .iter()
            .map(|s| (ProducerKind::Trading, s.as_str()))
            .chain(
                self.email_sources
                    .iter()
                    .map(|s| (ProducerKind::Email, s.as_str())),
            )
    }

    /// Every language must carry at least one usable keyword, and at least one producer must exist.
    pub fn validate(&self) -> Result<()> {
        if self.producers().all(|(_, pattern)| pattern.is_empty()) {
            return Err(Error::Config("producer allow-list is empty".to_string()));
        }
        if self.keywords.is_empty() {
            return Err(Error::Config("keyword set is empty".to_string()));
        }
        for (language, words) in &self.keywords {
            if words.iter().all(|w| w.trim().is_empty()) {
                return Err(Error::Config(format!(
                    "language '{language}' has no alert keywords"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_script() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.keywords.len(), 3);
        assert_eq!(config.default_subject, "Email Alert");
        assert_eq!(config.default_from, "Unknown");
    }

    #[test]
    fn test_producers_are_tagged() {
        let config = FilterConfig::default();
        let producers: Vec<_> = config.producers().collect();
        assert_eq!(producers[0], (ProducerKind::Trading, "tradingview"));
        assert!(producers.contains(&(ProducerKind::Email, "gmail")));
        assert_eq!(producers.len(), 5);
    }

    #[test]
    fn test_validate_rejects_blank_language() {
        let mut config = FilterConfig::default();
        config.keywords.insert("ja".to_string(), vec!["  ".to_string()]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_missing_producers() {
        let config = FilterConfig {
            trading_sources: Vec::new(),
            email_sources: Vec::new(),
            ..FilterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"trading_sources": ["binance"]}"#).unwrap();
        assert_eq!(config.trading_sources, vec!["binance".to_string()]);
        assert_eq!(config.email_sources.len(), 4);
        assert!(config.trust_push_channel);
    }
}
