use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::alerts::model::FilterConfig;
use super::error::{Error, Result};

/// Application settings, persisted as settings.json.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the mailbox and client-id namespaces
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Prefix of the well-known signal channel names
    #[serde(default = "default_app_namespace")]
    pub app_namespace: String,
    /// Alert filter configuration
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Base URL of the alert server; the event feed is off when unset
    #[serde(default)]
    pub feed_url: Option<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("email-alert-data")
}

fn default_app_namespace() -> String {
    "com.emailmonitor.emailalert".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_error_backoff_ms() -> u64 {
    5000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            app_namespace: default_app_namespace(),
            filters: FilterConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            feed_url: None,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_namespace.trim().is_empty() {
            return Err(Error::Config("app_namespace is empty".to_string()));
        }
        self.filters.validate()
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load settings, falling back to defaults when the file is missing or unreadable.
    pub fn load(&self) -> Settings {
        if !self.config_path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(&self.config_path)
            .map_err(Error::from)
            .and_then(|content| serde_json::from_str::<Settings>(&content).map_err(Error::from))
        {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable settings {}: {}",
                    self.config_path.display(),
                    e
                );
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let default = manager.load();
        assert_eq!(default.poll_interval_ms, 1000);
        assert_eq!(default.app_namespace, "com.emailmonitor.emailalert");

        let new_settings = Settings {
            data_dir: PathBuf::from("/tmp/alerts"),
            poll_interval_ms: 250,
            feed_url: Some("http://10.0.0.170:8080".to_string()),
            ..Settings::default()
        };

        manager.save(&new_settings).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded, new_settings);
        assert_eq!(loaded.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        fs::write(manager.path(), "{ not json").unwrap();

        assert_eq!(manager.load(), Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        fs::write(
            manager.path(),
            r#"{"app_namespace":"org.example.alerts","filters":{"keywords":{"ja":["警告"]}}}"#,
        )
        .unwrap();

        let loaded = manager.load();
        assert_eq!(loaded.app_namespace, "org.example.alerts");
        assert_eq!(loaded.filters.keywords.len(), 1);
        assert_eq!(loaded.filters.trading_sources, vec!["tradingview".to_string()]);
        assert_eq!(loaded.error_backoff(), Duration::from_secs(5));
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_namespace() {
        let settings = Settings {
            app_namespace: " ".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
