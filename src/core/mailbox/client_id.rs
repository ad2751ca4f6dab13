//! Latest push-client identifier handed out by the push service.

use std::sync::Arc;

use super::prefs::Preferences;
use crate::core::error::Result;

pub const CLIENT_NAMESPACE: &str = "getui";
pub const KEY_CLIENT_ID: &str = "client_id";

#[derive(Debug, Clone)]
pub struct ClientRegistry {
    prefs: Arc<Preferences>,
}

impl ClientRegistry {
    pub fn new(prefs: Arc<Preferences>) -> Self {
        Self { prefs }
    }

    /// Store the identifier, replacing any earlier one. Blank ids are ignored.
    pub fn save(&self, client_id: &str) -> Result<bool> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Ok(false);
        }
        self.prefs
            .edit()
            .clear()
            .put_string(KEY_CLIENT_ID, client_id)
            .commit()?;
        Ok(true)
    }

    pub fn get(&self) -> Result<Option<String>> {
        self.prefs.get_string(KEY_CLIENT_ID)
    }
}
