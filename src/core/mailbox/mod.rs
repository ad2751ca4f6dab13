//! Durable state shared between the producing and consuming runtimes.
//!
//! [`StateStore`] owns both namespaces: the pending-alert mailbox and the
//! stored push-client identifier. Open it once at startup and close it at
//! shutdown.

pub mod client_id;
pub mod prefs;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use client_id::{ClientRegistry, CLIENT_NAMESPACE};
use prefs::Preferences;
use store::{Mailbox, MAILBOX_NAMESPACE};

use crate::core::error::Result;

#[derive(Debug)]
pub struct StateStore {
    data_dir: PathBuf,
    mailbox: Mailbox,
    clients: ClientRegistry,
}

impl StateStore {
    /// Open (creating if needed) the store under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let mailbox = Mailbox::new(Arc::new(Preferences::open(&data_dir, MAILBOX_NAMESPACE)?));
        let clients = ClientRegistry::new(Arc::new(Preferences::open(&data_dir, CLIENT_NAMESPACE)?));
        log::info!("State store opened at {}", data_dir.display());
        Ok(Self {
            data_dir,
            mailbox,
            clients,
        })
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Release the store. Commits are already durable, so this only ends the lifecycle.
    pub fn close(self) {
        log::info!("State store at {} closed", self.data_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::PendingAlert;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_dir_and_namespaces_are_separate() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("state");
        let store = StateStore::open(&data_dir).unwrap();
        assert!(data_dir.is_dir());

        store.clients().save("cid").unwrap();
        assert_eq!(store.mailbox().read().unwrap(), None);

        let alert = PendingAlert {
            subject: "s".to_string(),
            origin: "o".to_string(),
            timestamp: 1,
        };
        store.mailbox().write(&alert).unwrap();
        store.close();

        let reopened = StateStore::open(&data_dir).unwrap();
        assert_eq!(reopened.mailbox().read().unwrap(), Some(alert));
        assert_eq!(reopened.clients().get().unwrap().as_deref(), Some("cid"));
    }
}
