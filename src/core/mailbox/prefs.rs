//! Namespaced key/value preferences.
//!
//! Each namespace is one JSON object on disk (`<namespace>.json`). An
//! [`Editor`] batches puts and commits them by writing a temp file
//! in the same directory and renaming it over the old one, so readers see
//! either the previous or the next record, never a mix.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::core::error::{Error, Result};

type Entries = BTreeMap<String, Value>;

/// One preferences namespace.
#[derive(Debug)]
pub struct Preferences {
    namespace: String,
    path: PathBuf,
    /// Serializes read-modify-write cycles of editors in this process
    write_lock: Mutex<()>,
}

impl Preferences {
    /// Open a namespace in `dir`. The file is created lazily on first commit.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self> {
        if namespace.is_empty() || namespace.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "invalid preferences namespace '{namespace}'"
            )));
        }
        fs::create_dir_all(dir)?;
        Ok(Self {
            namespace: namespace.to_string(),
            path: dir.join(format!("{namespace}.json")),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot of every entry in the namespace.
    pub fn all(&self) -> Result<Entries> {
        self.load()
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .remove(key)
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn edit(&self) -> Editor<'_> {
        Editor {
            prefs: self,
            puts: Vec::new(),
            clear: false,
        }
    }

    fn commit(&self, clear: bool, puts: Vec<(String, Value)>) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Delivery(format!("preferences '{}' lock poisoned", self.namespace)))?;

        let mut entries = if clear {
            Entries::new()
        } else {
            match self.load() {
                Ok(entries) => entries,
                Err(Error::Json(e)) => {
                    log::warn!(
                        "Replacing unreadable preferences {}: {}",
                        self.path.display(),
                        e
                    );
                    Entries::new()
                }
                Err(e) => return Err(e),
            }
        };
        entries.extend(puts);

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(&entries)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

/// Batched changes to one namespace, applied together by [`Editor::commit`].
#[must_use = "changes are only written by commit()"]
pub struct Editor<'a> {
    prefs: &'a Preferences,
    puts: Vec<(String, Value)>,
    clear: bool,
}

impl Editor<'_> {
    pub fn put_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.puts
            .push((key.to_string(), Value::String(value.into())));
        self
    }

    pub fn put_i64(mut self, key: &str, value: i64) -> Self {
        self.puts.push((key.to_string(), Value::from(value)));
        self
    }

    /// Drop every existing entry before applying the queued puts.
    pub fn clear(mut self) -> Self {
        self.clear = true;
        self
    }

    pub fn commit(self) -> Result<()> {
        self.prefs.commit(self.clear, self.puts)
    }
}
