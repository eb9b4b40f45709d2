use crate::error::StoreError;
use crate::results::Dataset;
use crate::Action;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Flat key-value persistence, the counterpart of extension local storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removes a key; returns whether it existed
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;

    fn keys(&self) -> Vec<String>;
}

/// Store kept in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Store backed by a single JSON object file, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStore {
    /// Opens the store, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        ::log::debug!("Opened store {} with {} keys", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, format!("{json}\n")).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// UI state of the control surface for a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralState {
    pub button_state: String,
}

impl GeneralState {
    pub fn rendered() -> Self {
        Self {
            button_state: "setSuccess".to_string(),
        }
    }
}

/// Everything persisted for one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAudit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_state: Option<GeneralState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Dataset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

/// Store key for a page: origin plus path, without a trailing slash
pub fn storage_namespace(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');
    format!("{}{}", url.origin().ascii_serialization(), path)
}

/// Removes the namespace of one page; returns whether anything was stored
pub fn clear_page<S: KeyValueStore + ?Sized>(store: &mut S, url: &Url) -> Result<bool, StoreError> {
    let namespace = storage_namespace(url);
    let removed = store.remove(&namespace)?;
    ::log::info!("Cleared cached audit data for {} ({})", namespace, removed);
    Ok(removed)
}

/// Removes every namespace of the page's origin; returns how many were removed
pub fn clear_site<S: KeyValueStore + ?Sized>(store: &mut S, url: &Url) -> Result<usize, StoreError> {
    let origin = url.origin().ascii_serialization();
    let mut removed = 0;

    for key in store.keys() {
        let in_origin = key
            .strip_prefix(&origin)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if in_origin && store.remove(&key)? {
            removed += 1;
        }
    }

    ::log::info!("Cleared {} cached audits for {}", removed, origin);
    Ok(removed)
}
