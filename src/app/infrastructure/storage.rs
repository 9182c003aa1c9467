//! Key-value storage shared by every page engine in the process.
//!
//! Values are JSON documents addressed by a top-level key (`fontCache`,
//! `siteSettings`). Both implementations enforce a byte quota on the
//! serialized store, so a write that would exceed it fails and leaves the
//! previous contents in place.

use std::cell::RefCell;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::error::{AppError, Result};

// The engine runs on a single thread; returned futures need not be Send.
#[allow(async_fn_in_trait)]
pub trait Storage {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replaces the value under `key` with `f(current)`.
    ///
    /// The read and the write happen as one step: no other write to the
    /// store can land between them.
    async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<Value>) -> Result<Value>;

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.update(key, |_| Ok(value)).await
    }
}

fn check_quota(entries: &Map<String, Value>, quota: Option<usize>) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(entries)?;
    match quota {
        Some(quota) if bytes.len() > quota => Err(AppError::QuotaExceeded {
            needed: bytes.len(),
            quota,
        }),
        _ => Ok(bytes),
    }
}

/// In-process store. Contents are lost with the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<Map<String, Value>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RefCell::new(Map::new()),
            quota: Some(quota),
        }
    }

    /// Current value under `key`, without going through the async interface.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.peek(key))
    }

    async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<Value>) -> Result<Value>,
    {
        let mut updated = self.entries.borrow().clone();
        let value = f(updated.get(key).cloned())?;
        updated.insert(key.to_string(), value);
        check_quota(&updated, self.quota)?;
        *self.entries.borrow_mut() = updated;
        Ok(())
    }
}

/// Store persisted as one JSON object in a file.
///
/// Every access holds `lock`, so overlapping writes to different keys of the
/// same file are applied one after the other instead of overwriting each other.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    quota: usize,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>, quota: usize) -> Self {
        Self {
            path: path.into(),
            quota,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No storage file at {}", self.path.display());
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents)? {
            Value::Object(entries) => Ok(entries),
            _ => Err(AppError::Storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl Storage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        Ok(entries.remove(key))
    }

    async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<Value>) -> Result<Value>,
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        let value = f(entries.get(key).cloned())?;
        entries.insert(key.to_string(), value);
        let bytes = check_quota(&entries, Some(self.quota))?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
