use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::app::infrastructure::error::Result;
use crate::app::infrastructure::storage::Storage;

/// Storage key of the persisted cache record.
pub const FONT_CACHE_KEY: &str = "fontCache";

pub const DEFAULT_CAPACITY: usize = 5;

/// Bounded cache of self-contained font CSS, keyed by font name.
///
/// Entries are kept in insertion order and the oldest insertion is evicted
/// first. Overwriting a name counts as a fresh insertion; reads never reorder.
/// The record is loaded from storage on first use and written back whole on
/// every [`put`](Self::put). A failed write is reported but the entry stays
/// available through this instance.
#[derive(Debug)]
pub struct FontCache<S> {
    storage: Rc<S>,
    capacity: usize,
    entries: RefCell<Option<IndexMap<String, String>>>,
}

impl<S: Storage> FontCache<S> {
    pub fn new(storage: Rc<S>) -> Self {
        Self::with_capacity(storage, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(storage: Rc<S>, capacity: usize) -> Self {
        Self {
            storage,
            capacity: capacity.max(1),
            entries: RefCell::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn ensure_loaded(&self) {
        if self.entries.borrow().is_some() {
            return;
        }

        let mut loaded = match self.storage.get(FONT_CACHE_KEY).await {
            Ok(Some(value)) => serde_json::from_value::<IndexMap<String, String>>(value)
                .unwrap_or_else(|e| {
                    warn!("Discarding unreadable font cache: {}", e);
                    IndexMap::new()
                }),
            Ok(None) => IndexMap::new(),
            Err(e) => {
                warn!("Could not read font cache: {}", e);
                IndexMap::new()
            }
        };

        // Another task may have finished loading while this one was suspended.
        let mut entries = self.entries.borrow_mut();
        if entries.is_none() {
            while loaded.len() > self.capacity {
                loaded.shift_remove_index(0);
            }
            *entries = Some(loaded);
        }
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.ensure_loaded().await;
        self.entries
            .borrow()
            .as_ref()
            .and_then(|entries| entries.get(name).cloned())
    }

    /// Inserts `css` under `name` and persists the cache.
    ///
    /// Returns the evicted font name, if the insertion pushed one out.
    pub async fn put(&self, name: &str, css: String) -> Result<Option<String>> {
        self.ensure_loaded().await;

        let (snapshot, evicted) = {
            let mut guard = self.entries.borrow_mut();
            let entries = guard.get_or_insert_with(IndexMap::new);
            entries.shift_remove(name);
            entries.insert(name.to_string(), css);
            let evicted = if entries.len() > self.capacity {
                entries.shift_remove_index(0).map(|(evicted, _)| evicted)
            } else {
                None
            };
            (serde_json::to_value(&*entries)?, evicted)
        };

        if let Some(evicted) = &evicted {
            debug!("Evicted {} from font cache", evicted);
        }
        self.storage.set(FONT_CACHE_KEY, snapshot).await?;
        Ok(evicted)
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    pub async fn len(&self) -> usize {
        self.ensure_loaded().await;
        self.entries.borrow().as_ref().map_or(0, IndexMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cached font names, oldest insertion first.
    pub async fn names(&self) -> Vec<String> {
        self.ensure_loaded().await;
        self.entries
            .borrow()
            .as_ref()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}
