//! Shared doubles for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::LocalSet;

use crate::app::infrastructure::error::{AppError, Result};
use crate::app::infrastructure::fetcher::{FetchedResource, ResourceFetcher};
use crate::app::infrastructure::storage::{MemoryStorage, Storage};

pub const ROBOTO_IMPORT: &str = "@import url('https://fonts.example/roboto.css');";
pub const ROBOTO_SHEET_URL: &str = "https://fonts.example/roboto.css";

/// Two faces, the second one referencing the same file twice.
pub const ROBOTO_SHEET: &str = "@font-face {\n  font-family: 'Roboto';\n  src: url(https://fonts.example/files/roboto-regular.woff2) format('woff2');\n}\n@font-face {\n  font-family: 'Roboto';\n  font-weight: 700;\n  src: url('https://fonts.example/files/roboto-bold.woff2') format('woff2'), url(\"https://fonts.example/files/roboto-bold.woff2\") format('woff2');\n}\n";

/// Runs `future` on a current-thread runtime inside a `LocalSet`, as the engine expects.
pub fn block_on_local<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build test runtime");
    LocalSet::new().block_on(&runtime, future)
}

/// Serves canned responses and records every requested URL.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: RefCell<HashMap<String, FetchedResource>>,
    requests: RefCell<Vec<String>>,
    offline: Cell<bool>,
    stalled: Cell<bool>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, body: &[u8], content_type: Option<&str>) -> Self {
        self.responses.borrow_mut().insert(
            url.to_string(),
            FetchedResource::new(body.to_vec(), content_type.map(str::to_string)),
        );
        self
    }

    /// The Roboto stylesheet and both of its font files.
    pub fn roboto() -> Self {
        Self::new()
            .with(ROBOTO_SHEET_URL, ROBOTO_SHEET.as_bytes(), Some("text/css; charset=utf-8"))
            .with(
                "https://fonts.example/files/roboto-regular.woff2",
                b"regular-bytes",
                Some("font/woff2"),
            )
            .with(
                "https://fonts.example/files/roboto-bold.woff2",
                b"bold-bytes",
                Some("font/woff2"),
            )
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Makes every later fetch hang forever.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.set(stalled);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        self.requests.borrow_mut().push(url.to_string());
        if self.stalled.get() {
            std::future::pending::<()>().await;
        }
        if self.offline.get() {
            return Err(AppError::Network(format!("offline: {}", url)));
        }
        self.responses
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Network(format!("{} returned status 404", url)))
    }
}

/// In-memory storage whose first read waits until the gate's sender fires or is dropped.
#[derive(Debug)]
pub struct GatedStorage {
    inner: MemoryStorage,
    gate: RefCell<Option<oneshot::Receiver<()>>>,
}

impl GatedStorage {
    pub fn new(gate: oneshot::Receiver<()>) -> Self {
        Self {
            inner: MemoryStorage::new(),
            gate: RefCell::new(Some(gate)),
        }
    }
}

impl Storage for GatedStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.get(key).await
    }

    async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<Value>) -> Result<Value>,
    {
        self.inner.update(key, f).await
    }
}
