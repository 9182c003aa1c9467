use std::rc::Rc;

use log::warn;
use serde_json::{Map, Value};

use crate::app::domain::{HostIdentity, SiteSetting};
use crate::app::infrastructure::error::Result;
use crate::app::infrastructure::storage::Storage;

/// Storage key of the per-host settings record.
pub const SITE_SETTINGS_KEY: &str = "siteSettings";

/// Per-host settings, `siteSettings[hostname]`, in the shared store.
#[derive(Debug)]
pub struct SiteSettingsStore<S> {
    storage: Rc<S>,
}

impl<S: Storage> SiteSettingsStore<S> {
    pub fn new(storage: Rc<S>) -> Self {
        Self { storage }
    }

    async fn read_record(&self) -> Map<String, Value> {
        match self.storage.get(SITE_SETTINGS_KEY).await {
            Ok(value) => into_record(value),
            Err(e) => {
                warn!("Could not read site settings: {}", e);
                Map::new()
            }
        }
    }

    /// Setting for `host`; absent when none was saved or it cannot be read.
    pub async fn get(&self, host: &HostIdentity) -> Option<SiteSetting> {
        let value = self.read_record().await.remove(host.as_str())?;
        match serde_json::from_value(value) {
            Ok(setting) => Some(setting),
            Err(e) => {
                warn!("Ignoring unreadable settings for {}: {}", host, e);
                None
            }
        }
    }

    /// Creates or overwrites the setting for `host`. Other hosts' entries are kept as stored.
    pub async fn save(&self, host: &HostIdentity, setting: &SiteSetting) -> Result<()> {
        let entry = serde_json::to_value(setting)?;
        let host = host.as_str().to_string();
        self.storage
            .update(SITE_SETTINGS_KEY, move |current| {
                let mut record = into_record(current);
                record.insert(host, entry);
                Ok(Value::Object(record))
            })
            .await
    }

    /// Hosts with a saved setting, in storage order.
    pub async fn hosts(&self) -> Vec<String> {
        self.read_record().await.keys().cloned().collect()
    }
}

fn into_record(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(record)) => record,
        Some(_) => {
            warn!("Ignoring malformed {} record", SITE_SETTINGS_KEY);
            Map::new()
        }
        None => Map::new(),
    }
}
