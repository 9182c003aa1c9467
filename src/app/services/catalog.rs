use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::warn;

use crate::app::domain::{FontDescriptor, FontType};
use crate::app::infrastructure::error::Result;

/// The static font catalog (`fonts.json`): catalog key to descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontCatalog {
    fonts: IndexMap<String, FontDescriptor>,
}

impl FontCatalog {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self {
            fonts: serde_json::from_str(text)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Loads `path`, or the built-in fallback when unset or unreadable.
    pub fn load_or_fallback(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::fallback();
        };
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Failed to load fonts from {}: {}", path.display(), e);
                Self::fallback()
            }
        }
    }

    /// Minimal catalog used when `fonts.json` is unavailable.
    pub fn fallback() -> Self {
        let mut fonts = IndexMap::new();
        fonts.insert(
            "inter".to_string(),
            FontDescriptor::new("Inter", FontType::Google, Some(String::new())),
        );
        fonts.insert(
            "arial".to_string(),
            FontDescriptor::new("Arial", FontType::System, Some(String::new())),
        );
        Self { fonts }
    }

    pub fn get(&self, key: &str) -> Option<&FontDescriptor> {
        self.fonts.get(key)
    }

    /// Looks `selected` up as a key, then as a font name, which is what
    /// older settings records stored.
    pub fn resolve(&self, selected: &str) -> Option<&FontDescriptor> {
        if selected.is_empty() {
            return None;
        }
        self.get(selected).or_else(|| {
            self.key_for_name(selected)
                .and_then(|key| self.fonts.get(key))
        })
    }

    pub fn key_for_name(&self, name: &str) -> Option<&str> {
        self.fonts
            .iter()
            .find(|(_, font)| font.name() == name)
            .map(|(key, _)| key.as_str())
    }

    /// Fonts whose name contains `query` (case-insensitive), sorted by name.
    pub fn search(&self, query: &str) -> Vec<(&str, &FontDescriptor)> {
        let query = query.to_lowercase();
        let mut matches: Vec<(&str, &FontDescriptor)> = self
            .fonts
            .iter()
            .filter(|(_, font)| font.name().to_lowercase().contains(&query))
            .map(|(key, font)| (key.as_str(), font))
            .collect();
        matches.sort_by_key(|(_, font)| font.name().to_lowercase());
        matches
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
