use serde::{Deserialize, Serialize};

use super::font::FontDescriptor;
use super::settings::{null_as_default, Theme};
use crate::app::infrastructure::error::Result;

/// Messages sent from the settings controller to a page engine.
/// Tagged by the `action` field, as they travel over the extension transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Message {
    #[serde(rename = "updateFont")]
    UpdateFont {
        #[serde(default)]
        font: Option<FontDescriptor>,
        #[serde(default)]
        enabled: bool,
        #[serde(default, deserialize_with = "null_as_default")]
        theme: Theme,
    },
}

impl Message {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
