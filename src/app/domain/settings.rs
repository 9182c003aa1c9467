use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::font::{FontDescriptor, FontType};

/// Host key used when a page's host cannot be determined.
/// Every such page shares the settings stored under it.
pub const UNKNOWN_HOST: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    None,
    Dark,
    Sepia,
    Gray,
}

impl Theme {
    /// Every class a theme can put on the root element.
    pub const CLASSES: [&'static str; 3] = ["ext-theme-dark", "ext-theme-sepia", "ext-theme-gray"];

    /// Root element class for this theme, `None` for [`Theme::None`].
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Dark => Some(Self::CLASSES[0]),
            Self::Sepia => Some(Self::CLASSES[1]),
            Self::Gray => Some(Self::CLASSES[2]),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dark => "dark",
            Self::Sepia => "sepia",
            Self::Gray => "gray",
        }
    }

    pub fn all() -> &'static [Theme] {
        &[Self::None, Self::Dark, Self::Sepia, Self::Gray]
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown theme '{}'", s))
    }
}

/// Treats an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Persisted per-host record, `siteSettings[hostname]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSetting {
    #[serde(default)]
    pub enabled: bool,

    /// Catalog key of the chosen font. Older records stored the font name here.
    #[serde(default, deserialize_with = "null_as_default")]
    pub selected_font: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub font_type: FontType,

    /// Inline copy of the descriptor at the time the setting was saved.
    #[serde(default)]
    pub font_data: Option<FontDescriptor>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub theme: Theme,
}

impl SiteSetting {
    pub fn new(
        enabled: bool,
        selected_font: impl Into<String>,
        font_data: Option<FontDescriptor>,
        theme: Theme,
    ) -> Self {
        let font_type = font_data
            .as_ref()
            .map(FontDescriptor::kind)
            .unwrap_or_default();
        Self {
            enabled,
            selected_font: selected_font.into(),
            font_type,
            font_data,
            theme,
        }
    }
}

impl Default for SiteSetting {
    fn default() -> Self {
        Self::new(false, "", None, Theme::None)
    }
}

/// The key a page's settings are stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostIdentity(String);

impl HostIdentity {
    /// Host of `page_url`, or [`UNKNOWN_HOST`] when the URL has none.
    pub fn from_page_url(page_url: &str) -> Self {
        let host = Url::parse(page_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .filter(|host| !host.is_empty());

        match host {
            Some(host) => Self(host),
            None => {
                debug!("No host in '{}', using '{}'", page_url, UNKNOWN_HOST);
                Self::unknown()
            }
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_HOST.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_HOST
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
