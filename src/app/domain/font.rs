use serde::{Deserialize, Serialize};

/// Where a font's glyphs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontType {
    /// Served by a remote web-font stylesheet; eligible for inlining and caching.
    #[default]
    Google,
    /// Installed locally; only the override rule is emitted.
    System,
}

impl FontType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::System => "System",
        }
    }
}

/// Font identity and source metadata.
///
/// `url`, when present, holds a complete CSS `@import` statement such as
/// `@import url('https://fonts.googleapis.com/css2?family=Inter');`, not a bare URL.
/// Fields are private: a descriptor does not change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontDescriptor {
    name: String,
    #[serde(rename = "type", default)]
    kind: FontType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl FontDescriptor {
    pub fn new(name: impl Into<String>, kind: FontType, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url,
        }
    }

    /// A web font loaded through the given `@import` statement.
    pub fn google(name: impl Into<String>, import: impl Into<String>) -> Self {
        Self::new(name, FontType::Google, Some(import.into()))
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self::new(name, FontType::System, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FontType {
        self.kind
    }

    /// The `@import` statement, if any. The catalog stores `""` for fonts
    /// without one, which counts as absent.
    pub fn import_rule(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
    }
}
