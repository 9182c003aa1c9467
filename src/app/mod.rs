//! Application layer - organized by Clean Architecture principles.
//!
//! # Structure
//!
//! - `domain/` - Core data structures (FontDescriptor, SiteSetting, Message, EngineConfig)
//! - `controllers/` - Per-document orchestration (PageEngine, style and theme injection)
//! - `services/` - Business operations (font cache, inliner, CSS builder, catalog, site settings)
//! - `infrastructure/` - External integrations (storage, fetcher, document model, error)

pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient external access
pub use controllers::engine::PageEngine;
pub use controllers::style_injector::StyleInjector;
pub use controllers::theme_injector::ThemeInjector;
pub use domain::{EngineConfig, FontDescriptor, FontType, HostIdentity, Message, SiteSetting, Theme};
pub use infrastructure::dom::{Document, NodeId};
pub use infrastructure::error::{AppError, Result};
pub use infrastructure::fetcher::{FetchedResource, HttpFetcher, ResourceFetcher};
pub use infrastructure::storage::{JsonFileStorage, MemoryStorage, Storage};
pub use services::catalog::FontCatalog;
pub use services::css_builder::{FontCss, FontCssBuilder};
pub use services::font_cache::FontCache;
pub use services::inliner::FontInliner;
pub use services::site_settings::SiteSettingsStore;
