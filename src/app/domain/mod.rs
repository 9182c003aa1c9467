//! Domain layer - core data structures and types.
//!
//! This module contains the fundamental domain models:
//! - Font descriptors as they appear in the catalog and in update events
//! - Per-host site settings, themes and host identity
//! - Message types received from the settings controller
//! - Engine configuration

pub mod config;
pub mod font;
pub mod messages;
pub mod settings;

pub use config::EngineConfig;
pub use font::{FontDescriptor, FontType};
pub use messages::Message;
pub use settings::{HostIdentity, SiteSetting, Theme};
