//! Services layer - business operations.
//!
//! This module contains the font pipeline and the settings data it reads:
//! - Bounded persistent cache of self-contained font CSS
//! - Remote font inlining
//! - Override CSS construction and the glyph-font exclusion list
//! - Font catalog and per-host settings

pub mod catalog;
pub mod css_builder;
pub mod exclusions;
pub mod font_cache;
pub mod inliner;
pub mod site_settings;
