//! Controllers layer - per-document orchestration.
//!
//! This module contains the objects owned by each page's engine instance:
//! - Style node injection
//! - Theme stylesheet and root class management
//! - The engine that dispatches update events and startup state

pub mod engine;
pub mod style_injector;
pub mod theme_injector;
