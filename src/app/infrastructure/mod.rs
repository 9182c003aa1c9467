//! Infrastructure layer - external integrations and utilities.
//!
//! This module contains code that interfaces with external systems:
//! - Key-value storage (file-backed and in-memory)
//! - Network resource fetching
//! - The document model styles are injected into
//! - Error types

pub mod dom;
pub mod error;
pub mod fetcher;
pub mod storage;
