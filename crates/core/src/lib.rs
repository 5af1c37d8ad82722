//! Core types and shared functionality for offshore.
//!
//! This crate provides:
//! - Generation-namespaced cache store with SQLite backend
//! - Unified error types
//! - Configuration structures
//! - Byte-size formatting for the cache size report

pub mod config;
pub mod error;
pub mod format;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use format::format_bytes;
pub use store::{CacheKey, CacheStore, CacheUsage, CachedResponse, Generation, SqliteStore};
