//! Core types and shared functionality for swproxy.
//!
//! This crate provides:
//! - Versioned cache partitions with a SQLite backend
//! - Unified error types
//! - Worker configuration with layered loading

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStorage, Partition, RequestKey, ResponseType, Snapshot};
pub use config::{ConfigError, WorkerConfig};
pub use error::Error;
