//! SQLite-backed store of versioned cache partitions.
//!
//! Mirrors the shape of a browser's cache storage:
//!
//! - `CacheStorage` holds named partitions (open, has, keys, delete)
//! - `Partition` maps a request key to a response snapshot
//! - Keys are content-addressed with SHA-256 over method and URL
//! - Automatic schema migrations, WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{Partition, RequestKey, ResponseType, Snapshot};
pub use partitions::CacheStorage;
