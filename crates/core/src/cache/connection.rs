//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! (WAL mode, foreign keys for partition cascades), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Partition store database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the same connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas, and runs any
    /// pending migrations. Failure is logged and reported as `CacheOpen`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let label = path.as_ref().display().to_string();
        let conn = match Connection::open(path).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(path = %label, error = %e, "failed to open cache store");
                return Err(Error::CacheOpen { partition: label, reason: e.to_string() });
            }
        };

        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    ///
    /// Same pragma configuration and schema as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::CacheOpen { partition: ":memory:".into(), reason: e.to_string() })?;

        Self::prepare(conn).await
    }

    /// Close the underlying connection.
    ///
    /// Every clone of this handle fails with `CACHE_ERROR` afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(Error::Database)
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
