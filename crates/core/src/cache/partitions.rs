//! Named partition management.
//!
//! Provides create-or-open, listing, and deletion of whole partitions.
//! Deleting a partition cascades to all of its entries.

use super::connection::CacheDb;
use super::entries::Partition;
use crate::Error;
use tokio_rusqlite::params;

/// The set of partitions in one store.
#[derive(Clone, Debug)]
pub struct CacheStorage {
    db: CacheDb,
}

impl CacheStorage {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    /// Create the partition if needed and return a handle to it.
    ///
    /// Failure is logged and reported as `CacheOpen`; no partition row is
    /// left behind.
    pub async fn open(&self, name: &str) -> Result<Partition, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let result = self
            .db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO partitions (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from);

        if let Err(e) = result {
            tracing::error!(partition = name, error = %e, "failed to open cache partition");
            return Err(Error::CacheOpen { partition: name.to_string(), reason: e.to_string() });
        }

        Ok(Partition::new(self.db.clone(), name.to_string()))
    }

    /// Handle to a partition without creating it.
    ///
    /// Lookups in a missing partition are misses and writes fail, so a
    /// handle held past its partition's deletion cannot resurrect it.
    pub fn partition(&self, name: &str) -> Partition {
        Partition::new(self.db.clone(), name.to_string())
    }

    /// Whether a partition with this name exists.
    pub async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Partition names in creation order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db
            .conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and every entry in it.
    ///
    /// Returns whether the partition existed.
    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RequestKey, ResponseType, Snapshot};

    fn snapshot(url: &str) -> Snapshot {
        Snapshot {
            url: url.to_string(),
            status: 200,
            status_text: "OK".to_string(),
            response_type: ResponseType::Basic,
            headers: Vec::new(),
            body: b"body".to_vec(),
        }
    }

    async fn storage() -> CacheStorage {
        CacheStorage::new(CacheDb::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_open_creates_once() {
        let storage = storage().await;
        storage.open("v1").await.unwrap();
        storage.open("v1").await.unwrap();

        assert!(storage.has("v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let storage = storage().await;
        for name in ["v1", "v3", "v2"] {
            storage.open(name).await.unwrap();
        }
        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v3", "v2"]);
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let storage = storage().await;
        let old = storage.open("v1").await.unwrap();
        let key = RequestKey::get("https://app.test/");
        old.put(&key, &snapshot(&key.url)).await.unwrap();

        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.has("v1").await.unwrap());
        assert_eq!(old.len().await.unwrap(), 0);

        let reopened = storage.open("v1").await.unwrap();
        assert!(reopened.match_request(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handle_does_not_resurrect_deleted_partition() {
        let storage = storage().await;
        storage.open("v1").await.unwrap();
        let handle = storage.partition("v1");
        storage.delete("v1").await.unwrap();

        let key = RequestKey::get("https://app.test/");
        assert!(handle.put(&key, &snapshot(&key.url)).await.is_err());
        assert!(!storage.has("v1").await.unwrap());
        assert!(handle.match_request(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let storage = storage().await;
        assert!(!storage.delete("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let storage = storage().await;
        let v1 = storage.open("v1").await.unwrap();
        let v2 = storage.open("v2").await.unwrap();
        let key = RequestKey::get("https://app.test/index.html");

        v1.put(&key, &snapshot(&key.url)).await.unwrap();

        assert!(v1.match_request(&key).await.unwrap().is_some());
        assert!(v2.match_request(&key).await.unwrap().is_none());
    }
}
