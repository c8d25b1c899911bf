//! Partition entry operations.
//!
//! A partition maps a request identity (method and URL) to the snapshot of
//! the response that was stored for it. Only `GET` requests are storable;
//! lookups for any other method are misses.

use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Identity of a cached request. Bodies are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url: url.into() }
    }

    /// Key for a `GET` of `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Content-addressed hash used as the row key.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

/// How a response relates to the worker's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin, fully readable.
    Basic,
    /// Cross-origin, readable.
    Cors,
    /// Cross-origin `no-cors`; status and body are hidden.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "opaque" => Ok(ResponseType::Opaque),
            "error" => Ok(ResponseType::Error),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }
}

/// A stored response: everything needed to replay it byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    /// Header names with their raw value bytes, in wire order.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

/// Handle to one named partition.
///
/// Cheap to clone; all clones address the same rows.
#[derive(Clone, Debug)]
pub struct Partition {
    db: CacheDb,
    name: String,
}

struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    status_text: String,
    response_type: &'static str,
    headers_json: String,
    body: Vec<u8>,
}

impl Partition {
    pub(crate) fn new(db: CacheDb, name: String) -> Self {
        Self { db, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the snapshot stored for `key`.
    ///
    /// Returns None for a miss and for any non-GET key.
    pub async fn match_request(&self, key: &RequestKey) -> Result<Option<Snapshot>, Error> {
        if !key.is_get() {
            return Ok(None);
        }

        let partition = self.name.clone();
        let key_hash = key.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, status_text, response_type, headers_json, body
                     FROM entries WHERE partition = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![partition, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                });

                let (url, status, status_text, response_type, headers_json, body) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, Vec<u8>)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

                Ok(Some(Snapshot { url, status, status_text, response_type: response_type.parse()?, headers, body }))
            })
            .await
            .map_err(Error::from)
    }

    /// Store `snapshot` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &RequestKey, snapshot: &Snapshot) -> Result<(), Error> {
        self.put_all(vec![(key.clone(), snapshot.clone())]).await.map(|_| ())
    }

    /// Store every pair in one transaction.
    ///
    /// Either all pairs are written or none are. Returns the number stored.
    pub async fn put_all(&self, entries: Vec<(RequestKey, Snapshot)>) -> Result<usize, Error> {
        let mut rows = Vec::with_capacity(entries.len());
        for (key, snapshot) in entries {
            if !key.is_get() {
                return Err(Error::InvalidInput(format!("request method '{}' is unsupported", key.method)));
            }
            let headers_json =
                serde_json::to_string(&snapshot.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
            rows.push(EntryRow {
                key_hash: key.cache_key(),
                method: key.method,
                url: key.url,
                status: snapshot.status,
                status_text: snapshot.status_text,
                response_type: snapshot.response_type.as_str(),
                headers_json,
                body: snapshot.body,
            });
        }

        let partition = self.name.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (
                            partition, key_hash, method, url, status, status_text,
                            response_type, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        ON CONFLICT(partition, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            status_text = excluded.status_text,
                            response_type = excluded.response_type,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            &partition,
                            &row.key_hash,
                            &row.method,
                            &row.url,
                            row.status,
                            &row.status_text,
                            row.response_type,
                            &row.headers_json,
                            &row.body,
                            &stored_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Stored request keys in insertion order.
    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        let partition = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE partition = ?1 ORDER BY rowid")?;
                let keys = stmt
                    .query_map(params![partition], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub async fn delete(&self, key: &RequestKey) -> Result<bool, Error> {
        let partition = self.name.clone();
        let key_hash = key.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2", params![partition, key_hash])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> Result<u64, Error> {
        let partition = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;

    fn make_snapshot(url: &str, body: &str) -> Snapshot {
        Snapshot {
            url: url.to_string(),
            status: 200,
            status_text: "OK".to_string(),
            response_type: ResponseType::Basic,
            headers: vec![("content-type".to_string(), b"text/html".to_vec())],
            body: body.as_bytes().to_vec(),
        }
    }

    async fn open_partition(name: &str) -> Partition {
        let db = CacheDb::open_in_memory().await.unwrap();
        CacheStorage::new(db).open(name).await.unwrap()
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let partition = open_partition("v1").await;
        let key = RequestKey::get("https://app.test/index.html");
        let snapshot = make_snapshot(&key.url, "<h1>hi</h1>");

        partition.put(&key, &snapshot).await.unwrap();

        let found = partition.match_request(&key).await.unwrap().unwrap();
        assert_eq!(found, snapshot);
    }

    #[tokio::test]
    async fn test_header_bytes_survive_storage() {
        let partition = open_partition("v1").await;
        let key = RequestKey::get("https://app.test/cafe");
        let mut snapshot = make_snapshot(&key.url, "menu");
        snapshot.headers.push(("x-title".to_string(), b"caf\xe9".to_vec()));

        partition.put(&key, &snapshot).await.unwrap();

        let found = partition.match_request(&key).await.unwrap().unwrap();
        assert_eq!(found.headers[1].1, b"caf\xe9");
    }

    #[tokio::test]
    async fn test_match_missing() {
        let partition = open_partition("v1").await;
        let result = partition.match_request(&RequestKey::get("https://app.test/nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_non_get_is_never_matched_or_stored() {
        let partition = open_partition("v1").await;
        let key = RequestKey::new("post", "https://app.test/form");

        let put = partition.put(&key, &make_snapshot(&key.url, "x")).await;
        assert!(matches!(put, Err(Error::InvalidInput(_))));
        assert!(partition.match_request(&key).await.unwrap().is_none());
        assert_eq!(partition.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let partition = open_partition("v1").await;
        let key = RequestKey::get("https://app.test/");

        partition.put(&key, &make_snapshot(&key.url, "old")).await.unwrap();
        partition.put(&key, &make_snapshot(&key.url, "new")).await.unwrap();

        let found = partition.match_request(&key).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
        assert_eq!(partition.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_all_is_all_or_nothing() {
        let partition = open_partition("v1").await;
        let good = RequestKey::get("https://app.test/a");
        let bad = RequestKey::new("PUT", "https://app.test/b");

        let result = partition
            .put_all(vec![(good.clone(), make_snapshot(&good.url, "a")), (bad.clone(), make_snapshot(&bad.url, "b"))])
            .await;

        assert!(result.is_err());
        assert_eq!(partition.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let partition = open_partition("v1").await;
        let urls = ["https://app.test/", "https://app.test/index.html", "https://app.test/app.js"];
        let entries = urls.iter().map(|u| (RequestKey::get(*u), make_snapshot(u, u))).collect();

        assert_eq!(partition.put_all(entries).await.unwrap(), 3);

        let keys = partition.keys().await.unwrap();
        let stored: Vec<&str> = keys.iter().map(|k| k.url.as_str()).collect();
        assert_eq!(stored, urls);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let partition = open_partition("v1").await;
        let key = RequestKey::get("https://app.test/");
        partition.put(&key, &make_snapshot(&key.url, "x")).await.unwrap();

        assert!(partition.delete(&key).await.unwrap());
        assert!(!partition.delete(&key).await.unwrap());
        assert!(partition.match_request(&key).await.unwrap().is_none());
    }

    #[test]
    fn test_response_type_round_trip_names() {
        for ty in [ResponseType::Basic, ResponseType::Cors, ResponseType::Opaque, ResponseType::Error] {
            assert_eq!(ty.as_str().parse::<ResponseType>().unwrap(), ty);
        }
        assert!("weird".parse::<ResponseType>().is_err());
    }
}
