//! Cache entry CRUD operations.
//!
//! Entries are captured responses keyed by (generation, key digest).
//! `put_entry` is an UPSERT, so overlapping writes to the same key resolve
//! to last-write-wins without any locking.

use super::connection::SqliteStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A captured response: everything needed to answer the request again
/// without the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    /// Capture a response body with the current timestamp.
    pub fn new(status: u16, content_type: Option<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { status, content_type, headers, body, stored_at: chrono::Utc::now().to_rfc3339() }
    }
}

/// Aggregate size of one generation, as reported over the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheUsage {
    /// Sum of body sizes in bytes.
    pub raw: u64,
    /// Number of entries.
    pub count: u64,
}

impl SqliteStore {
    /// Record a generation tag, ignoring duplicates.
    pub async fn insert_generation(&self, tag: &str) -> Result<(), Error> {
        let tag = tag.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (tag, created_at) VALUES (?1, ?2)",
                    params![tag, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All generation tags present in the store.
    ///
    /// Includes tags that only exist as entry rows: a fire-and-forget write
    /// finishing after its generation was deleted resurrects the tag, and
    /// the next activation must still be able to sweep it.
    pub async fn generation_tags(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT tag FROM generations
                     UNION
                     SELECT DISTINCT generation FROM entries
                     ORDER BY tag",
                )?;
                let tags = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry stored under it.
    ///
    /// Returns whether the generation was recorded.
    pub async fn remove_generation(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                conn.execute("DELETE FROM entries WHERE generation = ?1", params![tag])?;
                let removed = conn.execute("DELETE FROM generations WHERE tag = ?1", params![tag])?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite a cache entry (last-write-wins per key).
    pub async fn put_entry(&self, tag: &str, key: &super::CacheKey, response: &CachedResponse) -> Result<(), Error> {
        let tag = tag.to_string();
        let key_hash = key.digest();
        let method = key.method().to_string();
        let url = key.url().to_string();
        let response = response.clone();
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        generation, key_hash, method, url, status,
                        content_type, headers_json, body, body_size, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(generation, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        body_size = excluded.body_size,
                        stored_at = excluded.stored_at",
                    params![
                        tag,
                        key_hash,
                        method,
                        url,
                        response.status as i64,
                        &response.content_type,
                        headers_json,
                        &response.body,
                        response.body.len() as i64,
                        &response.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by generation tag and key digest.
    ///
    /// Returns None if the key is absent from that generation.
    pub async fn get_entry(&self, tag: &str, key_hash: &str) -> Result<Option<CachedResponse>, Error> {
        let tag = tag.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, content_type, headers_json, body, stored_at
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![tag, key_hash], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                });

                match result {
                    Ok((status, content_type, headers_json, body, stored_at)) => {
                        let headers = headers_json
                            .as_deref()
                            .map(serde_json::from_str)
                            .transpose()
                            .map_err(|e| Error::InvalidPayload(e.to_string()))?
                            .unwrap_or_default();
                        Ok(Some(CachedResponse { status: status as u16, content_type, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Total body bytes and entry count for a generation.
    pub async fn generation_usage(&self, tag: &str) -> Result<CacheUsage, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<CacheUsage, Error> {
                let usage = conn.query_row(
                    "SELECT COALESCE(SUM(body_size), 0), COUNT(*) FROM entries WHERE generation = ?1",
                    params![tag],
                    |row| Ok(CacheUsage { raw: row.get::<_, i64>(0)? as u64, count: row.get::<_, i64>(1)? as u64 }),
                )?;
                Ok(usage)
            })
            .await
            .map_err(Error::from)
    }
}
