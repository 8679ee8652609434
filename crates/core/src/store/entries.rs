//! Entry-level operations: put, get, ordered multi-partition lookup.

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::PartitionStore;
use crate::key::RequestKey;
use crate::resource::{CachedEntry, Method};
use crate::Error;

impl PartitionStore {
    /// Store an entry in a partition, overwriting any previous entry under
    /// the same key.
    ///
    /// The partition row is revived if it was deleted concurrently: deletion
    /// is eventually-consistent relative to in-flight writers, and a revived
    /// stale partition is retired again at the next activation.
    pub async fn put(&self, partition: &str, entry: &CachedEntry) -> Result<(), Error> {
        let partition = partition.to_string();
        let entry = entry.clone();
        let headers_json =
            serde_json::to_string(&entry.headers).map_err(|e| Error::StorageWrite(e.to_string()))?;
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, created_at],
                )?;
                conn.execute(
                    "INSERT INTO entries (partition, key_hash, method, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(partition, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        partition,
                        entry.key.storage_hash(),
                        entry.key.method().as_str(),
                        entry.key.url(),
                        entry.status as i64,
                        headers_json,
                        entry.body,
                        entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by key. Absence is not an error.
    pub async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        let partition = partition.to_string();
        let hash = key.storage_hash();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, body, stored_at
                     FROM entries WHERE partition = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![partition, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match result {
                    Ok((method, url, status, headers_json, body, stored_at)) => {
                        let method = Method::parse(&method)
                            .ok_or_else(|| Error::StorageWrite(format!("corrupt method column: {method}")))?;
                        let key = RequestKey::new(method, &url)?;
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::StorageWrite(e.to_string()))?;
                        Ok(Some(CachedEntry { key, status: status as u16, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a key across several partitions in order, returning the first
    /// hit and the partition it came from.
    pub async fn find_first(
        &self, partitions: &[String], key: &RequestKey,
    ) -> Result<Option<(String, CachedEntry)>, Error> {
        for name in partitions {
            if let Some(entry) = self.get(name, key).await? {
                return Ok(Some((name.clone(), entry)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_for(url: &str, body: &[u8]) -> CachedEntry {
        let key = RequestKey::new(Method::Get, url).unwrap();
        CachedEntry::capture(key, 200, vec![("content-type".into(), "text/plain".into())], body.to_vec())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let entry = entry_for("https://app.example/a.txt", b"hello");
        store.put("static-v1", &entry).await.unwrap();

        let got = store.get("static-v1", &entry.key).await.unwrap().unwrap();
        assert_eq!(got.body, b"hello");
        assert_eq!(got.status, 200);
        assert_eq!(got.header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let key = RequestKey::new(Method::Get, "https://app.example/missing").unwrap();
        assert!(store.get("static-v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let first = entry_for("https://app.example/a.txt", b"old");
        let second = entry_for("https://app.example/a.txt", b"new");

        store.put("static-v1", &first).await.unwrap();
        store.put("static-v1", &second).await.unwrap();

        let got = store.get("static-v1", &first.key).await.unwrap().unwrap();
        assert_eq!(got.body, b"new");
        assert_eq!(store.entry_count("static-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_revives_deleted_partition() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let entry = entry_for("https://app.example/a.txt", b"x");
        store.put("dynamic-v1", &entry).await.unwrap();
        store.delete("dynamic-v1").await.unwrap();

        // A write racing a deletion lands in a fresh partition row.
        store.put("dynamic-v1", &entry).await.unwrap();
        assert!(store.get("dynamic-v1", &entry.key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let entry = entry_for("https://app.example/a.txt", b"x");
        store.put("static-v1", &entry).await.unwrap();
        store.delete("static-v1").await.unwrap();

        store.open_partition("static-v1").await.unwrap();
        assert!(store.get("static-v1", &entry.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_first_respects_order() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let in_static = entry_for("https://app.example/a.txt", b"from-static");
        let in_dynamic = entry_for("https://app.example/a.txt", b"from-dynamic");
        store.put("static-v1", &in_static).await.unwrap();
        store.put("dynamic-v1", &in_dynamic).await.unwrap();

        let order = vec!["static-v1".to_string(), "dynamic-v1".to_string()];
        let (name, entry) = store.find_first(&order, &in_static.key).await.unwrap().unwrap();
        assert_eq!(name, "static-v1");
        assert_eq!(entry.body, b"from-static");
    }
}
