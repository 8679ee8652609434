//! Partition-level operations: create, enumerate, inspect, delete.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::PartitionStore;
use crate::Error;

/// Entry count and key list for one partition, as reported to callers of
/// the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionState {
    pub name: String,
    pub size: u64,
    pub urls: Vec<String>,
}

impl PartitionStore {
    /// Create a partition if it doesn't exist. Idempotent.
    pub async fn open_partition(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing partitions.
    pub async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all its entries. Returns whether a partition
    /// row was actually removed.
    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every partition regardless of version. Returns the number of
    /// partitions removed. Idempotent: a second call removes zero and is
    /// not an error.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        self.conn
            .call(|conn| -> Result<usize, Error> {
                let deleted = conn.execute("DELETE FROM partitions", [])?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a partition. Zero for a missing partition.
    pub async fn entry_count(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of all entries in a partition.
    pub async fn entry_keys(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Per-partition entry count and key list, for `report-state`.
    pub async fn states(&self) -> Result<Vec<PartitionState>, Error> {
        let mut states = Vec::new();
        for name in self.list_names().await? {
            let size = self.entry_count(&name).await?;
            let urls = self.entry_keys(&name).await?;
            states.push(PartitionState { name, size, urls });
        }
        Ok(states)
    }
}
