//! SQLite-backed cache partition store.
//!
//! Named, versioned partitions of captured responses, with async access via
//! tokio-rusqlite. Every read and write round-trips through the database —
//! there is no in-memory copy at this layer, so concurrent callers observe
//! a consistent view. The store relies on SQLite's own serialization for
//! per-key atomicity and adds no extra locking; concurrent writes to the
//! same key resolve as last-write-wins.

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::PartitionStore;
pub use partitions::PartitionState;
