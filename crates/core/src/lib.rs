//! Core types and shared functionality for the offcache worker.
//!
//! This crate provides:
//! - Partition store with SQLite backend
//! - Request/response data model and request-key normalization
//! - Resource classification
//! - Version manifest and partition naming
//! - Unified error types and configuration

pub mod classify;
pub mod config;
pub mod error;
pub mod key;
pub mod manifest;
pub mod resource;
pub mod store;

pub use classify::ResourceClass;
pub use config::AppConfig;
pub use error::Error;
pub use key::RequestKey;
pub use manifest::{Role, VersionManifest};
pub use resource::{CachedEntry, Destination, Method, ResourceRequest};
pub use store::PartitionStore;
