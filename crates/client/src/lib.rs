//! Network client for the offcache worker.
//!
//! This crate provides the HTTP fetch pipeline and the `Network` trait seam
//! the strategy executors depend on, so tests can substitute a fake network.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchedResponse, Network};
