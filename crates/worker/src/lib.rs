//! Strategy dispatch, lifecycle and control surface of the offcache worker.
//!
//! This crate ties the partition store and the network client together:
//! intercepted requests are classified, dispatched to a caching strategy,
//! and always answered with some response. The lifecycle controller drives
//! install-time pre-caching and activation-time cleanup; the control channel
//! and background refresh are asynchronous side entry points.

pub mod control;
pub mod engine;
pub mod fallback;
pub mod hub;
pub mod lifecycle;
pub mod refresh;
pub mod strategy;
pub mod testing;

pub use engine::{Engine, FetchDecision};
pub use strategy::{ServedResponse, StrategyKind, StrategyMap};
