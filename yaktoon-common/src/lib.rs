//! # Yaktoon Common Library
//!
//! Shared code for the Yaktoon services including:
//! - Key/value store abstraction (Redis and in-memory backends)
//! - Redis key layout
//! - Domain models stored as Redis hashes
//! - Event types (YaktoonEvent) and SSE helpers
//! - Configuration loading
//! - Id and time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod keys;
pub mod models;
pub mod sse;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use store::{MemoryStore, RedisStore, Store};
