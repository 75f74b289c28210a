//! yaktoon-admin library interface
//!
//! Maintenance operations behind the `yaktoon-admin` binary. Every operation
//! takes a [`yaktoon_common::Store`], so they run against Redis in production
//! and against a `MemoryStore` in tests.

pub mod accounts;
pub mod seed;
pub mod sessions;
