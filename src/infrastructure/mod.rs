//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Snapshot persistence
//! - Adapters: Console and in-memory transports

pub mod config;
pub mod storage;
pub mod adapters;
