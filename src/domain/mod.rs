//! Domain layer - Core bot concepts with no I/O
//! 
//! This layer contains:
//! - Entities: Core objects (events, commands, plugin state, snapshots)
//! - Traits: Abstractions for infrastructure (Transport, SnapshotStore)
//! - Mask: wildcard matching of `nick!user@host` principals

pub mod entities;
pub mod mask;
pub mod traits;
