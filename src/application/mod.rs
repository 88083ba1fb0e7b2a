//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: the long-lived bot service, privileges, reconnect supervision
//! - Messaging: sessions, command parsing, event and command dispatch
//! - Errors: Domain-specific errors

pub mod errors;
pub mod services;
pub mod messaging;
