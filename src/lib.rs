//! cassbot - control core of a chat bot
//!
//! Receives decoded protocol events, fans them out to enabled plugins,
//! routes addressed commands, keeps a privilege map, persists state across
//! restarts and rebinds each new connection to the long-lived service.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
