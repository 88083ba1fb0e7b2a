//! Application services - State and lifecycle shared across connections

pub mod auth;
pub mod bot_service;
pub mod supervisor;

pub use auth::AuthMap;
pub use bot_service::BotService;
pub use supervisor::{Backoff, Connector, Link, Supervisor};
