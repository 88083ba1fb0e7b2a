//! Adapters - Transports and connectors the supervisor can drive

pub mod console;
pub mod memory;

pub use console::{ConsoleConnector, ConsoleTransport};
pub use memory::MemoryTransport;
