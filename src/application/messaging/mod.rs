//! Message handling - Event-driven processing for one live connection

pub mod connection;
pub mod dispatcher;
pub mod parser;
pub mod session;

pub use connection::Connection;
pub use dispatcher::{DispatchHandle, DispatchReport, EventDispatcher};
pub use parser::{Addressed, MessageParser};
pub use session::{FollowUp, Session};
