//! Domain entities - Core bot objects with no external dependencies

pub mod command;
pub mod event;
pub mod snapshot;
pub mod state;

pub use command::CommandRequest;
pub use event::{Event, EventKind};
pub use snapshot::{Identity, Snapshot};
pub use state::StateValue;
