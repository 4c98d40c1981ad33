use std::sync::Arc;

use crate::{
    connection::Connection, error::Error, registry::CommandRegistry, transport::Connector,
};

mod help;
mod lifecycle;

pub use help::{help, quit};
pub use lifecycle::{close, open, set, write};

/// Data lines the built-in commands answer with when refusing.
pub mod messages {
    /// `open` before `set`.
    pub const NO_DEVICE_SET: &str = "Error: No Device Set";

    /// `open` while open.
    pub const ALREADY_STARTED: &str = "Error: Already Started";

    /// `close` while not open.
    pub const ALREADY_CLOSED: &str = "Error: Already Closed";

    /// `write` while not open.
    pub const NOT_READY: &str = "Error: Not Ready";

    /// An `open` completed after the device was changed or closed.
    pub const SUPERSEDED: &str = "Error: Connection Superseded";

    /// A required argument was not given.
    pub fn missing_argument(name: &str) -> String {
        format!("Error: Missing Argument <{name}>")
    }
}

/// A registry with the built-in command set.
///
/// Transports for `set` are made by `connector` at `baud_rate`.
pub fn registry(
    connector: Arc<dyn Connector>,
    baud_rate: u32,
) -> Result<CommandRegistry<Connection>, Error> {
    let mut registry = CommandRegistry::new();

    for command in [
        help(),
        quit(),
        set(connector, baud_rate),
        close(),
        open(),
        write(),
    ] {
        registry.register(command)?;
    }

    Ok(registry)
}
