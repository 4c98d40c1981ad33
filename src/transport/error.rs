use std::io;

use thiserror::Error;

/// Anything a transport might fail with.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO related errors.
    #[error("Underlying IO problem: {0}")]
    IO(#[from] io::Error),

    /// The serial port could not be set up.
    #[error("Could not open port: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Writing requires an open transport.
    #[error("Port is not open")]
    NotOpen,

    /// The port went away while in use.
    #[error("Serial port disconnected")]
    Disconnected,

    /// The transport refused, for a reason of its own.
    #[error("{0}")]
    Rejected(String),
}
