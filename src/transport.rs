use std::{fmt::Debug, fmt::Display, sync::Arc};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Transport related errors.
pub mod error;

/// Codecs for encoding/decoding messages to/from wire.
pub mod codecs;

/// A real serial port.
pub mod serial;

/// An in-memory loopback transport.
pub mod mock;

pub use error::TransportError;

/// The message data type used for serial.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Deserialize, Serialize)]
pub struct SerialMessage(String);

impl SerialMessage {
    /// Create a serial message from bytes, ignoring any bad utf8 bytes.
    pub fn new_lossy<B: AsRef<[u8]>>(bytes: B) -> Self {
        Self(String::from_utf8_lossy(bytes.as_ref()).to_string())
    }

    /// Turn the message (utf8) into bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }

    /// Borrowed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: AsRef<str>> From<T> for SerialMessage {
    fn from(string_like: T) -> Self {
        Self(string_like.as_ref().into())
    }
}

impl Display for SerialMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.chars().take(48).collect::<String>();

        write!(f, "{}", s.trim())
    }
}

/// Something which happened on the transport, outside of any command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Inbound data.
    Data(SerialMessage),

    /// The transport failed.
    Error(String),
}

/// The serial I/O capability commands drive.
///
/// Constructed by a [`Connector`] without being opened.
pub trait Transport: Send + Sync + Debug {
    /// The device path this transport is bound to.
    fn path(&self) -> &str;

    /// Open the device. Resolves once opened, or with the reason it could not be.
    fn open(&self) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Close the device. Closing a closed transport does nothing.
    fn close(&self);

    /// Put a message on the wire. Resolves once written.
    fn write(&self, message: SerialMessage) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Get a receiver of inbound data and errors.
    /// Only events happening after subscribing are received.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Creates transports.
pub trait Connector: Send + Sync + Debug {
    /// A transport bound to the given device, not yet opened.
    fn construct(&self, path: &str, baud_rate: u32) -> Arc<dyn Transport>;
}
