use std::{
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::transport::Transport;

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No device chosen.
    Unconfigured,

    /// A device is chosen and its transport constructed, but not opened.
    Configured,

    /// The transport is open.
    Open,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Unconfigured => write!(f, "unconfigured"),
            ConnectionState::Configured => write!(f, "configured"),
            ConnectionState::Open => write!(f, "open"),
        }
    }
}

/// The state the lifecycle commands act upon.
///
/// Invariants:
///     - `ready` implies `initialized`.
///     - A transport being present implies `initialized`.
#[derive(Debug, Default)]
pub struct ConnectionContext {
    /// The device path last given to `set`.
    pub device: String,

    /// A device is chosen and a transport exists for it.
    pub initialized: bool,

    /// The transport is open.
    pub ready: bool,

    /// The transport for `device`.
    pub transport: Option<Arc<dyn Transport>>,

    /// Bumped whenever the transport is replaced or dropped,
    /// so late completions can tell that they are stale.
    pub(crate) generation: u64,

    /// Republishes inbound transport events on the hook bus while open.
    pub(crate) forwarder: Option<JoinHandle<()>>,
}

impl ConnectionContext {
    /// Where the connection is in its lifecycle.
    pub fn state(&self) -> ConnectionState {
        match (self.initialized, self.ready) {
            (_, true) => ConnectionState::Open,
            (true, false) => ConnectionState::Configured,
            (false, false) => ConnectionState::Unconfigured,
        }
    }

    /// Close and drop the transport, if any, and stop forwarding its events.
    /// The device name is kept.
    pub(crate) fn teardown(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        if let Some(transport) = self.transport.take() {
            debug!(path = %transport.path(), "Tearing down transport");
            transport.close();
        }

        self.ready = false;
        self.initialized = false;
        self.generation += 1;
    }
}

/// A shared handle to the [`ConnectionContext`].
///
/// Lifecycle commands complete on other tasks, so they need shared access.
#[derive(Debug, Clone, Default)]
pub struct Connection(Arc<Mutex<ConnectionContext>>);

impl Connection {
    /// A connection with no device chosen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the context. Don't hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, ConnectionContext> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Where the connection is in its lifecycle.
    pub fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    /// The device path last given to `set`.
    pub fn device(&self) -> String {
        self.lock().device.clone()
    }
}
