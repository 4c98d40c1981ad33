//! A mock transport.
//! Messages put on the wire are sent back as inbound data, line by line.
//!
//! Useful for testing the shell without the actual serial ports,
//! and for trying it out without hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::{Connector, SerialMessage, Transport, TransportError, TransportEvent};

/// Builder for a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockBuilder {
    open_failure: Option<String>,
    write_failure: Option<String>,
    hang_on_open: bool,
    loopback: bool,
}

impl Default for MockBuilder {
    fn default() -> Self {
        Self {
            open_failure: None,
            write_failure: None,
            hang_on_open: false,
            loopback: true,
        }
    }
}

impl MockBuilder {
    /// A builder for a well behaved loopback mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening will fail with this reason.
    pub fn fail_open(mut self, reason: &str) -> Self {
        self.open_failure = Some(reason.into());
        self
    }

    /// Writing will fail with this reason.
    pub fn fail_write(mut self, reason: &str) -> Self {
        self.write_failure = Some(reason.into());
        self
    }

    /// Opening will never complete.
    pub fn hang_on_open(mut self) -> Self {
        self.hang_on_open = true;
        self
    }

    /// Written messages are not sent back.
    pub fn no_loopback(mut self) -> Self {
        self.loopback = false;
        self
    }

    /// Create the mock. It starts out closed.
    #[must_use]
    pub fn build(self, path: &str, baud_rate: u32) -> MockTransport {
        debug!(%path, %baud_rate, "Creating mock transport");

        let (broadcast_tx, _) = broadcast::channel(1024);

        MockTransport {
            inner: Arc::new(MockInner {
                path: path.into(),
                baud_rate,
                settings: self,
                state: Mutex::new(MockState::default()),
                broadcast_tx,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    opened: usize,
    written: Vec<String>,
}

#[derive(Debug)]
struct MockInner {
    path: String,
    baud_rate: u32,
    settings: MockBuilder,
    state: Mutex<MockState>,
    broadcast_tx: broadcast::Sender<TransportEvent>,
}

impl MockInner {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, event: TransportEvent) {
        match self.broadcast_tx.send(event) {
            Ok(listeners) => trace!("Broadcasted event to {listeners} listener(s)"),
            Err(_) => trace!("Nobody listening to mock events"),
        }
    }
}

/// An in-memory transport. Cloning gives another handle to the same mock.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// The baud rate it was constructed with.
    pub fn baud_rate(&self) -> u32 {
        self.inner.baud_rate
    }

    /// Is it currently open?
    pub fn is_open(&self) -> bool {
        self.inner.state().open
    }

    /// How many times it was successfully opened.
    pub fn times_opened(&self) -> usize {
        self.inner.state().opened
    }

    /// Every message successfully written, oldest first.
    pub fn written(&self) -> Vec<String> {
        self.inner.state().written.clone()
    }

    /// Pretend this arrived from the wire.
    pub fn inject(&self, data: &str) {
        self.inner.broadcast(TransportEvent::Data(data.into()))
    }

    /// Pretend the port failed.
    pub fn inject_error(&self, message: &str) {
        self.inner.broadcast(TransportEvent::Error(message.into()))
    }
}

impl Transport for MockTransport {
    fn path(&self) -> &str {
        &self.inner.path
    }

    fn open(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let inner = Arc::clone(&self.inner);

        async move {
            // Completion always happens on a later turn, like a real port.
            tokio::task::yield_now().await;

            if inner.settings.hang_on_open {
                futures::future::pending::<()>().await;
            }

            if let Some(reason) = &inner.settings.open_failure {
                return Err(TransportError::Rejected(reason.clone()));
            }

            let mut state = inner.state();
            state.open = true;
            state.opened += 1;

            info!(path = %inner.path, "Mock opened");
            Ok(())
        }
        .boxed()
    }

    fn close(&self) {
        let mut state = self.inner.state();
        if state.open {
            info!(path = %self.inner.path, "Mock closed");
            state.open = false;
        }
    }

    fn write(&self, message: SerialMessage) -> BoxFuture<'static, Result<(), TransportError>> {
        let inner = Arc::clone(&self.inner);

        async move {
            tokio::task::yield_now().await;

            if !inner.state().open {
                return Err(TransportError::NotOpen);
            }

            if let Some(reason) = &inner.settings.write_failure {
                return Err(TransportError::Rejected(reason.clone()));
            }

            inner.state().written.push(message.as_str().to_owned());

            if inner.settings.loopback {
                // This emulates a per-line loopback on a serial port.
                for line in message.as_str().lines() {
                    inner.broadcast(TransportEvent::Data(line.into()));
                }
            }

            Ok(())
        }
        .boxed()
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.broadcast_tx.subscribe()
    }
}

/// Creates [`MockTransport`]s from a template, and remembers them.
#[derive(Debug, Default)]
pub struct MockConnector {
    template: MockBuilder,
    constructed: Mutex<Vec<MockTransport>>,
}

impl MockConnector {
    /// Every constructed mock will behave as this builder says.
    pub fn new(template: MockBuilder) -> Self {
        Self {
            template,
            constructed: Mutex::new(vec![]),
        }
    }

    fn constructed(&self) -> MutexGuard<'_, Vec<MockTransport>> {
        self.constructed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// All transports constructed so far, oldest first.
    pub fn transports(&self) -> Vec<MockTransport> {
        self.constructed().clone()
    }

    /// The most recently constructed transport.
    pub fn last(&self) -> Option<MockTransport> {
        self.constructed().last().cloned()
    }
}

impl Connector for MockConnector {
    fn construct(&self, path: &str, baud_rate: u32) -> Arc<dyn Transport> {
        let transport = self.template.clone().build(path, baud_rate);
        self.constructed().push(transport.clone());

        Arc::new(transport)
    }
}
