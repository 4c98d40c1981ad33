#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use color_eyre::Result;
use serial_shell::{
    commands,
    connection::Connection,
    registry::CommandRegistry,
    response::{CommandResponse, Reply},
    transport::mock::{MockBuilder, MockConnector, MockTransport},
};
use tokio::time::timeout;

pub const BAUD: u32 = 115_200;

/// The built-in commands over mock transports.
pub struct Harness {
    pub registry: CommandRegistry<Connection>,
    pub connection: Connection,
    pub connector: Arc<MockConnector>,
}

pub fn harness() -> Harness {
    harness_with(MockBuilder::new())
}

pub fn harness_with(template: MockBuilder) -> Harness {
    let connector = Arc::new(MockConnector::new(template));
    let registry = commands::registry(connector.clone(), BAUD).expect("Built-ins should register");

    Harness {
        registry,
        connection: Connection::new(),
        connector,
    }
}

impl Harness {
    /// Dispatch a line and wait for its response.
    pub async fn send(&self, line: &str) -> Result<CommandResponse> {
        let reply = timeout(
            Duration::from_secs(5),
            self.registry.dispatch(line, self.connection.clone()),
        )
        .await?;

        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Quit => Err(color_eyre::eyre::eyre!("Got quit, wanted a response")),
        }
    }

    /// `set` then `open` the given device.
    pub async fn open(&self, device: &str) -> Result<MockTransport> {
        assert!(self.send(&format!("set {device}")).await?.is_ok());
        assert!(self.send("open").await?.is_ok());

        self.transport()
    }

    /// The most recently constructed transport.
    pub fn transport(&self) -> Result<MockTransport> {
        self.connector
            .last()
            .ok_or_else(|| color_eyre::eyre::eyre!("No transport constructed"))
    }

    /// Record the payloads of an event.
    pub fn record(&self, event: &str) -> Recording {
        let recording = Recording::default();

        let payloads = recording.clone();
        self.registry
            .on_event(event, move |data| payloads.push(data.to_vec()));

        recording
    }
}

/// Payloads seen by a listener, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Recording(Arc<Mutex<Vec<Vec<String>>>>);

impl Recording {
    pub fn push(&self, payload: Vec<String>) {
        self.0.lock().unwrap().push(payload);
    }

    pub fn payloads(&self) -> Vec<Vec<String>> {
        self.0.lock().unwrap().clone()
    }

    /// Wait until at least `n` payloads were seen.
    pub async fn wait_for(&self, n: usize) -> Result<Vec<Vec<String>>> {
        timeout(Duration::from_secs(5), async {
            loop {
                let payloads = self.payloads();
                if payloads.len() >= n {
                    return payloads;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(Into::into)
    }
}
