use std::time::Duration;

use chrono::Local;
use futures::{channel::mpsc, stream::FuturesUnordered, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    connection::Connection,
    error::Error,
    hooks::{names, HookId},
    registry::CommandRegistry,
    response::{CommandResponse, PendingResponse, Reply},
};

/// How responses are printed.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Printed before reading each line. May be empty.
    pub prompt: String,

    /// Print each response as a line of JSON instead of indented data lines.
    pub json: bool,

    /// How long to wait for a response before reading the next line.
    /// Also how long to wait for outstanding responses at the end of input.
    pub response_timeout: Duration,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), false)
    }
}

impl ShellOptions {
    /// Options as configured.
    pub fn from_config(config: &Config, json: bool) -> Self {
        Self {
            prompt: config.prompt.clone(),
            json,
            response_timeout: Duration::from_millis(config.response_timeout_ms),
        }
    }
}

/// Why [`Shell::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// A `quit` command.
    Quit,

    /// The input ended.
    EndOfInput,
}

/// Feeds lines to a registry, and prints what comes back.
#[derive(Debug)]
pub struct Shell {
    registry: CommandRegistry<Connection>,
    connection: Connection,
    options: ShellOptions,
    startup: Vec<String>,
}

impl Shell {
    /// A shell over a registry, with an unconfigured connection.
    pub fn new(registry: CommandRegistry<Connection>, options: ShellOptions) -> Self {
        Self {
            registry,
            connection: Connection::new(),
            options,
            startup: vec![],
        }
    }

    /// Lines dispatched before any input is read.
    pub fn with_startup<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.startup.extend(lines.into_iter().map(Into::into));
        self
    }

    /// The connection every command is dispatched with.
    pub fn connection(&self) -> Connection {
        self.connection.clone()
    }

    /// The registry commands are dispatched to.
    pub fn registry(&self) -> &CommandRegistry<Connection> {
        &self.registry
    }

    fn render_response(&self, response: &CommandResponse) -> String {
        if self.options.json {
            match serde_json::to_string(response) {
                Ok(json) => json + "\n",
                Err(e) => {
                    warn!(%e, "Could not serialize response");
                    String::new()
                }
            }
        } else {
            response
                .data
                .iter()
                .map(|line| format!("  {line}\n"))
                .collect()
        }
    }

    fn render_event(event: &str, data: &str) -> String {
        format!("[{}] {event}: {data}\n", Local::now().format("%H:%M:%S"))
    }

    fn subscribe(&self, tx: mpsc::UnboundedSender<(&'static str, String)>) -> Vec<HookId> {
        [names::READ, names::ERROR]
            .into_iter()
            .map(|event| {
                let tx = tx.clone();
                self.registry.on_event(event, move |data| {
                    // The shell may be gone.
                    let _ = tx.unbounded_send((event, data.join(" ")));
                })
            })
            .collect()
    }

    async fn show<W>(&self, reply: Reply, writer: &mut W) -> Result<Option<ShellExit>, Error>
    where
        W: AsyncWrite + Unpin,
    {
        match reply {
            Reply::Response(response) => {
                writer
                    .write_all(self.render_response(&response).as_bytes())
                    .await?;
                Ok(None)
            }
            Reply::Quit => {
                info!("Quit");
                Ok(Some(ShellExit::Quit))
            }
        }
    }

    /// Dispatch a line and wait a while for its response.
    /// If it takes longer, it is printed whenever it arrives.
    async fn dispatch<W>(
        &self,
        line: &str,
        pending: &mut FuturesUnordered<PendingResponse>,
        writer: &mut W,
    ) -> Result<Option<ShellExit>, Error>
    where
        W: AsyncWrite + Unpin,
    {
        debug!(%line, "Dispatching");
        let mut response = self.registry.dispatch(line, self.connection());

        match tokio::time::timeout(self.options.response_timeout, &mut response).await {
            Ok(reply) => self.show(reply, writer).await,
            Err(_) => {
                debug!(command = %response.name(), "No response yet, reading on");
                pending.push(response);
                Ok(None)
            }
        }
    }

    /// Run until `quit` or the end of input.
    ///
    /// Each line's response is waited for up to the response timeout before reading on.
    /// Slower responses are printed whenever they resolve, which may be out of order.
    /// At the end of input, outstanding responses are waited for up to the response timeout.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<ShellExit, Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut events) = mpsc::unbounded();
        let subscriptions = self.subscribe(tx);

        let exit = self.run_inner(reader, &mut writer, &mut events).await;

        for id in subscriptions {
            self.registry.hooks().unsubscribe(id);
        }
        writer.flush().await?;

        exit
    }

    async fn run_inner<R, W>(
        &self,
        reader: R,
        writer: &mut W,
        events: &mut mpsc::UnboundedReceiver<(&'static str, String)>,
    ) -> Result<ShellExit, Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut pending = FuturesUnordered::new();

        for line in &self.startup {
            debug!(%line, "Startup");
            if let Some(exit) = self.dispatch(line, &mut pending, writer).await? {
                return Ok(exit);
            }
        }

        let mut lines = reader.lines();

        writer.write_all(self.options.prompt.as_bytes()).await?;
        writer.flush().await?;

        loop {
            // Print what is ready before reading more input.
            tokio::select! {
                biased;

                Some(reply) = pending.next(), if !pending.is_empty() => {
                    if let Some(exit) = self.show(reply, writer).await? {
                        return Ok(exit);
                    }
                }
                Some((event, data)) = events.next() => {
                    writer.write_all(Self::render_event(event, &data).as_bytes()).await?;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("End of input");
                        break;
                    };
                    let line = line.strip_suffix('\r').unwrap_or(&line);

                    if let Some(exit) = self.dispatch(line, &mut pending, writer).await? {
                        return Ok(exit);
                    }

                    writer.write_all(self.options.prompt.as_bytes()).await?;
                }
            }

            writer.flush().await?;
        }

        let drain = async {
            while let Some(reply) = pending.next().await {
                if let Some(exit) = self.show(reply, writer).await? {
                    return Ok(exit);
                }
            }

            Ok::<_, Error>(ShellExit::EndOfInput)
        };

        match tokio::time::timeout(self.options.response_timeout, drain).await {
            Ok(exit) => exit,
            Err(_) => {
                warn!("Gave up waiting for outstanding responses");
                Ok(ShellExit::EndOfInput)
            }
        }
    }
}
