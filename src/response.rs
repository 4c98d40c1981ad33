use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Status codes carried by a [`CommandResponse`].
pub mod status {
    /// The command did what was asked.
    pub const OK: i32 = 0;

    /// Something operational failed, e.g. the transport reported an error.
    pub const ERROR: i32 = 1;

    /// The command was issued in a state where it can't run, e.g. "not connected".
    pub const PRECONDITION: i32 = 2;
}

/// Data line of the response given to lines that don't resolve to a command.
pub const NO_COMMAND: &str = "Error: No Command";

/// Data line of the response given when a handler dropped its [`Responder`].
pub const NO_RESPONSE: &str = "Error: No Response";

/// The structured result of every command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// The primary name of the command which answered.
    /// `None` if no command was found.
    pub name: Option<String>,

    /// See [`status`].
    pub status: i32,

    /// Lines of output.
    pub data: Vec<String>,
}

impl CommandResponse {
    /// A response with any status.
    pub fn new<S: AsRef<str>>(name: Option<&str>, status: i32, data: &[S]) -> Self {
        Self {
            name: name.map(Into::into),
            status,
            data: data.iter().map(|line| line.as_ref().to_owned()).collect(),
        }
    }

    /// A successful response.
    pub fn ok<S: AsRef<str>>(name: &str, data: &[S]) -> Self {
        Self::new(Some(name), status::OK, data)
    }

    /// An operational failure.
    pub fn error(name: &str, message: impl Display) -> Self {
        Self::new(Some(name), status::ERROR, &[message.to_string()])
    }

    /// A precondition failure.
    pub fn precondition(name: &str, message: impl Display) -> Self {
        Self::new(Some(name), status::PRECONDITION, &[message.to_string()])
    }

    /// The response to a line which resolved to no command.
    pub fn no_command() -> Self {
        Self::new(None, status::ERROR, &[NO_COMMAND])
    }

    /// Did the command succeed?
    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }

    /// An example response, for documentation purposes.
    pub fn example() -> Self {
        Self::ok("write", &["hello there"])
    }
}

/// What a command invocation finally produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The usual outcome.
    Response(CommandResponse),

    /// The operator asked to leave the shell.
    Quit,
}

impl Reply {
    /// The response, if this is not [`Reply::Quit`].
    pub fn into_response(self) -> Option<CommandResponse> {
        match self {
            Reply::Response(response) => Some(response),
            Reply::Quit => None,
        }
    }
}

/// The sending half handed to a command handler.
///
/// Answering consumes the responder, so a handler can answer at most once.
/// If it is dropped without answering, the caller gets a [`NO_RESPONSE`] error.
/// A handler which holds on to it forever leaves the caller waiting forever.
#[derive(Debug)]
pub struct Responder {
    name: String,
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    /// A responder and the future which resolves once it answers.
    pub(crate) fn new(name: Option<&str>) -> (Self, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let name = name.unwrap_or_default().to_owned();

        let pending = PendingResponse {
            name: name.clone(),
            rx,
        };

        (Self { name, tx }, pending)
    }

    /// The primary name of the command this responder answers for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver the response.
    pub fn respond(self, response: CommandResponse) {
        // The caller may have stopped waiting; that's fine.
        let _ = self.tx.send(Reply::Response(response));
    }

    /// Respond with success.
    pub fn ok<S: AsRef<str>>(self, data: &[S]) {
        let response = CommandResponse::ok(&self.name, data);
        self.respond(response)
    }

    /// Respond with an operational failure.
    pub fn error(self, message: impl Display) {
        let response = CommandResponse::error(&self.name, message);
        self.respond(response)
    }

    /// Respond with a precondition failure.
    pub fn precondition(self, message: impl Display) {
        let response = CommandResponse::precondition(&self.name, message);
        self.respond(response)
    }

    /// Ask the caller to end the session instead of responding.
    pub fn quit(self) {
        let _ = self.tx.send(Reply::Quit);
    }
}

/// Resolves to the [`Reply`] of a dispatched command.
#[derive(Debug)]
#[must_use = "the response is lost unless the pending response is awaited"]
pub struct PendingResponse {
    name: String,
    rx: oneshot::Receiver<Reply>,
}

impl PendingResponse {
    /// A pending response which is already resolved.
    pub(crate) fn ready(response: CommandResponse) -> Self {
        let (responder, pending) = Responder::new(response.name.as_deref());
        responder.respond(response);
        pending
    }

    /// The primary name of the command this will be the response of.
    /// Empty if no command was found.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Future for PendingResponse {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|reply| match reply {
            Ok(reply) => reply,
            Err(oneshot::Canceled) => {
                warn!(name = %self.name, "Handler dropped its responder without answering");
                Reply::Response(CommandResponse::error(&self.name, NO_RESPONSE))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn responder_delivers() {
        let (responder, pending) = Responder::new(Some("open"));
        responder.ok(&["fine"]);

        assert_eq!(
            pending.await,
            Reply::Response(CommandResponse::ok("open", &["fine"]))
        );
    }

    #[tokio::test]
    async fn dropped_responder_is_an_error() {
        let (responder, pending) = Responder::new(Some("write"));
        drop(responder);

        let response = pending.await.into_response().unwrap();
        assert_eq!(response, CommandResponse::error("write", NO_RESPONSE));
    }

    #[tokio::test]
    async fn quit_is_not_a_response() {
        let (responder, pending) = Responder::new(Some("quit"));
        responder.quit();

        assert_eq!(pending.await.into_response(), None);
    }

    #[test]
    fn no_command_has_no_name() {
        let response = CommandResponse::no_command();

        assert_eq!(response.name, None);
        assert_eq!(response.status, status::ERROR);
        assert_eq!(response.data, vec![NO_COMMAND.to_owned()]);
    }

    #[test]
    fn serializes_like_the_wire_format() {
        let json = serde_json::to_string(&CommandResponse::no_command()).unwrap();

        assert_eq!(json, r#"{"name":null,"status":1,"data":["Error: No Command"]}"#);
    }
}
