use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{
    channel::{mpsc, oneshot},
    future::BoxFuture,
    FutureExt, SinkExt, StreamExt,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_serial::{FlowControl, SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use super::{
    codecs::lines::LinesCodec, Connector, SerialMessage, Transport, TransportError,
    TransportEvent,
};

type SerialMessageBytes = Vec<u8>;

/// A message to put on the wire, and where to report how that went.
type Outgoing = (
    SerialMessageBytes,
    oneshot::Sender<Result<(), TransportError>>,
);

/// Builder for a [`SerialTransport`].
#[derive(Debug, Default)]
pub struct SerialTransportBuilder {
    baud: Option<u32>,
    flow_control: Option<FlowControl>,
    path: String,
    line_codec: Option<LinesCodec>,
}

impl SerialTransportBuilder {
    /// Start a new builder.
    /// The tty should likely be along the lines of `/tty/ACMx` on unix, and `COMx` on Windows.
    pub fn new(tty: &str) -> Self {
        Self {
            path: tty.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    /// Will use 115_200 if not set.
    pub fn set_baud(mut self, baud: u32) -> Self {
        self.baud = Some(baud);
        self
    }

    /// Set the flow control.
    /// Will use no flow control if not set.
    pub fn set_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = Some(flow_control);
        self
    }

    /// Set the [`LinesCodec`] to use.
    pub fn set_line_codec(mut self, codec: LinesCodec) -> Self {
        self.line_codec = Some(codec);
        self
    }

    /// Create the transport. The port is not opened.
    #[must_use]
    pub fn build(self) -> SerialTransport {
        // Outsiders will be observing inbound data from this broadcast.
        let (broadcast_tx, _) = broadcast::channel(1024);

        SerialTransport {
            inner: Arc::new(Inner {
                baud: self.baud.unwrap_or(115_200),
                flow_control: self.flow_control.unwrap_or(FlowControl::None),
                path: self.path,
                codec: self.line_codec.unwrap_or_default(),
                link: Mutex::new(None),
                broadcast_tx,
            }),
        }
    }
}

#[derive(Debug)]
struct Link {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    task: JoinHandle<()>,
}

#[derive(Debug)]
struct Inner {
    path: String,
    baud: u32,
    flow_control: FlowControl,
    codec: LinesCodec,
    link: Mutex<Option<Link>>,
    broadcast_tx: broadcast::Sender<TransportEvent>,
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(link) = self.link().take() {
            link.task.abort();
        }
    }
}

/// A serial port, 8N1, framed into lines.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    inner: Arc<Inner>,
}

fn try_create_serial_port(inner: &Inner) -> Result<SerialStream, TransportError> {
    let serial_stream = tokio_serial::new(&inner.path, inner.baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(inner.flow_control)
        .open_native_async()?;

    Ok(serial_stream)
}

fn spawn_io(inner: &Inner, serial_stream: SerialStream) -> Link {
    enum Event {
        PleasePutThisOnWire(Outgoing),
        ThisCameFromWire(Result<SerialMessageBytes, TransportError>),
    }

    // Sink: Send things (to serial port), stream: receive things (from serial port)
    let (mut sink, stream) = inner.codec.clone().framed(serial_stream).split();
    let stream = stream.map(Event::ThisCameFromWire);

    let (outgoing, should_put_on_wire_receiver) = mpsc::unbounded();
    let should_put_on_wire_receiver =
        should_put_on_wire_receiver.map(Event::PleasePutThisOnWire);

    let broadcast_tx = inner.broadcast_tx.clone();
    let tty_span = info_span!("tty", path = %inner.path);

    let task = tokio::spawn(
        async move {
            let mut events = futures::stream::select(stream, should_put_on_wire_receiver);

            while let Some(event) = events.next().await {
                match event {
                    Event::PleasePutThisOnWire((message, ack)) => {
                        let result = sink.send(message).await;
                        let failed = result.is_err();

                        // The writer may have stopped waiting.
                        let _ = ack.send(result);

                        if failed {
                            error!("Serial port error in send, exiting");
                            return;
                        }
                    }
                    Event::ThisCameFromWire(Ok(message)) => {
                        trace!(
                            "Message from port: `{:?}`",
                            &message[..message.len().min(32)]
                        );

                        match broadcast_tx.send(TransportEvent::Data(SerialMessage::new_lossy(
                            message,
                        ))) {
                            Ok(listeners) => {
                                trace!("Broadcasted message to {listeners} listener(s)")
                            }
                            Err(_) => {
                                trace!("Nobody listening to inbound data")
                            }
                        }
                    }
                    Event::ThisCameFromWire(Err(e)) => {
                        error!(?e, "Serial port error, exiting");
                        let _ = broadcast_tx.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
            }

            warn!("Serial port stream ended");
            let _ = broadcast_tx.send(TransportEvent::Error(
                TransportError::Disconnected.to_string(),
            ));
        }
        .instrument(tty_span),
    );

    Link { outgoing, task }
}

impl Transport for SerialTransport {
    fn path(&self) -> &str {
        &self.inner.path
    }

    fn open(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let inner = Arc::clone(&self.inner);

        async move {
            info!(
                path = %inner.path,
                baud = %inner.baud,
                flow_control = ?inner.flow_control,
                "Opening serial port"
            );

            let serial_stream = try_create_serial_port(&inner)?;
            let link = spawn_io(&inner, serial_stream);

            if let Some(previous) = inner.link().replace(link) {
                debug!("Replacing previous link");
                previous.task.abort();
            }

            Ok(())
        }
        .boxed()
    }

    fn close(&self) {
        if let Some(link) = self.inner.link().take() {
            info!(path = %self.inner.path, "Closing serial port");
            link.task.abort();
        }
    }

    fn write(&self, message: SerialMessage) -> BoxFuture<'static, Result<(), TransportError>> {
        let outgoing = self
            .inner
            .link()
            .as_ref()
            .map(|link| link.outgoing.clone());

        async move {
            let outgoing = outgoing.ok_or(TransportError::NotOpen)?;
            let (ack_tx, ack_rx) = oneshot::channel();

            outgoing
                .unbounded_send((message.into_bytes(), ack_tx))
                .map_err(|_| TransportError::Disconnected)?;

            ack_rx.await.map_err(|_| TransportError::Disconnected)?
        }
        .boxed()
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.broadcast_tx.subscribe()
    }
}

/// Creates [`SerialTransport`]s sharing the same line settings.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    flow_control: FlowControl,
    codec: LinesCodec,
}

impl SerialConnector {
    /// A connector for ports with this flow control and framing.
    pub fn new(flow_control: FlowControl, codec: LinesCodec) -> Self {
        Self {
            flow_control,
            codec,
        }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(FlowControl::None, LinesCodec::default())
    }
}

impl Connector for SerialConnector {
    fn construct(&self, path: &str, baud_rate: u32) -> Arc<dyn Transport> {
        Arc::new(
            SerialTransportBuilder::new(path)
                .set_baud(baud_rate)
                .set_flow_control(self.flow_control)
                .set_line_codec(self.codec.clone())
                .build(),
        )
    }
}
