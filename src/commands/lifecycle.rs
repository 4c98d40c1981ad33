//! The commands driving the connection through its states:
//! unconfigured, `set` → configured, `open` → open, `close` → unconfigured.
//!
//! `open` and `write` complete on a spawned task, so dispatching them
//! requires a tokio runtime.

use std::sync::Arc;

use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, info_span, trace, warn, Instrument};

use super::messages::{
    missing_argument, ALREADY_CLOSED, ALREADY_STARTED, NOT_READY, NO_DEVICE_SET, SUPERSEDED,
};
use crate::{
    command::{CommandBuilder, CommandDescriptor, Invocation, ParamSpec},
    connection::Connection,
    hooks::{names, Hooks},
    transport::{Connector, TransportEvent},
};

/// Republish inbound transport events as `read` and `error` hooks.
fn forward(events: broadcast::Receiver<TransportEvent>, hooks: Hooks) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(events);

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(TransportEvent::Data(message)) => {
                    trace!(%message, "Inbound");
                    hooks.publish(names::READ, &[message.as_str()]);
                }
                Ok(TransportEvent::Error(e)) => {
                    warn!(%e, "Transport error");
                    hooks.publish(names::ERROR, &[e]);
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(%missed, "Fell behind on inbound events")
                }
            }
        }

        trace!("Transport events ended");
    })
}

/// `set <device>`: choose the device and construct its transport, without opening it.
///
/// A previous transport is closed first.
pub fn set(connector: Arc<dyn Connector>, baud_rate: u32) -> CommandDescriptor<Connection> {
    CommandBuilder::new("set")
        .param(ParamSpec::required("device", "string"))
        .build(move |invocation: Invocation<'_, Connection>| {
            let Invocation {
                args,
                context,
                registry,
                responder,
                ..
            } = invocation;

            let Some(device) = args.into_iter().next().filter(|device| !device.is_empty()) else {
                return responder.precondition(missing_argument("device"));
            };

            let transport = connector.construct(&device, baud_rate);

            {
                let mut context = context.lock();
                context.teardown();

                context.device = device.clone();
                context.transport = Some(transport);
                context.initialized = true;
                context.ready = false;
            }

            info!(%device, %baud_rate, "Device set");
            registry.fire_hook(names::SET, &[&device]);

            responder.ok(&[device])
        })
}

/// `open/start`: open the transport of the device given to `set`.
///
/// Responds once the transport reports back, which may be never.
pub fn open() -> CommandDescriptor<Connection> {
    CommandBuilder::new("open")
        .alias("start")
        .build(|invocation: Invocation<'_, Connection>| {
            let Invocation {
                context,
                registry,
                responder,
                ..
            } = invocation;

            let (transport, generation, device) = {
                let context = context.lock();

                if context.ready {
                    return responder.precondition(ALREADY_STARTED);
                }

                match (&context.transport, context.initialized) {
                    (Some(transport), true) => (
                        Arc::clone(transport),
                        context.generation,
                        context.device.clone(),
                    ),
                    _ => return responder.precondition(NO_DEVICE_SET),
                }
            };

            let hooks = registry.hooks();

            // Subscribed before opening, so nothing arriving right after is missed.
            let events = transport.events();
            let span = info_span!("open", path = %device);

            tokio::spawn(
                async move {
                    if let Err(e) = transport.open().await {
                        warn!(%e, "Could not open");
                        return responder.error(e);
                    }

                    {
                        let mut context = context.lock();

                        if context.generation != generation {
                            drop(context);
                            warn!("Device changed while opening, discarding");
                            transport.close();
                            return responder.error(SUPERSEDED);
                        }

                        // Another open of the same transport got there first.
                        if context.ready {
                            drop(context);
                            debug!("Already opened by an earlier open");
                            return responder.precondition(ALREADY_STARTED);
                        }

                        context.ready = true;
                        if let Some(previous) = context
                            .forwarder
                            .replace(forward(events, Arc::clone(&hooks)))
                        {
                            previous.abort();
                        }
                    }

                    info!("Opened");
                    hooks.publish(names::OPEN, &[&device]);

                    responder.ok(&[device])
                }
                .instrument(span),
            );
        })
}

/// `close/stop`: close the transport and forget it.
/// A new `set` is needed before the next `open`.
pub fn close() -> CommandDescriptor<Connection> {
    CommandBuilder::new("close")
        .alias("stop")
        .build(|invocation: Invocation<'_, Connection>| {
            let Invocation {
                context,
                registry,
                responder,
                ..
            } = invocation;

            let device = {
                let mut context = context.lock();

                if !(context.initialized && context.ready) {
                    return responder.precondition(ALREADY_CLOSED);
                }

                context.teardown();
                context.device.clone()
            };

            info!(%device, "Closed");
            registry.fire_hook(names::CLOSE, &[&device]);

            responder.ok(&[device])
        })
}

/// `write/w/send <message...>`: put the arguments, joined by single spaces, on the wire.
pub fn write() -> CommandDescriptor<Connection> {
    CommandBuilder::new("write")
        .alias("w")
        .alias("send")
        .param(ParamSpec::required("message", "string..."))
        .build(|invocation: Invocation<'_, Connection>| {
            let Invocation {
                args,
                context,
                registry,
                responder,
                ..
            } = invocation;

            let (transport, device) = {
                let context = context.lock();

                match (&context.transport, context.initialized && context.ready) {
                    (Some(transport), true) => (Arc::clone(transport), context.device.clone()),
                    _ => return responder.precondition(NOT_READY),
                }
            };

            if args.is_empty() {
                return responder.precondition(missing_argument("message"));
            }

            let message = args.join(" ");
            let hooks = registry.hooks();

            tokio::spawn(
                async move {
                    match transport.write(message.as_str().into()).await {
                        Ok(()) => {
                            trace!(%message, "Written");
                            hooks.publish(names::WRITE, &[&message]);

                            responder.ok(&[message])
                        }
                        Err(e) => {
                            warn!(%e, "Could not write");
                            responder.error(e)
                        }
                    }
                }
                .instrument(info_span!("write", path = %device)),
            );
        })
}
