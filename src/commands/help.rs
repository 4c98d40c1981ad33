use tracing::debug;

use crate::{
    command::{CommandBuilder, CommandDescriptor, Invocation, ParamSpec},
    response::NO_COMMAND,
};

/// `help/h [command]`.
///
/// Without an argument, one usage line per command.
/// With one, the usage line of that command, or an error if there is no such command.
pub fn help<C: 'static>() -> CommandDescriptor<C> {
    CommandBuilder::new("help")
        .alias("h")
        .param(ParamSpec::optional("command", "string"))
        .build(|invocation| {
            let Invocation {
                args,
                registry,
                responder,
                ..
            } = invocation;

            match args.first().filter(|name| !name.is_empty()) {
                None => {
                    let lines = registry
                        .commands()
                        .map(|command| command.usage())
                        .collect::<Vec<_>>();

                    responder.ok(&lines)
                }
                Some(name) => match registry.try_resolve(name) {
                    Ok(command) => responder.ok(&[command.usage()]),
                    Err(e) => {
                        debug!(%e, "Help for unknown command");
                        responder.error(format!("{NO_COMMAND} {name}"))
                    }
                },
            }
        })
}

/// `quit/q/exit`. Asks the front end to end the session.
pub fn quit<C: 'static>() -> CommandDescriptor<C> {
    CommandBuilder::new("quit")
        .alias("q")
        .alias("exit")
        .build(|invocation| invocation.responder.quit())
}
