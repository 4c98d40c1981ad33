use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    command::CommandDescriptor,
    error::Error,
    hooks::{HookBus, HookId, Hooks},
    response::{CommandResponse, PendingResponse, Responder},
};

/// Owns the commands, resolves names to them, and dispatches input lines.
///
/// Also owns the [`HookBus`] commands publish on.
pub struct CommandRegistry<C> {
    // Registration order is kept, it's the order of help output.
    commands: Vec<CommandDescriptor<C>>,
    hooks: Hooks,
}

impl<C> std::fmt::Debug for CommandRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandRegistry<C> {
    /// A registry without commands.
    pub fn new() -> Self {
        Self::with_hooks(Arc::new(HookBus::new()))
    }

    /// A registry without commands which publishes on the given bus.
    pub fn with_hooks(hooks: Hooks) -> Self {
        Self {
            commands: vec![],
            hooks,
        }
    }

    /// Add a command.
    ///
    /// Fails if the primary name is taken, or if any alias would
    /// resolve to more than one command.
    pub fn register(
        &mut self,
        descriptor: CommandDescriptor<C>,
    ) -> Result<&CommandDescriptor<C>, Error> {
        if self.get(descriptor.name()).is_some() {
            return Err(Error::DuplicatePrimaryName(descriptor.name().into()));
        }

        for (index, alias) in descriptor.aliases().iter().enumerate() {
            let clash = self
                .resolve(alias)
                .map(|owner| owner.name().to_owned())
                .or_else(|| {
                    // Also within the descriptor itself.
                    descriptor.aliases()[..index]
                        .contains(alias)
                        .then(|| descriptor.name().to_owned())
                });

            if let Some(owner) = clash {
                return Err(Error::DuplicateAlias {
                    alias: alias.clone(),
                    owner,
                });
            }
        }

        debug!(usage = %descriptor.usage(), "Registering command");

        self.commands.push(descriptor);
        let index = self.commands.len() - 1;

        Ok(&self.commands[index])
    }

    /// Get a command by its primary name only.
    pub fn get(&self, name: &str) -> Option<&CommandDescriptor<C>> {
        self.commands.iter().find(|command| command.name() == name)
    }

    /// Find the command answering to this name or alias.
    pub fn resolve(&self, token: &str) -> Option<&CommandDescriptor<C>> {
        self.commands
            .iter()
            .find(|command| command.answers_to(token))
    }

    /// Like [`CommandRegistry::resolve`], but an unknown name is an error.
    pub fn try_resolve(&self, token: &str) -> Result<&CommandDescriptor<C>, Error> {
        self.resolve(token)
            .ok_or_else(|| Error::CommandNotFound(token.into()))
    }

    /// The names of all commands in registration order.
    /// Either only primary names, or every alias of every command.
    pub fn names(&self, primary_only: bool) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().flat_map(move |command| {
            let aliases = if primary_only {
                &command.aliases()[..1]
            } else {
                command.aliases()
            };

            aliases.iter().map(String::as_str)
        })
    }

    /// All commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandDescriptor<C>> + '_ {
        self.commands.iter()
    }

    /// Run an input line.
    ///
    /// The line is split on single spaces: the first token is the command name,
    /// the rest are positional arguments. There is no quoting or escaping.
    ///
    /// An unknown command (including the empty line) resolves immediately to
    /// [`CommandResponse::no_command`] without running any handler.
    pub fn dispatch(&self, line: &str, context: C) -> PendingResponse {
        let mut tokens = line.split(' ');
        let token = tokens.next().unwrap_or_default();

        let Some(command) = self.resolve(token) else {
            debug!(%token, "No such command");
            return PendingResponse::ready(CommandResponse::no_command());
        };

        let args = tokens.map(ToOwned::to_owned).collect::<Vec<_>>();
        debug!(command = %command.name(), ?args, "Dispatching");

        let (responder, pending) = Responder::new(Some(command.name()));
        command.invoke(self, context, args, responder);

        trace!(command = %command.name(), "Handler returned");
        pending
    }

    /// A handle to the hook bus.
    pub fn hooks(&self) -> Hooks {
        Arc::clone(&self.hooks)
    }

    /// Listen to an event on the hook bus.
    pub fn on_event<F>(&self, event: &str, listener: F) -> HookId
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.hooks.subscribe(event, listener)
    }

    /// Publish an event on the hook bus.
    pub fn fire_hook<S: AsRef<str>>(&self, event: &str, data: &[S]) -> usize {
        self.hooks.publish(event, data)
    }
}
