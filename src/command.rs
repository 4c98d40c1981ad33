use std::{fmt::Debug, sync::Arc};

use itertools::Itertools;

use crate::{hooks::Hooks, registry::CommandRegistry, response::Responder};

mod param;

pub use param::ParamSpec;

/// The function implementing a command.
pub type Handler<C> = Arc<dyn Fn(Invocation<'_, C>) + Send + Sync>;

/// Everything a handler gets when its command is invoked.
pub struct Invocation<'r, C> {
    /// The primary name of the invoked command,
    /// regardless of which alias was typed.
    pub name: &'r str,

    /// Positional arguments, i.e. the tokens after the command name.
    pub args: Vec<String>,

    /// The shared context commands act upon.
    pub context: C,

    /// The registry which dispatched the command.
    pub registry: &'r CommandRegistry<C>,

    /// Where the handler answers. Should be used exactly once.
    pub responder: Responder,
}

impl<'r, C> Invocation<'r, C> {
    /// The argument at this position, if given.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// A handle to the registry's hook bus.
    pub fn hooks(&self) -> Hooks {
        self.registry.hooks()
    }
}

/// A command: its aliases, its parameters, and its handler.
///
/// The first alias is the primary name.
/// It is the registry key and the name given in every response the command produces.
pub struct CommandDescriptor<C> {
    aliases: Vec<String>,
    params: Vec<ParamSpec>,
    handler: Handler<C>,
}

impl<C> Clone for CommandDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            aliases: self.aliases.clone(),
            params: self.params.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> Debug for CommandDescriptor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<C> CommandDescriptor<C> {
    /// The primary name.
    pub fn name(&self) -> &str {
        // Builders always start from a primary name.
        &self.aliases[0]
    }

    /// All names this command answers to, primary name first.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The declared parameters.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Does this command answer to the given name?
    pub fn answers_to(&self, token: &str) -> bool {
        self.aliases.iter().any(|alias| alias == token)
    }

    /// E.g. `write/w/send <message: string...>`.
    pub fn usage(&self) -> String {
        let aliases = self.aliases.join("/");

        if self.params.is_empty() {
            aliases
        } else {
            format!("{aliases} {}", self.params.iter().join(" "))
        }
    }

    /// Run the handler.
    pub fn invoke(
        &self,
        registry: &CommandRegistry<C>,
        context: C,
        args: Vec<String>,
        responder: Responder,
    ) {
        (self.handler)(Invocation {
            name: self.name(),
            args,
            context,
            registry,
            responder,
        })
    }
}

/// Builder for a [`CommandDescriptor`].
#[derive(Debug)]
pub struct CommandBuilder {
    aliases: Vec<String>,
    params: Vec<ParamSpec>,
}

impl CommandBuilder {
    /// Start a new builder.
    /// The name given here is the primary name.
    pub fn new(name: &str) -> Self {
        Self {
            aliases: vec![name.into()],
            params: vec![],
        }
    }

    /// Add an alternative name.
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a [`ParamSpec`]. Order of calls is the positional order.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Finish the command with its handler.
    #[must_use]
    pub fn build<C, F>(self, handler: F) -> CommandDescriptor<C>
    where
        F: Fn(Invocation<'_, C>) + Send + Sync + 'static,
    {
        CommandDescriptor {
            aliases: self.aliases,
            params: self.params,
            handler: Arc::new(handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn noop() -> CommandDescriptor<()> {
        CommandBuilder::new("write")
            .alias("w")
            .alias("send")
            .param(ParamSpec::required("message", "string"))
            .param(ParamSpec::optional("times", "number"))
            .build(|invocation| invocation.responder.ok::<&str>(&[]))
    }

    #[test]
    fn usage_joins_aliases_and_params() {
        assert_eq!(
            noop().usage(),
            "write/w/send <message: string> [times: number]"
        );
    }

    #[test]
    fn usage_without_params_is_only_aliases() {
        let command: CommandDescriptor<()> = CommandBuilder::new("close")
            .alias("stop")
            .build(|invocation| invocation.responder.ok::<&str>(&[]));

        assert_eq!(command.usage(), "close/stop");
    }

    #[test]
    fn first_alias_is_the_name() {
        let command = noop();

        assert_eq!(command.name(), "write");
        assert!(command.answers_to("send"));
        assert!(!command.answers_to("open"));
    }
}
