use thiserror::Error;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A command with this primary name is already registered.
    #[error("A command named `{0}` is already registered")]
    DuplicatePrimaryName(String),

    /// An alias would resolve to more than one command.
    #[error("The alias `{alias}` is already used by the command `{owner}`")]
    DuplicateAlias {
        /// The clashing alias.
        alias: String,

        /// The primary name of the command already owning the alias.
        owner: String,
    },

    /// No command answers to this name.
    #[error("No command answers to `{0}`")]
    CommandNotFound(String),

    /// The configuration is not usable.
    #[error("Bad configuration. Problem: {0}")]
    BadConfig(String),

    /// IO related errors, e.g. when reading a config file.
    #[error("Underlying IO problem: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the problem description if this is a [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(problem) = self {
            Ok(problem)
        } else {
            Err(self)
        }
    }
}
