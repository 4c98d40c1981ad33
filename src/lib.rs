#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

/// Parameters, descriptors and invocations of commands.
pub mod command;

/// The built-in commands: connection lifecycle, help and quit.
pub mod commands;

/// Looks up and dispatches commands by name or alias.
pub mod registry;

/// Named broadcast points for connection events.
pub mod hooks;

/// The structured responses of commands, and how they are delivered.
pub mod response;

/// The state shared by the lifecycle commands.
pub mod connection;

/// Byte-stream devices the lifecycle commands drive.
pub mod transport;

/// The line-driven front end.
pub mod shell;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;
