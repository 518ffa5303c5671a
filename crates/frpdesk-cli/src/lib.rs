//! Command-line interface for frpdesk.
//!
//! A thin adapter over the core orchestrators: parse arguments, compose
//! the application in [`bootstrap`], dispatch to a handler, format output
//! for the terminal.

#![deny(unused_crate_dependencies)]

// tracing-subscriber is wired up in main.rs only
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod input;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{AppContext, CliConfig, bootstrap, compose};
pub use commands::{Commands, Selection, ServerCommand, TunnelCommand};
pub use error::CliError;
pub use parser::Cli;
