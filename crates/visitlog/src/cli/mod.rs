//! Command-line interface for visitlog.
//!
//! This module provides the CLI structure and command handlers for the
//! `visitlog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DepartCommand, FindCommand, RegisterCommand, ServeCommand, SignatureCommand,
};

/// visitlog - Register visitor arrivals and departures
///
/// Records visits in a SharePoint list and keeps a local copy when the list
/// cannot be reached.
#[derive(Debug, Parser)]
#[command(name = "visitlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Register a visitor arrival
    Register(RegisterCommand),

    /// Record a visitor departure
    Depart(DepartCommand),

    /// Look up a locally stored visitor
    Find(FindCommand),

    /// Render a signature stroke file to PNG
    Signature(SignatureCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
