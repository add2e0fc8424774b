//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides configuration)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// Visitor identifier (cédula)
    #[arg(short, long)]
    pub identifier: String,

    /// Visitor name
    #[arg(short, long)]
    pub name: String,

    /// Visitor company
    #[arg(long)]
    pub company: String,

    /// Contact email
    #[arg(short, long)]
    pub email: String,

    /// Area being visited
    #[arg(short, long)]
    pub area: String,

    /// Service requested
    #[arg(short, long)]
    pub service: String,

    /// JSON file of signature stroke samples
    #[arg(long, value_name = "FILE")]
    pub signature: PathBuf,

    /// Visit date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,

    /// Arrival time, HH:MM (defaults to now)
    #[arg(long)]
    pub arrival: Option<String>,

    /// Request a visitor badge
    #[arg(long)]
    pub badge: bool,
}

/// Depart command arguments.
#[derive(Debug, Args)]
pub struct DepartCommand {
    /// Visitor identifier (cédula)
    pub identifier: String,

    /// Departure time, HH:MM (defaults to now)
    #[arg(short, long)]
    pub time: Option<String>,
}

/// Find command arguments.
#[derive(Debug, Args)]
pub struct FindCommand {
    /// Visitor identifier (cédula)
    pub identifier: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Signature command arguments.
#[derive(Debug, Args)]
pub struct SignatureCommand {
    /// JSON file of stroke samples
    pub strokes: PathBuf,

    /// Where to write the PNG
    #[arg(short, long, value_name = "FILE", default_value = "firma.png")]
    pub output: PathBuf,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
