//! Command-line interface, parsed with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mediagate - backend-for-frontend for generative media providers
#[derive(Debug, Parser)]
#[command(name = "mediagate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to load instead of searching the default locations
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand, Default, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    #[default]
    Serve,

    /// Create the default config file
    Init,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> &Commands {
        static SERVE: Commands = Commands::Serve;
        self.command.as_ref().unwrap_or(&SERVE)
    }
}
