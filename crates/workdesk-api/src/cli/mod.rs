//! CLI command definitions for the `wdesk` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod token;

use clap::{Parser, Subcommand};

use workdesk_types::identity::Role;

/// Run the Workdesk service and manage access tokens.
#[derive(Parser)]
#[command(name = "wdesk", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `server.port` in config.toml).
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage bearer tokens.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
pub enum TokenAction {
    /// Issue a token for a user. The plaintext is shown once.
    Issue {
        /// User the token authenticates as.
        #[arg(long)]
        user_id: i64,

        /// Role granted to the token.
        #[arg(long, default_value = "user")]
        role: Role,

        /// Free-form label to recognise the token later.
        #[arg(long)]
        label: Option<String>,
    },

    /// Revoke a token by id.
    Revoke {
        /// Token id printed by `token issue`.
        id: i64,
    },
}

impl Cli {
    /// Default tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,workdesk=debug",
            _ => "trace",
        }
    }
}
