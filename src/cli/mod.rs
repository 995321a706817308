//! CLI module - Command-line interface for geodata
//!
//! Serving the API and provisioning accounts share one binary.

pub mod commands;

use clap::{Parser, Subcommand};

/// geodata - Country, subdivision and city reference API
#[derive(Parser)]
#[command(name = "geodata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API until interrupted
    #[command(alias = "daemon", alias = "-d", alias = "--daemon")]
    Serve,

    /// Write a default config.toml with a fresh token secret
    #[command(alias = "--init")]
    Init,

    /// Manage API user accounts
    #[command(alias = "u")]
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user (prompts for the password when --password is omitted)
    Create {
        /// Username, 1-64 characters
        username: String,

        /// Password, 1-256 characters
        #[arg(long)]
        password: Option<String>,

        /// Create the account disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Delete a user
    #[command(alias = "rm")]
    Delete { username: String },

    /// Allow a user to log in
    Enable { username: String },

    /// Block a user from logging in
    Disable { username: String },

    /// Change a user's password after verifying the current one
    Password {
        username: String,

        #[arg(long)]
        current: Option<String>,

        #[arg(long = "new")]
        new_password: Option<String>,
    },

    /// List all users
    #[command(alias = "ls")]
    List,
}
