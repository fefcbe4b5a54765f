//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

/// Command-line client for the Gymlog fitness backend.
#[derive(Parser, Debug)]
#[command(name = "gymlog", version, about)]
pub struct Cli {
    /// Settings file (TOML or JSON); defaults to ./gymlog.toml if present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, overriding the settings
    #[arg(long, global = true)]
    pub base_url: Option<Url>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sign in and remember the session
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    SignUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    SignOut,
    /// Show the signed-in user
    Whoami,
    /// List muscle groups
    Groups,
    /// List the exercises of a muscle group
    Exercises {
        #[arg(long)]
        group: String,
    },
    /// Show one exercise
    Exercise {
        #[arg(long)]
        id: u64,
    },
    /// Log an exercise as done
    Done {
        #[arg(long)]
        id: u64,
    },
    /// Show completed exercises by day
    History,
    /// Update the profile
    Profile {
        #[arg(long)]
        name: String,
        #[arg(long, requires = "old_password")]
        password: Option<String>,
        #[arg(long, requires = "password")]
        old_password: Option<String>,
    },
}

impl Command {
    /// Commands that only make sense with a stored session.
    pub const fn needs_session(&self) -> bool {
        !matches!(
            self,
            Self::SignIn { .. } | Self::SignUp { .. } | Self::SignOut
        )
    }
}
