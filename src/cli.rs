use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::util::parse_duration;

#[derive(Parser, Debug)]
#[command(name = "gator", about = "Command-line RSS aggregator", version)]
pub struct Cli {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Every command gator understands. Dispatched by [`crate::commands::execute`].
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },

    /// Switch the current user
    Login { name: String },

    /// List users
    Users,

    /// Delete all users, feeds and posts
    Reset,

    /// Register a feed under the current user
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },

    /// List registered feeds
    Feeds,

    /// Poll feeds forever, one per interval (e.g. 30s, 1m, 1h30m)
    Agg {
        #[arg(value_parser = parse_duration)]
        interval: Option<Duration>,
    },
}
