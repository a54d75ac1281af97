//! Command line of the `abot` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_SETTINGS: &str = "settings.bot.json";

#[derive(Parser)]
#[command(name = "abot")]
#[command(about = "Telegram bot dispatching commands and messages to pluggable processors")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a blank settings file, overwriting any existing one.
    Init {
        /// Settings file; relative paths are next to the executable.
        #[arg(short, long, default_value = DEFAULT_SETTINGS)]
        config: PathBuf,
    },

    /// Run the bot until the update stream ends or a processor fails.
    Run {
        /// Settings file; relative paths are next to the executable.
        #[arg(short, long, default_value = DEFAULT_SETTINGS)]
        config: PathBuf,

        /// Log progress (info level).
        #[arg(short, long)]
        verbose: bool,

        /// Log every parsed command and firewall decision (debug level).
        #[arg(short, long)]
        debug: bool,
    },
}
