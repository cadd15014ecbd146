//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley - local-first chat assistant
#[derive(Parser, Debug)]
#[command(name = "parleyctl")]
#[command(about = "Parley - local-first chat assistant with remote fallback", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (overrides ~/.config/parley/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User whose profile facts are used (defaults to $USER)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Never call the remote model
    #[arg(long, global = true)]
    pub local_only: bool,

    /// Log to stderr at the configured level instead of warnings only
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand (if not provided, starts an interactive chat)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Interactive chat session
    Chat,

    /// Answer a single question and exit
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Teach a local response
    Train {
        /// Utterance to recognize
        pattern: String,
        /// Response to give
        response: String,
    },

    /// Merge near-duplicate learned patterns
    Dedup {
        /// Pattern record (defaults to the configured one)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        save: bool,
    },
}
