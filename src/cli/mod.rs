//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "archivist",
    version,
    about = "Grounded question answering over a private document corpus",
    long_about = "Archivist indexes a directory of documents, retrieves passages with hybrid \
                  lexical and semantic search fused by reciprocal rank, and answers questions \
                  from those passages only, judging each answer for faithfulness and relevancy."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/archivist/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or rebuild the index from the documents directory
    Index {
        /// Directory to index (defaults to the configured documents directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Allowed file extensions (repeatable; defaults to the configured set)
        #[arg(short, long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },

    /// Copy source files into the documents directory
    Upload {
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask one question and persist the exchange
    Ask {
        /// Question to ask
        question: String,

        /// Continue an existing session (defaults to a new one)
        #[arg(short, long)]
        session: Option<String>,

        /// Show the exchange in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat (type /new for a fresh session, /quit to leave)
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage saved chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List sessions, most recent first
    List,

    /// Print a session transcript
    Show {
        /// Session ID
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
