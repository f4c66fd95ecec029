//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "commsift",
    version,
    author = "neur0map",
    about = "Chat export ingestion and incident risk analysis",
    long_about = "Commsift ingests exported conversations (WhatsApp, Slack, Skype, EML, MBOX), \
                  normalizes them into one message model, and runs a scoring, flagging, \
                  correlation and timeline pipeline that produces a single risk summary per case."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/commsift/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full analysis over a set of export files
    Analyze {
        /// Export files, in upload order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Opaque case identifier attached to logs
        #[arg(long, default_value = "default")]
        case: String,

        /// Ignore and do not update the result cache
        #[arg(long)]
        no_cache: bool,

        /// Write the JSON result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Profile to use (e.g., "strict")
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show the detected platform of each file
    Detect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Parse files and print the platform-keyed grouping
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write the JSON result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the fileset fingerprint and per-file hashes
    Fingerprint {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
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
