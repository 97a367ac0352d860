//! CLI command definitions and parsing
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "reviewlens",
    version,
    author = "neur0map",
    about = "Ask natural-language questions about your customer reviews",
    long_about = "ReviewLens turns a business owner's question into rating and date filters, \
                  retrieves matching reviews with hybrid dense/sparse search, and answers \
                  from those reviews, either at once or as a stream of events."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/reviewlens/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question about the reviews
    Ask {
        /// Question to ask
        question: String,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,

        /// Print the response (or events) as JSON
        #[arg(long)]
        json: bool,

        /// Date to resolve relative time phrases against (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,

        /// Send the question to a running `reviewlens serve` instance
        #[arg(long)]
        remote: bool,
    },

    /// Show the reviews a question would retrieve, without generating an answer
    Search {
        /// Search query text
        query: String,

        /// Date to resolve relative time phrases against (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Review counts per rating for the last week, month and year
    Stats {
        /// Show results in JSON format
        #[arg(long)]
        json: bool,

        /// Ask a running server instead of querying the store directly
        #[arg(long)]
        remote: bool,
    },

    /// Run the query server on a Unix socket
    Serve,

    /// Show query server status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

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
