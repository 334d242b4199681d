//! CLI argument parsing for promptcatalog

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::service::SourceFilter;

#[derive(Parser, Debug)]
#[command(name = "pc")]
#[command(author, version, about = "Layered catalog of prompt strategies", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List strategies
    List {
        /// Only strategies from this source
        #[arg(short, long, value_enum, default_value = "all")]
        source: SourceFilter,

        /// Only strategies in this collection
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a strategy document
    Show {
        /// Strategy key
        #[arg(required = true)]
        key: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List categories with their strategies
    Categories {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show catalog and cache health
    Health {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch the strategy directories and reload on change until Ctrl-C
    Watch,

    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommand {
    /// Create an empty collection
    Create {
        /// Collection key (letters, digits, '_' or '-')
        #[arg(required = true)]
        key: String,

        /// Display name (defaults to the key)
        #[arg(short, long)]
        name: Option<String>,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Delete a collection
    Delete {
        #[arg(required = true)]
        key: String,
    },

    /// Add a strategy to a collection
    Add {
        #[arg(required = true)]
        key: String,

        /// Strategy key
        #[arg(required = true)]
        strategy: String,
    },

    /// Remove a strategy from a collection
    Remove {
        #[arg(required = true)]
        key: String,

        /// Strategy key
        #[arg(required = true)]
        strategy: String,
    },

    /// Change a collection's name or description
    Update {
        #[arg(required = true)]
        key: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List collections
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a collection and its strategies
    Show {
        #[arg(required = true)]
        key: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Report strategy keys the catalog does not know
    Validate {
        #[arg(required = true)]
        key: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Write all collections as JSON to stdout or a file
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all collections with a previously exported file
    Import {
        #[arg(required = true)]
        file: PathBuf,
    },
}
