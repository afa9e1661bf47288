use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fairtable - dealerless poker action consensus
#[derive(Parser)]
#[command(name = "fairtable")]
#[command(about = "Fairtable node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a table member over HTTP
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Write a sample configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Write one config per seat (`<output-stem>-<seat>.json`) for a localhost table of this size
        #[arg(long)]
        table: Option<usize>,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file for secret key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show node status
    Status {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:9000")]
        endpoint: String,
    },

    /// Play a whole table in one process
    Simulate {
        /// Number of players
        #[arg(short, long, default_value = "4")]
        players: usize,

        /// Consensus rounds to play
        #[arg(short, long, default_value = "40")]
        rounds: u64,

        /// Starting stack per player
        #[arg(short, long, default_value = "1000")]
        stack: u64,

        /// Opening bet of each hand
        #[arg(long, default_value = "10")]
        bet: u64,
    },
}
