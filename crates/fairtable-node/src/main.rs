use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod autopilot;
mod cli;
mod config;
mod dealer;
mod node;
mod simulate;

use cli::{Cli, Commands};
use config::{generate_sample_config, generate_table_configs, NodeConfig};
use node::TableNode;
use simulate::{print_reports, simulate, SimulationConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }
        Commands::Init { output, table } => {
            init_config(output, table)?;
        }
        Commands::Keygen { output } => {
            generate_keypair(output)?;
        }
        Commands::Status { endpoint } => {
            show_status(&endpoint).await?;
        }
        Commands::Simulate {
            players,
            rounds,
            stack,
            bet,
        } => {
            let reports = simulate(SimulationConfig {
                players,
                rounds,
                stack,
                opening_bet: bet,
                round_timeout: Duration::from_secs(10),
            })
            .await?;
            print_reports(&reports);
        }
    }

    Ok(())
}

/// Run a table member
async fn run_node(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        error!(
            "Configuration file not found: {:?}. Run 'fairtable init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    };

    let node = TableNode::new(config)?;
    node.run().await?;

    Ok(())
}

fn seat_path(output: &Path, seat: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    output.with_file_name(format!("{}-{}.json", stem, seat))
}

/// Write a sample configuration, or one per seat of a localhost table
fn init_config(output: PathBuf, table: Option<usize>) -> Result<()> {
    let Some(seats) = table else {
        info!("Generating sample configuration");
        let config = generate_sample_config();
        config.save(&output)?;

        println!("\nConfiguration file created: {}", output.display());
        println!("Edit the roster so every member's key and address are filled in.");
        println!("\nTo start the node, run:");
        println!("  fairtable run --config {}", output.display());
        return Ok(());
    };

    if seats < 2 {
        return Err(anyhow::anyhow!("A table needs at least two seats"));
    }
    for (seat, config) in generate_table_configs(seats, 9000, 1_000).into_iter().enumerate() {
        let path = seat_path(&output, seat);
        config.save(&path)?;
        println!("Seat {}: {} ({})", seat, path.display(), config.listen_addr);
    }
    println!("\nStart every seat with: fairtable run --config <file>");

    Ok(())
}

/// Generate a new keypair
fn generate_keypair(output: Option<PathBuf>) -> Result<()> {
    let keypair = fairtable_core::KeyPair::generate();

    println!("Generated new keypair:");
    println!("  Public key:  {}", keypair.public.to_hex());
    println!("  Secret key:  {}", keypair.secret.to_hex());

    if let Some(path) = output {
        std::fs::write(&path, keypair.secret.to_hex())?;
        info!("Secret key saved to {:?}", path);
    }

    println!("\nWARNING: Keep your secret key safe! Do not share it with anyone.");

    Ok(())
}

/// Show node status
async fn show_status(endpoint: &str) -> Result<()> {
    let url = format!("{}/status", endpoint.trim_end_matches('/'));

    let response = reqwest::get(&url).await?;

    if response.status().is_success() {
        let status: fairtable_consensus::NodeStatus = response.json().await?;
        println!("Node Status:");
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        error!("Failed to get status: {}", response.status());
    }

    Ok(())
}
