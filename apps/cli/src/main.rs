//! FlightGuard CLI
//!
//! Identity management and the relay node daemon.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use flightguard_core::Id;
use flightguard_crypto::Identity;
use flightguard_keystore::{
    default_key_path, expand_path, load_identity, load_or_generate_identity, save_identity,
};
use flightguard_relay::{RelayConfig, RelayNode, RelayService, UdpTransport};
use flightguard_settings::{default_settings_path, Settings};

/// FlightGuard - secure aircraft relay
#[derive(Parser)]
#[command(name = "flightguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Settings file (defaults to ~/.flightguard/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new node identity
    Keygen {
        /// Identity file
        #[arg(short, long)]
        keyfile: Option<PathBuf>,

        /// Overwrite an existing identity
        #[arg(long)]
        force: bool,
    },

    /// Show this node's public identity
    Identity {
        /// Identity file
        #[arg(short, long)]
        keyfile: Option<PathBuf>,
    },

    /// Run a relay node until interrupted
    Run {
        /// UDP listen address (overrides settings)
        #[arg(short, long)]
        listen: Option<String>,

        /// Identity file (overrides settings)
        #[arg(short, long)]
        keyfile: Option<PathBuf>,

        /// Extra bootstrap neighbors (format: "aircraft_id_hex@host:port")
        #[arg(short, long)]
        bootstrap: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    flightguard_logging::init(cli.verbose)
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let settings = Settings::load_from(&settings_path).context("Failed to load settings")?;

    match cli.command {
        Commands::Keygen { keyfile, force } => {
            keygen(&resolve_keyfile(keyfile, &settings), force)?;
        }
        Commands::Identity { keyfile } => {
            show_identity(&resolve_keyfile(keyfile, &settings))?;
        }
        Commands::Run {
            listen,
            keyfile,
            bootstrap,
        } => {
            run_node(&settings, listen, resolve_keyfile(keyfile, &settings), &bootstrap).await?;
        }
    }

    Ok(())
}

/// CLI flag, then settings, then the keystore default
fn resolve_keyfile(flag: Option<PathBuf>, settings: &Settings) -> PathBuf {
    match (flag, &settings.node.keyfile) {
        (Some(path), _) => expand_path(&path.to_string_lossy()),
        (None, Some(path)) => expand_path(path),
        (None, None) => default_key_path(),
    }
}

// ============================================================================
// Identity
// ============================================================================

fn keygen(keyfile: &PathBuf, force: bool) -> Result<()> {
    if keyfile.exists() && !force {
        bail!(
            "Identity already exists at {:?} (use --force to replace it)",
            keyfile
        );
    }

    let identity = Identity::generate();
    save_identity(&identity, keyfile).context("Failed to save identity")?;

    println!("Generated identity at {:?}", keyfile);
    print_identity(&identity);
    Ok(())
}

fn show_identity(keyfile: &PathBuf) -> Result<()> {
    let identity = load_identity(keyfile).context("Failed to load identity")?;

    println!("FlightGuard Node Identity");
    println!("=========================");
    print_identity(&identity);
    println!("Keyfile:         {:?}", keyfile);
    Ok(())
}

fn print_identity(identity: &Identity) {
    println!("Aircraft ID:     {}", hex::encode(identity.aircraft_id()));
    println!("Exchange public: {}", hex::encode(identity.exchange_public()));
}

// ============================================================================
// Node
// ============================================================================

async fn run_node(
    settings: &Settings,
    listen: Option<String>,
    keyfile: PathBuf,
    bootstrap: &[String],
) -> Result<()> {
    let identity = load_or_generate_identity(&keyfile).context("Failed to load identity")?;
    info!(
        "Starting FlightGuard node {}",
        hex::encode(&identity.aircraft_id()[..8])
    );

    let listen = listen.unwrap_or_else(|| settings.node.listen_addr.clone());
    let transport = UdpTransport::bind(listen.as_str())
        .await
        .context("Invalid listen address")?;

    let config = RelayConfig {
        latency_threshold_ms: settings.relay.latency_threshold_ms,
        verify_payload_hash: settings.relay.verify_payload_hash,
    };
    let node = Arc::new(RelayNode::new(identity, transport, config));

    // Seed and probe bootstrap neighbors
    let mut neighbors = Vec::new();
    for neighbor in &settings.network.bootstrap_neighbors {
        neighbors.push((neighbor.id()?, neighbor.addr.clone()));
    }
    neighbors.extend(parse_bootstrap_neighbors(bootstrap)?);

    for (id, addr) in neighbors {
        match resolve(&addr).await {
            Ok(addr) => {
                node.add_neighbor(id, addr);
                if let Err(e) = node.send_ping(&id).await {
                    warn!("Failed to ping bootstrap neighbor {}: {}", addr, e);
                }
            }
            Err(e) => warn!("Skipping bootstrap neighbor {}: {}", addr, e),
        }
    }

    let service = RelayService::new(node.clone(), settings.relay.monitor_interval());
    info!("Node running on {}. Press Ctrl+C to stop.", listen);

    service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Known neighbors at shutdown: {}", node.neighbors().len());
    Ok(())
}

/// Parse bootstrap neighbor strings in format "aircraft_id_hex@host:port"
fn parse_bootstrap_neighbors(neighbors: &[String]) -> Result<Vec<(Id, String)>> {
    let mut result = Vec::new();
    for neighbor in neighbors {
        let Some((id_hex, addr)) = neighbor.split_once('@') else {
            bail!(
                "Invalid bootstrap neighbor '{}': expected aircraft_id@host:port",
                neighbor
            );
        };
        let bytes = hex::decode(id_hex)
            .with_context(|| format!("Invalid aircraft id in '{}'", neighbor))?;
        let id = Id::try_from(bytes.as_slice())
            .map_err(|_| anyhow::anyhow!("Aircraft id in '{}' must be 32 bytes", neighbor))?;
        result.push((id, addr.to_string()));
    }
    Ok(result)
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("Failed to resolve {}", addr))?
        .next()
        .with_context(|| format!("No address for {}", addr))
}
