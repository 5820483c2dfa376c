use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hive_crypto::Keypair;
use hive_node::{collaborators, config, logging, AppState, NodeConfig, RoundRunner, SignedRequest};
use hive_storage::{MemoryWorkStore, WorkStore};
use hive_types::RoundPayload;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hive")]
#[command(about = "Hive coordinator node - round work assignment, audits and payouts", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordinator HTTP API
    Start {
        /// Port for HTTP API
        #[arg(long)]
        api_port: Option<u16>,

        /// Task this node coordinates
        #[arg(long)]
        task_id: Option<String>,

        /// JSON file of work units to load at start-up
        #[arg(long)]
        units: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Generate a new keypair
    Keygen {
        /// Write the base58 secret key to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sign a round payload and print the request body for it
    Sign {
        /// Base58 secret key of the staking identity
        #[arg(long, env = "HIVE_SECRET_KEY", hide_env_values = true)]
        secret: String,

        /// JSON file holding the payload, including its `action` tag
        payload: PathBuf,
    },

    /// Audit every submission of a round and print the votes
    Audit {
        #[arg(short, long)]
        round: u64,
    },

    /// Audit a round, cross-check the leader's distribution list and print the payout
    Payout {
        #[arg(short, long)]
        round: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (ignore if it doesn't)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Priority order: CLI args > ENV vars > Config file > Defaults
    let mut node_config = load_config(cli.config.as_deref())?;
    node_config.apply_env_overrides();

    if let Err(e) = logging::init_logging(&node_config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Start {
            api_port,
            task_id,
            units,
        } => {
            if let Some(port) = api_port {
                node_config.api.port = port;
            }
            if let Some(task_id) = task_id {
                node_config.task.task_id = task_id;
            }
            if let Some(units) = units {
                node_config.node.units_file = Some(units);
            }
            start(node_config).await
        }
        Commands::Init { output } => {
            std::fs::create_dir_all(&output)?;
            let path = output.join(config::DEFAULT_CONFIG_FILE);
            NodeConfig::default().save_to_file(&path)?;
            info!(path = %path.display(), "📝 Configuration written");
            Ok(())
        }
        Commands::Keygen { output } => {
            let keypair = Keypair::generate();
            match output {
                Some(path) => {
                    std::fs::write(&path, keypair.to_base58())?;
                    println!("Secret key written to {}", path.display());
                }
                None => println!("Secret key: {}", keypair.to_base58()),
            }
            println!("Public key: {}", keypair.public_key());
            Ok(())
        }
        Commands::Sign { secret, payload } => {
            let keypair = Keypair::from_base58(secret.trim()).context("invalid secret key")?;
            let content = std::fs::read_to_string(&payload)
                .with_context(|| format!("reading {}", payload.display()))?;
            let payload: RoundPayload =
                serde_json::from_str(&content).context("payload is not a valid round payload")?;
            if payload.staking_key() != keypair.public_key() {
                warn!(
                    staking_key = %payload.staking_key(),
                    signer = %keypair.public_key(),
                    "Payload staking key differs from the signing key; the coordinator will reject it"
                );
            }

            let signature = hive_crypto::sign(&keypair, &payload)?;
            let request = SignedRequest::new(signature, payload.pub_key(), keypair.public_key());
            println!("{}", serde_json::to_string_pretty(&request)?);
            Ok(())
        }
        Commands::Audit { round } => {
            let runner = RoundRunner::from_config(&node_config)?;
            let votes = runner.audit(round).await?;
            for (key, tally) in votes.tallies() {
                println!("{} {}", key, tally);
            }
            if votes.skip_voting() {
                println!("skip-voting: audits were indeterminate");
            }
            Ok(())
        }
        Commands::Payout { round } => {
            let runner = RoundRunner::from_config(&node_config)?;
            match runner.settle(round).await? {
                Some(payout) => println!("{}", serde_json::to_string_pretty(&payout)?),
                None => println!("Round {} skipped", round),
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    if let Some(path) = path {
        return NodeConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }
    let default_path = Path::new(config::DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        NodeConfig::from_file(default_path)
    } else {
        Ok(NodeConfig::default())
    }
}

async fn start(config: NodeConfig) -> Result<()> {
    if config.task.task_id.is_empty() {
        anyhow::bail!("TASK_ID is not configured");
    }

    info!(
        name = %config.node.name,
        task_id = %config.task.task_id,
        api_port = config.api.port,
        max_assignees = config.task.max_assignees,
        "🐝 Starting hive coordinator"
    );

    let store: Arc<dyn WorkStore> = Arc::new(MemoryWorkStore::new());
    if let Some(units_file) = &config.node.units_file {
        collaborators::seed_units(store.as_ref(), units_file).await?;
    }
    let chain = collaborators::chain_client(&config)?;

    let state = Arc::new(AppState::new(&config, store, chain));
    let server = hive_node::start_api_server(state, config.api.host.clone(), config.api.port);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
        joined = server => {
            joined??;
        }
    }
    Ok(())
}
