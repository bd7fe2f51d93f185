use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tessera_common::Genesis;
use tessera_node::{Node, NodeConfig};
use tessera_storage::EngineType;

#[derive(Parser)]
#[command(name = "tessera", about = "EVM-compatible L2 node", version)]
struct Cli {
    /// Data directory for the chain database and L1 audit log.
    #[arg(long, default_value = "./data")]
    datadir: PathBuf,

    /// Path to a genesis JSON file.
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Overrides the genesis chain id.
    #[arg(long)]
    chain_id: Option<u64>,

    /// Run as a sequencer, producing blocks when holding the slot.
    #[arg(long)]
    sequencer: bool,

    /// Hex-encoded 32-byte Ed25519 seed for the sequencer identity.
    #[arg(long, env = "TESSERA_SEQUENCER_SEED")]
    sequencer_seed: Option<String>,

    /// Block production cadence in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    block_time_ms: u64,

    /// Port the external JSON-RPC facade binds to.
    #[arg(long, default_value_t = 8545)]
    http_port: u16,

    /// Port the external P2P layer binds to.
    #[arg(long, default_value_t = 30303)]
    p2p_port: u16,

    /// Development mode: dev genesis, in-memory store, single sequencer.
    #[arg(long)]
    dev: bool,

    /// Log filter, e.g. `info` or `tessera_node=debug`.
    #[arg(long, default_value = "info")]
    log: String,
}

fn parse_seed(raw: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|err| format!("seed is not hex: {err}"))?;
    bytes
        .try_into()
        .map_err(|_| "seed must be exactly 32 bytes".to_string())
}

fn build_config(cli: &Cli) -> Result<NodeConfig, String> {
    let seed = match &cli.sequencer_seed {
        Some(raw) => Some(parse_seed(raw)?),
        None => None,
    };

    let mut config = if cli.dev {
        NodeConfig::dev(seed.unwrap_or([0x42; 32]))
    } else {
        let mut config = NodeConfig {
            engine: EngineType::AppendLog,
            is_sequencer: cli.sequencer,
            sequencer_seed: seed,
            ..Default::default()
        };
        if let Some(path) = &cli.genesis {
            let raw = fs::read_to_string(path)
                .map_err(|err| format!("cannot read genesis {}: {err}", path.display()))?;
            config.genesis = serde_json::from_str::<Genesis>(&raw)
                .map_err(|err| format!("malformed genesis: {err}"))?;
        }
        config
    };

    config.data_dir = cli.datadir.clone();
    config.consensus.block_time_ms = cli.block_time_ms;
    if let Some(chain_id) = cli.chain_id {
        config.genesis.config.chain_id = chain_id;
    }
    if cli.sequencer && config.sequencer_seed.is_none() {
        return Err("--sequencer requires --sequencer-seed".to_string());
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    info!(
        datadir = %config.data_dir.display(),
        chain_id = config.genesis.config.chain_id,
        sequencer = config.is_sequencer,
        http_port = cli.http_port,
        p2p_port = cli.p2p_port,
        "starting tessera"
    );

    let node = match Node::new(config) {
        Ok(node) => node,
        Err(err) => {
            error!("node initialization failed: {err}");
            std::process::exit(1);
        }
    };

    node.start();
    info!(head = node.health().chain_head, "node running");

    // The RPC facade, P2P transport and signal handling are external
    // collaborators; as a standalone daemon the loops carry the process.
    loop {
        std::thread::park();
    }
}
