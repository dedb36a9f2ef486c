use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use powchain_core::{calculate_hash, BlockCandidate, Chain, ChainConfig};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powchain")]
#[command(about = "Minimal proof-of-work ledger")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sample session: register peers, mine three blocks, print the chain
    Demo {
        #[command(flatten)]
        chain: ChainArgs,
        /// Extra peer address to register (repeatable)
        #[arg(long = "peer")]
        peers: Vec<String>,
        /// Print the final chain as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Compute the digest of a block from explicit fields
    Hash {
        #[arg(long)]
        index: u64,
        #[arg(long, default_value = "0")]
        previous_hash: String,
        #[arg(long)]
        timestamp: String,
        /// Payload as JSON text, e.g. '{"amount":4}'
        #[arg(long)]
        payload: String,
        #[arg(long, default_value_t = 0)]
        nonce: u64,
    },
}

#[derive(Args, Debug)]
struct ChainArgs {
    /// JSON file holding a chain configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Initial difficulty (leading zero hex characters)
    #[arg(long)]
    difficulty: Option<u32>,
    /// Chain length multiple at which difficulty rises
    #[arg(long)]
    interval: Option<usize>,
}

impl ChainArgs {
    fn load(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                ChainConfig::from_json(&text)?
            }
            None => ChainConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.initial_difficulty = difficulty;
        }
        if let Some(interval) = self.interval {
            config.difficulty_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct Transfer {
    amount: u64,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo { chain, peers, json } => demo(chain.load()?, &peers, json),
        Command::Hash {
            index,
            previous_hash,
            timestamp,
            payload,
            nonce,
        } => {
            let payload: Value =
                serde_json::from_str(&payload).context("payload must be valid JSON")?;
            println!(
                "{}",
                calculate_hash(index, &previous_hash, &timestamp, &payload, nonce)
            );
            Ok(())
        }
    }
}

fn demo(config: ChainConfig, extra_peers: &[String], json: bool) -> Result<()> {
    let mut chain = Chain::new(config)?;

    for peer in ["Peer1-Node", "Peer2-Node"]
        .into_iter()
        .map(str::to_owned)
        .chain(extra_peers.iter().cloned())
    {
        chain.add_peer(peer);
    }

    mine(&mut chain, "10/07/2017", 4)?;
    mine(&mut chain, "12/07/2017", 10)?;
    println!("Is chain valid? {}", chain.is_valid());
    mine(&mut chain, "15/07/2017", 15)?;

    if json {
        println!("{}", chain.to_json_pretty()?);
    } else {
        print!("{chain}");
    }
    Ok(())
}

/// Mines one transfer block, then lets the chain raise its difficulty.
fn mine(chain: &mut Chain, timestamp: &str, amount: u64) -> Result<()> {
    let candidate: BlockCandidate = chain.next_candidate(timestamp, &Transfer { amount })?;
    info!(index = candidate.index, "Mining block");
    chain.append(candidate)?;
    chain.adjust_difficulty();
    Ok(())
}
