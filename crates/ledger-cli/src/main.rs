use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use ledger_core::{pow, Block, Chain, ChainStore, ProofOfWork};
use ledger_storage::SledStore;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli", version)]
#[command(about = "Append to and inspect a local proof-of-work ledger")]
struct Cli {
    /// Directory holding the sled database
    #[arg(long, env = "LEDGER_DATA_DIR", default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Leading zero bits required of every new block hash
    #[arg(
        long,
        env = "LEDGER_DIFFICULTY",
        default_value_t = 16,
        value_parser = clap::value_parser!(u32).range(1..=255),
        global = true
    )]
    difficulty: u32,

    /// Give up mining after this many nonces
    #[arg(
        long,
        env = "LEDGER_MAX_NONCE",
        value_parser = clap::value_parser!(i64).range(1..),
        global = true
    )]
    max_nonce: Option<i64>,

    /// Search nonces on all cores
    #[arg(long, env = "LEDGER_PARALLEL", global = true)]
    parallel: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a block carrying DATA and append it to the chain
    #[command(visible_alias = "addblock")]
    AddBlock {
        /// Block payload
        #[arg(long, value_parser = NonEmptyStringValueParser::new())]
        data: String,
    },
    /// Print every block from the tip back to genesis
    #[command(visible_alias = "printchain")]
    PrintChain {
        /// One JSON object per block instead of text
        #[arg(long)]
        json: bool,
    },
    /// Validate every block and its link to its predecessor
    Verify,
}

#[derive(Serialize)]
struct BlockView {
    timestamp: i64,
    previous_hash: String,
    payload: String,
    hash: String,
    nonce: i64,
    difficulty_bits: u32,
    valid: bool,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            timestamp: block.timestamp,
            previous_hash: block.previous_hash_hex(),
            payload: String::from_utf8_lossy(&block.payload).into_owned(),
            hash: block.hash_hex(),
            nonce: block.nonce,
            difficulty_bits: block.difficulty_bits,
            valid: pow::validate(block).is_ok(),
        }
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = SledStore::open(&cli.data_dir)
        .with_context(|| format!("opening ledger at {}", cli.data_dir.display()))?;
    let store = Arc::new(store);

    let outcome = run(cli, Arc::clone(&store));
    // flush on every exit path; the lock goes with the last handle
    let closed = store.close().context("closing ledger store");
    outcome.and(closed)
}

fn run(cli: Cli, store: Arc<SledStore>) -> Result<()> {
    let mut pow = ProofOfWork::new(cli.difficulty)?.with_parallel(cli.parallel);
    if let Some(max_nonce) = cli.max_nonce {
        pow = pow.with_max_nonce(max_nonce);
    }
    info!(
        data_dir = %cli.data_dir.display(),
        difficulty = cli.difficulty,
        parallel = cli.parallel,
        "opening chain"
    );
    let chain = Chain::with_pow(store, pow).context("opening chain")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.cmd {
        Command::AddBlock { data } => {
            let block = chain.append(data).context("appending block")?;
            writeln!(out, "Success! {}", block.hash_hex())?;
        }
        Command::PrintChain { json } => {
            for block in chain.iter().context("reading chain tip")? {
                let block = block.context("reading chain")?;
                let view = BlockView::from(&block);
                if json {
                    serde_json::to_writer(&mut out, &view)?;
                    writeln!(out)?;
                } else {
                    writeln!(out, "Prev. hash: {}", view.previous_hash)?;
                    writeln!(out, "Payload: {}", view.payload)?;
                    writeln!(out, "Hash: {}", view.hash)?;
                    writeln!(out, "PoW: {}", view.valid)?;
                    writeln!(out)?;
                }
            }
        }
        Command::Verify => {
            let count = chain.audit().context("verifying chain")?;
            writeln!(out, "Chain OK: {count} blocks verified")?;
        }
    }
    out.flush()?;
    Ok(())
}
