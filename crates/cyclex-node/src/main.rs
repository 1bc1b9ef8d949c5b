//! cyclex-node: drives the cycle ledger.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database
//!   2. Apply genesis if the DB is fresh
//!   3. Run the requested command: the block clock (`run`), an operation
//!      file (`apply`), or a read-only query (`queue`, `account`)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cyclex_core::amount::Frequency;
use cyclex_core::license::{LicenseInformation, LicenseRequest};
use cyclex_core::queue::{QueuePosition, RewardHistoryRecord};
use cyclex_core::transaction::{Operation, OperationReceipt};
use cyclex_core::types::{AccountId, Share};
use cyclex_genesis::{apply_genesis, GenesisParams};
use cyclex_queue::{CycleAgreement, CycleQuery};
use cyclex_state::{StateDb, StateEngine};

#[derive(Parser, Debug)]
#[command(
    name = "cyclex-node",
    version,
    about = "Cyclex node: cycle licenses and the coin reward queue"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.cyclex/data")]
    data_dir: PathBuf,

    /// Path to genesis params JSON (only read on first run).
    #[arg(long)]
    genesis: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the block clock; the reward queue is processed when due.
    Run {
        /// Stop after this many blocks.
        #[arg(long)]
        blocks: Option<u64>,
    },
    /// Apply operations from a JSON file (one operation or an array).
    Apply { file: PathBuf },
    /// Show the reward queue head with payout estimates.
    Queue {
        /// Only show entries of this account (name or base-58 id).
        #[arg(long)]
        account: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show balances, licenses and queued cycles of an account.
    Account { account: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OperationFile {
    One(Operation),
    Many(Vec<Operation>),
}

#[derive(Serialize)]
struct AccountView {
    id: AccountId,
    dascoin_balance: Option<Share>,
    cycle_balances: Vec<CycleAgreement>,
    license_information: Option<LicenseInformation>,
    pending_license_requests: Vec<LicenseRequest>,
    queue: Vec<QueuePosition>,
    rewards: Vec<RewardHistoryRecord>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cyclex=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    // ── Genesis if fresh ──────────────────────────────────────────────────────
    if !db.is_initialized() {
        info!("fresh database, applying genesis");
        let params = load_genesis_params(args.genesis.as_deref())?;
        apply_genesis(&db, &params).context("applying genesis")?;
    } else {
        debug!("existing database found, skipping genesis");
    }

    let engine = StateEngine::new(Arc::clone(&db));

    match args.command {
        Command::Run { blocks } => run_block_clock(&engine, blocks).await?,
        Command::Apply { file } => apply_file(&engine, &file)?,
        Command::Queue { account, limit } => show_queue(&db, account.as_deref(), limit)?,
        Command::Account { account } => show_account(&db, &account)?,
    }

    db.flush().context("flushing state database")?;
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_block_clock(engine: &StateEngine, blocks: Option<u64>) -> anyhow::Result<()> {
    let params = engine.db.parameters().context("reading chain parameters")?;
    let mut ticker = tokio::time::interval(Duration::from_secs(params.block_interval as u64));
    let mut produced = 0u64;
    info!(block_interval = params.block_interval, "block clock started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }

        let now = chrono::Utc::now().timestamp();
        match engine.on_block(now) {
            Ok(report) if report.processed => info!(
                now,
                paid = report.entries_paid,
                dascoin = report.dascoin_minted,
                next = report.next_reward_time,
                "reward interval done"
            ),
            Ok(_) => {}
            Err(e) => warn!(error = %e, now, "queue processing failed, retrying next block"),
        }

        produced += 1;
        if blocks.is_some_and(|n| produced >= n) {
            break;
        }
    }
    Ok(())
}

fn apply_file(engine: &StateEngine, file: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading operations from {}", file.display()))?;
    let ops = match serde_json::from_str::<OperationFile>(&json).context("parsing operations JSON")? {
        OperationFile::One(op) => vec![op],
        OperationFile::Many(ops) => ops,
    };

    let mut receipts: Vec<OperationReceipt> = Vec::with_capacity(ops.len());
    for (i, op) in ops.iter().enumerate() {
        let now = chrono::Utc::now().timestamp();
        let receipt = engine
            .apply(op, now)
            .with_context(|| format!("operation #{i} rejected"))?;
        receipts.push(receipt);
    }
    println!("{}", serde_json::to_string_pretty(&receipts)?);
    Ok(())
}

fn show_queue(db: &StateDb, account: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let q = CycleQuery::new(db);
    let frequency: Frequency = q.frequency()?;
    println!("frequency {frequency}, {} entries queued", q.queue_size());

    if let Some(account) = account {
        let id = resolve_account(account);
        for p in q.queue_submissions_with_pos(&id)?.into_iter().take(limit) {
            println!("#{:<6} {}", p.position, serde_json::to_string(&p.entry)?);
        }
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp();
    let estimates = q.payout_estimates()?;
    for est in estimates.iter().take(limit) {
        let eta = match est.paid_by {
            Some(t) => chrono::DateTime::<chrono::Utc>::from_timestamp(t, 0)
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| t.to_string()),
            None => "never at current parameters".to_string(),
        };
        println!("#{:<6} {} | paid by {}", est.position, q.describe(est.entry, now)?, eta);
    }
    Ok(())
}

fn show_account(db: &StateDb, account: &str) -> anyhow::Result<()> {
    let q = CycleQuery::new(db);
    let id = resolve_account(account);
    let view = AccountView {
        dascoin_balance: q.dascoin_balance(&id)?,
        cycle_balances: q.all_cycle_balances(&id)?,
        license_information: q.license_information(&id)?,
        pending_license_requests: q.license_requests(Some(&id))?,
        queue: q.queue_submissions_with_pos(&id)?,
        rewards: q.reward_history(&id)?,
        id,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Accept either a base-58 account id or an account name.
fn resolve_account(s: &str) -> AccountId {
    AccountId::from_b58(s).unwrap_or_else(|_| AccountId::from_name(s))
}

/// Load genesis parameters from a JSON file, or fall back to the defaults.
fn load_genesis_params(path: Option<&Path>) -> anyhow::Result<GenesisParams> {
    if let Some(p) = path {
        let json = std::fs::read_to_string(p)
            .with_context(|| format!("reading genesis params from {}", p.display()))?;
        return serde_json::from_str(&json).context("parsing genesis params JSON");
    }
    warn!("no --genesis provided, using default genesis parameters");
    Ok(GenesisParams::default())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
