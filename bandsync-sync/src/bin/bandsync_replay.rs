//! Audit-log replay tool (bandsync-replay)
//!
//! Reads a JSON-lines audit log, applies it to an in-memory store and lets a
//! resync coordinator watch every entity topic while it does, logging each
//! coalesced refresh.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use bandsync_common::config::TomlConfig;
use bandsync_common::{EntityKind, EventBus};
use bandsync_sync::{
    parse_audit_log, AuditReplayer, CoordinatorOptions, LocalStore, MemoryStore, ReplaySummary,
    ResyncCoordinator,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bandsync-replay
#[derive(Parser, Debug)]
#[command(name = "bandsync-replay")]
#[command(about = "Replay a band audit log into a local store")]
#[command(version)]
struct Args {
    /// JSON-lines audit log to replay
    #[arg(env = "BANDSYNC_AUDIT_LOG")]
    log: PathBuf,

    /// Bootstrap config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only refresh for changes to this band
    #[arg(short, long, env = "BANDSYNC_BAND_ID")]
    band_id: Option<String>,

    /// Current user; their own changes do not trigger refreshes
    #[arg(short, long, env = "BANDSYNC_USER_ID")]
    user_id: Option<String>,

    /// Debounce window override in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Skip entries up to and including this audit-log id
    #[arg(long)]
    since: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref(), std::io::stderr)?;
    init_tracing(&config)?;
    config.sync.ensure_supported()?;

    // CLI overrides
    if let Some(band_id) = args.band_id {
        config.sync.band_id = Some(band_id);
    }
    if let Some(user_id) = args.user_id {
        config.sync.current_user_id = Some(user_id);
    }
    if let Some(debounce_ms) = args.debounce_ms {
        config.sync.debounce_ms = debounce_ms;
    }

    let file = File::open(&args.log)
        .with_context(|| format!("Failed to open audit log {}", args.log.display()))?;
    let entries = parse_audit_log(BufReader::new(file)).context("Failed to parse audit log")?;
    info!("Loaded {} audit-log entries from {}", entries.len(), args.log.display());

    let bus = EventBus::new(256);
    let store = Arc::new(Mutex::new(MemoryStore::new()));

    let refresh_store = Arc::clone(&store);
    let mut coordinator = ResyncCoordinator::new(
        Some(Arc::new(bus.clone())),
        CoordinatorOptions::all_kinds().with_config(&config.sync),
        Arc::new(move || log_store_counts(&refresh_store)),
    );
    coordinator.start();

    let mut replayer = AuditReplayer::new(Arc::clone(&store), bus);
    if let Some(since) = args.since {
        replayer = replayer.with_cursor(since);
    }

    // Entries further apart than the debounce window get their own refresh
    let debounce = Duration::from_millis(config.sync.debounce_ms);
    let mut ordered: Vec<_> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.id);

    let mut summary = ReplaySummary::default();
    for (index, entry) in ordered.iter().enumerate() {
        match replayer.apply(entry) {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                warn!("Replay stopped at entry {}: {}", entry.id, e);
                break;
            }
        }

        let settles = ordered.get(index + 1).is_some_and(|next| {
            (next.changed_at - entry.changed_at)
                .to_std()
                .is_ok_and(|gap| gap > debounce)
        });
        if settles && coordinator.is_pending() {
            tokio::time::sleep(debounce).await;
        }
    }

    coordinator.stop();

    info!(
        "Replay complete: {} applied, {} deleted, {} skipped, cursor {:?}",
        summary.applied,
        summary.deleted,
        summary.skipped,
        replayer.cursor()
    );
    println!(
        "applied={} deleted={} skipped={}",
        summary.applied, summary.deleted, summary.skipped
    );

    Ok(())
}

/// Load the bootstrap config under a temporary subscriber
///
/// The global subscriber depends on the `[logging]` section, so anything
/// logged while loading (a missing file, for one) goes to `writer` at the
/// `RUST_LOG` level, or `info`.
fn load_config<W>(path: Option<&Path>, writer: W) -> Result<TomlConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();

    tracing::subscriber::with_default(bootstrap, || TomlConfig::load(path))
        .context("Failed to load config")
}

/// Install the tracing subscriber: `RUST_LOG` wins over the configured level
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("Invalid log level '{}'", config.logging.level))?,
    };

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

fn log_store_counts(store: &Arc<Mutex<MemoryStore>>) {
    let counts: Vec<String> = EntityKind::ALL
        .iter()
        .map(|kind| match store.count(*kind) {
            Ok(count) => format!("{}={}", kind.table_name(), count),
            Err(_) => format!("{}=?", kind.table_name()),
        })
        .collect();
    info!("Refresh: {}", counts.join(" "));
}
