mod display;
mod input;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use predicate_classify::{CentroidStrategy, SectionClassifier};
use predicate_core::{DeviceId, Enrichment, ExclusionOrigin, ReviewConfig};
use predicate_engine::{ReviewContext, Reviewer};
use predicate_store::{AuditLog, ExclusionStore, StoreError};
use predicate_sync::{
    AttributeResolver, EnrichConfig, Enricher, ExternalValidator, HttpRegistryClient,
    SnapshotSource,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::input::ReviewInputs;

#[derive(Parser)]
#[command(name = "predicate", about = "Predicate device citation review", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Classify, score and decide every cited device
    Review(ReviewArgs),
    /// Manage the exclusion list
    Exclude {
        #[command(subcommand)]
        action: ExcludeAction,
        /// Exclusion store file
        #[arg(long, env = "PREDICATE_EXCLUSIONS", default_value = "exclusions.json", global = true)]
        store: PathBuf,
    },
    /// Inspect the append-only audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
        /// Audit log file (JSON Lines)
        #[arg(long, env = "PREDICATE_AUDIT_LOG", default_value = "audit.jsonl", global = true)]
        log: PathBuf,
    },
    /// Print the effective review configuration as JSON
    Config {
        #[arg(long, env = "PREDICATE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SemanticTier {
    Keyword,
    Centroid,
}

#[derive(clap::Args)]
struct ReviewArgs {
    /// JSON array of raw mentions
    #[arg(long)]
    mentions: PathBuf,
    /// JSON array of source documents
    #[arg(long)]
    documents: PathBuf,
    /// Subject device JSON
    #[arg(long)]
    subject: Option<PathBuf>,
    /// JSON map of device id to prior role
    #[arg(long)]
    prior_roles: Option<PathBuf>,
    /// Offline registry snapshot
    #[arg(long, conflicts_with = "registry_url")]
    snapshot: Option<PathBuf>,
    /// Registry base URL
    #[arg(long, env = "PREDICATE_REGISTRY_URL")]
    registry_url: Option<String>,
    #[arg(long, env = "PREDICATE_EXCLUSIONS", default_value = "exclusions.json")]
    exclusions: PathBuf,
    /// Append audit records to this JSON Lines log
    #[arg(long, env = "PREDICATE_AUDIT_LOG")]
    audit_log: Option<PathBuf>,
    /// Write the results as an Arrow IPC file
    #[arg(long)]
    export: Option<PathBuf>,
    #[arg(long, env = "PREDICATE_CONFIG")]
    config: Option<PathBuf>,
    /// Defaults to today (UTC)
    #[arg(long)]
    review_date: Option<NaiveDate>,
    #[arg(long, value_enum, default_value = "keyword")]
    semantic: SemanticTier,
    /// Concurrent registry lookups
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Per-call registry timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// Print the report as JSON instead of cards
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ExcludeAction {
    /// Exclude a device from predicate selection
    Add {
        device: DeviceId,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "manual")]
        by: ExclusionOrigin,
    },
    /// Lift an exclusion
    Remove { device: DeviceId },
    /// List current exclusions
    List,
}

#[derive(Subcommand)]
enum AuditAction {
    /// Re-walk the hash chain
    Verify,
    /// Decision history for one device
    Show { device: DeviceId },
    /// Write the log as an Arrow IPC file
    Export { out: PathBuf },
    /// Run SQL against the log loaded as table `audit_log` (needs the duckdb feature)
    Query { sql: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Review(args) => cmd_review(args).await,
        Command::Exclude { action, store } => cmd_exclude(action, &store),
        Command::Audit { action, log } => cmd_audit(action, &log),
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReviewConfig> {
    match path {
        Some(p) => ReviewConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(ReviewConfig::default()),
    }
}

type Registry = (Arc<dyn AttributeResolver>, Arc<dyn ExternalValidator>);

fn registry(args: &ReviewArgs) -> anyhow::Result<Option<Registry>> {
    if let Some(path) = &args.snapshot {
        let source = Arc::new(SnapshotSource::load(path).context("loading registry snapshot")?);
        let resolver: Arc<dyn AttributeResolver> = source.clone();
        let validator: Arc<dyn ExternalValidator> = source;
        return Ok(Some((resolver, validator)));
    }
    if let Some(url) = &args.registry_url {
        let client = Arc::new(HttpRegistryClient::new(url.clone()));
        let resolver: Arc<dyn AttributeResolver> = client.clone();
        let validator: Arc<dyn ExternalValidator> = client;
        return Ok(Some((resolver, validator)));
    }
    Ok(None)
}

async fn cmd_review(args: ReviewArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let inputs = ReviewInputs::load(
        &args.mentions,
        &args.documents,
        args.subject.as_deref(),
        args.prior_roles.as_deref(),
    )?;

    let exclusions = ExclusionStore::open(&args.exclusions).snapshot().map_err(|err| {
        match err.as_review_error() {
            Some(fatal) => anyhow::Error::new(fatal),
            None => anyhow::Error::new(err),
        }
    })?;
    info!(version = exclusions.version, entries = exclusions.len(), "exclusion snapshot taken");

    let reviewer = match args.semantic {
        SemanticTier::Keyword => Reviewer::new(config.clone()),
        SemanticTier::Centroid => {
            let strategy = CentroidStrategy::with_builtin_exemplars(config.semantic_window_words);
            let classifier = SectionClassifier::with_strategy(&config, Box::new(strategy));
            Reviewer::with_classifier(config.clone(), classifier)
        }
    };
    let classification = reviewer.classify(&inputs.mentions, &inputs.documents);

    let enrichment: BTreeMap<DeviceId, Enrichment> = match registry(&args)? {
        Some((resolver, validator)) => {
            let enricher = Enricher::new(
                resolver,
                validator,
                EnrichConfig {
                    concurrency: args.concurrency,
                    timeout: Duration::from_secs(args.timeout_secs),
                    ..EnrichConfig::default()
                },
            );
            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling pending lookups");
                    let _ = cancel_tx.send(true);
                }
            });
            enricher.enrich(&classification.device_ids(), &cancel_rx).await
        }
        None => {
            warn!("no registry configured, every device will be scored on defaults");
            BTreeMap::new()
        }
    };

    let review_date = args.review_date.unwrap_or_else(|| Utc::now().date_naive());
    let ctx = ReviewContext {
        documents: &inputs.documents,
        subject: &inputs.subject,
        prior_roles: &inputs.prior_roles,
        exclusions: &exclusions,
        enrichment: &enrichment,
        review_date,
    };
    let report = reviewer.evaluate(classification, &ctx, Utc::now());

    if let Some(path) = &args.audit_log {
        let records = report.records.iter().map(|r| r.audit.clone()).collect();
        let appended = AuditLog::open(path)
            .append_all(records)
            .with_context(|| format!("appending to audit log {}", path.display()))?;
        info!(entries = appended.len(), "audit records appended");
    }

    if let Some(path) = &args.export {
        let audits: Vec<_> = report.records.iter().map(|r| r.audit.clone()).collect();
        let batch = predicate_store::review_batch(&audits)?;
        predicate_store::write_ipc(path, &batch)
            .with_context(|| format!("exporting review to {}", path.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display::print_report(&report);
    }
    Ok(())
}

fn cmd_exclude(action: ExcludeAction, path: &Path) -> anyhow::Result<()> {
    let store = ExclusionStore::open(path);
    let base = store
        .snapshot()
        .with_context(|| format!("reading exclusion store {}", path.display()))?;

    match action {
        ExcludeAction::Add { device, reason, by } => {
            let snapshot = store.add(&base, device.clone(), &reason, by, Utc::now())?;
            println!("Excluded {device} (store v{})", snapshot.version);
        }
        ExcludeAction::Remove { device } => match store.remove(&base, &device) {
            Ok(snapshot) => println!("Removed {device} (store v{})", snapshot.version),
            Err(StoreError::NotExcluded { device_id }) => bail!("{device_id} is not on the exclusion list"),
            Err(err) => return Err(err.into()),
        },
        ExcludeAction::List => display::print_exclusions(&base),
    }
    Ok(())
}

fn cmd_audit(action: AuditAction, path: &Path) -> anyhow::Result<()> {
    let log = AuditLog::open(path);
    match action {
        AuditAction::Verify => {
            let summary = log
                .verify()
                .with_context(|| format!("verifying {}", path.display()))?;
            display::print_chain_summary(&summary);
        }
        AuditAction::Show { device } => {
            let history = log.history(&device)?;
            if history.is_empty() {
                bail!("no audit entries for {device}");
            }
            println!("=== {device} === {} entries", history.len());
            display::print_history(&history);
        }
        AuditAction::Export { out } => {
            let batch = predicate_store::audit_log_batch(&log.entries()?)?;
            predicate_store::write_ipc(&out, &batch)
                .with_context(|| format!("exporting audit log to {}", out.display()))?;
            println!("Wrote {} entries to {}", batch.num_rows(), out.display());
        }
        #[cfg(feature = "duckdb")]
        AuditAction::Query { sql } => {
            let query = predicate_store::AuditQuery::open()?;
            query.load_entries(&log.entries()?)?;
            let batches = query.query_arrow(&sql)?;
            arrow::util::pretty::print_batches(&batches)?;
        }
        #[cfg(not(feature = "duckdb"))]
        AuditAction::Query { .. } => bail!("built without the duckdb feature"),
    }
    Ok(())
}
