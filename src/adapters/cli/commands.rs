//! CLI Command Handlers
//!
//! Argument definitions, component wiring and the `run`, `inspect` and
//! `check-config` handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::adapters::access::{EndpointPool, RateLimitedAccess};
use crate::adapters::cache::SingleFlightCache;
use crate::adapters::collaborators::{DryRunPurchaser, LogNotifier, StaticSettings, WebhookNotifier};
use crate::adapters::dexscreener::{DexPair, DexScreenerClient};
use crate::adapters::providers::ProviderClients;
use crate::adapters::solana::{validate_address, SolanaRpcClient};
use crate::adapters::sources::{PollingSourceFactory, PumpPortalSourceFactory};
use crate::application::{DetectionEngine, DetectionPorts};
use crate::config::{Config, DetectionMode};
use crate::domain::{CandidateOrigin, FilterEvaluator, TokenCandidate, TokenSnapshot, UserId};
use crate::ports::{CandidateSourceFactory, NotifierPort};

/// How often `run` logs progress and sweeps the cache
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// Mintwatch - new-mint detection for Solana
#[derive(Parser, Debug)]
#[command(
    name = "mintwatch",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "New-mint detection for Solana",
    long_about = "Mintwatch watches newly launched Solana tokens, filters them against each \
                  user's criteria and triggers exactly one purchase attempt per armed user."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", default_value = "config/mintwatch.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Arm users and run detection until Ctrl-C
    Run(RunCmd),

    /// Show what the providers report for one mint
    Inspect(InspectCmd),

    /// Load and validate the configuration only
    CheckConfig,
}

/// Run detection
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Also arm this user (repeatable); `auto_start` users are always armed
    #[arg(short, long = "user", value_name = "ID")]
    pub users: Vec<UserId>,
}

/// Inspect a mint
#[derive(Parser, Debug)]
pub struct InspectCmd {
    /// Mint address (base58)
    #[arg(value_name = "MINT")]
    pub mint: String,

    /// Evaluate this user's criteria against the mint
    #[arg(short, long, value_name = "ID")]
    pub user: Option<UserId>,

    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Also look up this DexScreener pair address
    #[arg(long, value_name = "ADDRESS")]
    pub pair: Option<String>,
}

/// Build the cached provider facade from config
pub fn build_providers(config: &Config) -> Result<ProviderClients> {
    let rpc_pool = EndpointPool::new(config.rpc.endpoints.clone()).context("Invalid [rpc] endpoints")?;
    let rpc_access = Arc::new(RateLimitedAccess::new(
        "solana-rpc",
        rpc_pool,
        config.rpc.limiter.clone(),
        config.rpc.retry.policy(),
    ));
    let rpc = SolanaRpcClient::new(rpc_access, config.rpc.request_timeout())
        .context("Failed to create Solana RPC client")?
        .with_commitment(config.rpc.commitment.clone());

    let dex_pool = EndpointPool::new(config.dexscreener.endpoints.clone())
        .context("Invalid [dexscreener] endpoints")?;
    let dex_access = Arc::new(RateLimitedAccess::new(
        "dexscreener",
        dex_pool,
        config.dexscreener.limiter.clone(),
        config.dexscreener.retry.policy(),
    ));
    let dex = DexScreenerClient::new(dex_access, config.dexscreener.request_timeout())
        .context("Failed to create DexScreener client")?;

    let cache = SingleFlightCache::new(config.cache.cache_config());
    Ok(ProviderClients::new(rpc, dex, cache, config.cache.ttl.clone()))
}

/// Webhook notifier when configured, the log otherwise
pub fn build_notifier(config: &Config) -> Result<Arc<dyn NotifierPort>> {
    match config.alerts.webhook() {
        Some(url) => {
            let timeout = Duration::from_millis(config.alerts.webhook_timeout_ms);
            let notifier = WebhookNotifier::new(url, timeout).context("Failed to create webhook notifier")?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Candidate source factory for the configured detection mode
pub fn build_source_factory(config: &Config, providers: &ProviderClients) -> Arc<dyn CandidateSourceFactory> {
    match config.detection.mode {
        DetectionMode::Poll => Arc::new(PollingSourceFactory::new(
            Arc::new(providers.clone()),
            config.detection.poll_interval(),
        )),
        DetectionMode::Subscribe => Arc::new(PumpPortalSourceFactory::new(
            config.detection.subscription_config(),
        )),
    }
}

/// Users to arm: `auto_start` entries first, then `--user` ids, without repeats
pub fn users_to_arm(config: &Config, extra: &[UserId]) -> Vec<UserId> {
    let mut users = config.auto_start_users();
    for user in extra {
        if !users.contains(user) {
            users.push(*user);
        }
    }
    users
}

pub async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    info!("Starting mintwatch...");

    let users = users_to_arm(&config, &cmd.users);
    if users.is_empty() {
        bail!("No users to arm: set auto_start = true on a [[users]] entry or pass --user <ID>");
    }
    for user in &users {
        if !config.users.iter().any(|entry| entry.id == *user) {
            warn!(user, "User has no [[users]] entry and will never match");
        }
    }

    let providers = build_providers(&config)?;
    let purchaser = Arc::new(DryRunPurchaser::new());
    let ports = DetectionPorts {
        data: Arc::new(providers.clone()),
        settings: Arc::new(StaticSettings::new(config.user_criteria())),
        purchaser: purchaser.clone(),
        notifier: build_notifier(&config)?,
    };
    let engine = DetectionEngine::new(
        build_source_factory(&config, &providers),
        ports,
        config.detection.engine_config(),
    );

    warn!("DRY RUN purchaser - no transactions are sent");
    info!(mode = ?config.detection.mode, users = users.len(), "Arming users");
    for user in &users {
        engine.start_detection(*user);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut watch = tokio::time::interval(Duration::from_secs(1));
    watch.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown signal received");
                break;
            }
            _ = status.tick() => {
                providers.cache().cleanup();
                let stats = engine.stats();
                let cache = providers.cache().stats();
                info!(
                    cycles = stats.cycles_run,
                    skipped = stats.cycles_skipped,
                    candidates = stats.candidates_seen,
                    matches = stats.matches,
                    armed = engine.armed_users().len(),
                    cache_entries = cache.valid_entries,
                    cache_hits = cache.hits,
                    "Status"
                );
            }
            _ = watch.tick() => {
                if users.iter().all(|user| engine.watch_state(*user).is_none()) {
                    info!("Every watcher has matched or been stopped");
                    break;
                }
            }
        }
    }

    for user in engine.armed_users() {
        engine.stop_detection(user);
    }

    let stats = engine.stats();
    info!(
        matches = stats.matches,
        purchases_ok = stats.purchases_ok,
        purchases_failed = stats.purchases_failed,
        dry_run_attempts = purchaser.attempts(),
        rpc = ?providers.rpc().access().stats(),
        dexscreener = ?providers.dexscreener().access().stats(),
        "Mintwatch stopped"
    );
    Ok(())
}

pub async fn inspect_command(cmd: InspectCmd, config: Config) -> Result<()> {
    let mint = cmd.mint.trim();
    validate_address(mint).context("Invalid mint address")?;

    let providers = build_providers(&config)?;
    let candidate = TokenCandidate::new(mint, CandidateOrigin::Manual);
    let snapshot = providers.snapshot(&candidate, config.detection.top_n).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", format_snapshot(&snapshot));
    }

    if let Some(address) = cmd.pair.as_deref() {
        match providers.pair(address.trim()).await.context("Pair lookup failed")? {
            Some(pair) if cmd.json => println!("{}", serde_json::to_string_pretty(&pair)?),
            Some(pair) => print!("{}", format_pair(&pair)),
            None => println!("Pair {}: not listed", address.trim()),
        }
    }

    if let Some(user) = cmd.user {
        let entry = config
            .users
            .iter()
            .find(|entry| entry.id == user)
            .with_context(|| format!("No [[users]] entry with id {}", user))?;

        let verdict = FilterEvaluator::new(config.detection.top_n)
            .evaluate(&candidate, &entry.criteria, &providers)
            .await;
        println!("User {}: {}", user, verdict);
        if entry.criteria.min_boost_amount.is_some() || entry.criteria.min_market_cap_sol.is_some() {
            println!("  (feed thresholds need a feed-discovered candidate and always reject here)");
        }
    }

    Ok(())
}

pub fn check_config_command(path: &Path, config: &Config) -> Result<()> {
    println!("Configuration OK: {}", path.display());
    println!("  RPC endpoints:         {}", config.rpc.endpoints.len());
    println!("  DexScreener endpoints: {}", config.dexscreener.endpoints.len());
    println!("  Detection mode:        {:?}", config.detection.mode);
    println!("  Users:                 {}", config.users.len());
    println!("  Auto-start users:      {:?}", config.auto_start_users());
    println!(
        "  Alerts:                {}",
        if config.alerts.webhook().is_some() { "webhook" } else { "log only" }
    );
    Ok(())
}

/// Human-readable pair metadata
pub fn format_pair(pair: &DexPair) -> String {
    let mut out = String::new();
    out.push_str(&format!("Pair:              {} ({})\n", pair.pair_address, pair.dex_id));
    out.push_str(&format!(
        "Tokens:            {}/{}\n",
        pair.base_token.symbol, pair.quote_token.symbol
    ));
    match pair.price_usd() {
        Some(price) => out.push_str(&format!("Pair price:        ${}\n", price)),
        None => out.push_str("Pair price:        n/a\n"),
    }
    out.push_str(&format!("Pair liquidity:    ${:.2}\n", pair.liquidity_usd()));
    if let Some(created) = pair.pair_created_at.and_then(chrono::DateTime::from_timestamp_millis) {
        out.push_str(&format!("Pair created:      {}\n", created.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    out
}

/// Human-readable snapshot; defaulted components are flagged
pub fn format_snapshot(snapshot: &TokenSnapshot) -> String {
    let flag = |component: &str| {
        if snapshot.failed.iter().any(|f| f == component) {
            " (unavailable, default shown)"
        } else {
            ""
        }
    };
    let yes_no = |present: bool| if present { "present" } else { "revoked" };

    let mut out = String::new();
    out.push_str(&format!("Mint:              {}\n", snapshot.mint));
    out.push_str(&format!(
        "Liquidity:         ${:.2}{}\n",
        snapshot.liquidity_usd,
        flag("pools")
    ));
    match snapshot.price_usd {
        Some(price) => out.push_str(&format!("Price:             ${}\n", price)),
        None => out.push_str("Price:             n/a\n"),
    }
    match snapshot.age_secs {
        Some(age) => out.push_str(&format!("Age:               {}s\n", age)),
        None => out.push_str("Age:               no pool\n"),
    }
    out.push_str(&format!(
        "Mint authority:    {}{}\n",
        yes_no(snapshot.has_mint_authority),
        flag("authorities")
    ));
    out.push_str(&format!(
        "Freeze authority:  {}{}\n",
        yes_no(snapshot.has_freeze_authority),
        flag("authorities")
    ));
    out.push_str(&format!(
        "Top holders:       {:.2}%{}\n",
        snapshot.top_holders_pct,
        flag("top_holders")
    ));
    out
}
