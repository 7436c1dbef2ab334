//! VaultLens - Yield Vault Dashboard Runner
//!
//! Run with: cargo run -- --fixture fixtures/demo.json
//!
//! Loads vaults, prices and APY data from the public API (or a fixture),
//! lets the recompute topics settle and prints the sorted listing with
//! APY, TVL and the connected wallet's deposits.

use chrono::Utc;
use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultlens::clock::{Clock, FixedClock, SystemClock};
use vaultlens::config::{Config, DashboardSnapshot, SnapshotRow};
use vaultlens::filter::{FilterUpdate, SortKey};
use vaultlens::promotions::is_boosted;
use vaultlens::scheduler::{Dashboard, DashboardOptions, Topic};
use vaultlens::sources::{ApiSource, Fixture};
use vaultlens::Availability;

/// How long to wait for the topics to settle after a refresh
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows printed in the listing
const MAX_ROWS: usize = 25;

#[derive(Parser, Debug)]
#[command(name = "vaultlens")]
#[command(about = "Derived APY, TVL and balance view over yield vaults")]
struct Args {
    /// TOML config file (defaults to environment variables)
    #[arg(short, long)]
    config: Option<String>,

    /// Replay a JSON fixture instead of calling the API
    #[arg(short, long)]
    fixture: Option<String>,

    /// Wallet address to break balances down for
    #[arg(short, long)]
    address: Option<String>,

    /// Keep refreshing until interrupted
    #[arg(short, long)]
    watch: bool,

    /// Sort key: default, apy, daily, tvl, safety, deposit, wallet
    #[arg(short, long)]
    sort: Option<SortKey>,

    /// Only show these chains (repeatable)
    #[arg(long)]
    chain: Vec<String>,

    /// Free-text search over names, ids and assets
    #[arg(long)]
    search: Option<String>,

    /// Write the effective configuration (after flags) to this TOML file
    #[arg(long)]
    save_config: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔭 VAULTLENS - Yield Vault Dashboard").cyan().bold()
    );
    println!(
        "{}",
        style("    APY Composition | Balance Breakdown | TVL | Filters").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // CLI flags win over file and environment
    if let Some(fixture) = &args.fixture {
        config.fixture_path = Some(fixture.clone());
    }
    if let Some(address) = &args.address {
        config.wallet_address = Some(address.clone());
    }
    if let Some(sort) = args.sort {
        config.default_sort = sort;
    }
    if !args.chain.is_empty() {
        config.chains = args.chain.clone();
    }
    Ok(config)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
        bar.set_style(template);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn settle(dashboard: &Dashboard) -> bool {
    let bar = spinner("Recomputing derived state...");
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, dashboard.settled())
        .await
        .is_ok();
    bar.finish_and_clear();
    settled
}

fn fmt_percent(value: Availability<f64>) -> String {
    match value {
        Availability::Loading => "loading".to_string(),
        Availability::Unavailable => "-".to_string(),
        Availability::Ready(v) => format!("{:.2}%", v * 100.0),
    }
}

fn fmt_usd(value: Availability<f64>) -> String {
    match value {
        Availability::Loading => "loading".to_string(),
        Availability::Unavailable => "-".to_string(),
        Availability::Ready(v) if v >= 1_000_000.0 => format!("${:.2}M", v / 1_000_000.0),
        Availability::Ready(v) if v >= 1_000.0 => format!("${:.1}k", v / 1_000.0),
        Availability::Ready(v) => format!("${:.2}", v),
    }
}

/// Print the sorted listing and collect the snapshot rows
fn render(dashboard: &Dashboard) -> Vec<SnapshotRow> {
    let state = dashboard.state();
    let Some(filtered) = dashboard.filtered() else {
        println!("{}", style("Listing not available yet (vaults or APY still loading)").yellow());
        return vec![];
    };

    println!(
        "{} Showing {} of {} vaults (sort: {} {:?})",
        style("✓").green(),
        filtered.sorted_ids.len().min(MAX_ROWS),
        filtered.total_count,
        state.filters.sort.name(),
        state.filters.direction
    );
    println!();
    println!(
        "  {:<34} {:<10} {:>10} {:>10} {:>12} {:>12}",
        style("Vault").bold(),
        style("Chain").bold(),
        style("APY").bold(),
        style("Daily").bold(),
        style("TVL").bold(),
        style("Deposited").bold()
    );

    let mut rows = Vec::new();
    for vault_id in filtered.sorted_ids.iter() {
        let Some(vault) = state.entities.vaults.get(vault_id.as_str()) else {
            continue;
        };
        let apy = dashboard.total_apy(vault_id);
        let headline = apy.clone().map(|t| t.headline());
        let daily = apy.map(|t| t.headline_daily());
        let tvl = dashboard.tvl(vault_id).map(|t| t.vault_tvl());
        let deposited = dashboard.balance(vault_id).map(|b| b.total);
        let boosted = is_boosted(&state, vault_id);

        if rows.len() < MAX_ROWS {
            let name = if boosted {
                format!("🔥 {}", vault.name)
            } else {
                vault.name.clone()
            };
            println!(
                "  {:<34} {:<10} {:>10} {:>10} {:>12} {:>12}",
                truncate(&name, 34),
                vault.chain_id,
                fmt_percent(headline.clone()),
                fmt_percent(daily),
                fmt_usd(tvl.clone()),
                match &deposited {
                    Availability::Ready(amount) => format!("{:.4}", amount),
                    Availability::Loading => "loading".to_string(),
                    Availability::Unavailable => "-".to_string(),
                }
            );
        }

        rows.push(SnapshotRow {
            vault_id: vault_id.clone(),
            apy: headline.ready(),
            boosted,
            tvl_usd: tvl.ready(),
            deposited: deposited.ready(),
        });
    }
    rows
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

fn log_snapshot(config: &Config, dashboard: &Dashboard, rows: Vec<SnapshotRow>) {
    if !config.snapshot_log {
        return;
    }
    let snapshot = DashboardSnapshot {
        timestamp: Utc::now(),
        as_of: dashboard.state().now,
        wallet: config.wallet_address.clone(),
        vault_count: rows.len(),
        total_tvl_usd: dashboard.total_tvl().ready().unwrap_or(0.0),
        rows,
    };
    match snapshot.append_to_file(&config.snapshot_log_path) {
        Ok(()) => println!(
            "{} Snapshot logged to: {}",
            style("📝").cyan(),
            config.snapshot_log_path
        ),
        Err(e) => warn!("Failed to write snapshot log: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let directive = if args.verbose { "vaultlens=debug" } else { "vaultlens=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    print_banner();

    // Load configuration
    let config = load_config(&args)?;

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e);
    }

    // Print configuration summary
    config.print_summary();
    if let Some(path) = &args.save_config {
        config.save_to_file(path)?;
        println!("{} Configuration written to {}", style("✓").green(), path);
    }
    println!();

    // =============================================
    // PHASE 1: THE STORE
    // =============================================
    println!("{}", style("═══ PHASE 1: THE STORE ═══").blue().bold());
    println!();

    let fixture = match &config.fixture_path {
        Some(path) => Some(Fixture::from_file(path)?),
        None => None,
    };
    let clock: Arc<dyn Clock> = match fixture.as_ref().and_then(|f| f.now) {
        Some(now) => Arc::new(FixedClock::new(now)),
        None => Arc::new(SystemClock),
    };

    let dashboard = Dashboard::start(DashboardOptions::from_config(&config, clock.now()));
    println!(
        "{} Dashboard started ({} topics, {}s time buckets)",
        style("✓").green(),
        Topic::ALL.len(),
        config.time_bucket_secs
    );

    let mut filter_updates = Vec::new();
    if let Some(search) = &args.search {
        filter_updates.push(FilterUpdate::SetSearch(search.clone()));
    }

    // =============================================
    // PHASE 2: THE SOURCES
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 2: THE SOURCES ═══").magenta().bold());
    println!();

    let start = Instant::now();
    let api = match &fixture {
        Some(fixture) => {
            let sent = fixture.deliver(&dashboard.events(), filter_updates);
            println!("{} Fixture replayed: {} events", style("✓").green(), sent);
            None
        }
        None => {
            let api = ApiSource::from_config(&config)?;
            let bar = spinner(&format!("Fetching {}...", config.api_url));
            let report = api.refresh(&dashboard.events()).await;
            bar.finish_and_clear();
            println!(
                "{} Fetched {} endpoints in {:?}",
                style("✓").green(),
                report.delivered.len(),
                report.elapsed
            );
            for (endpoint, reason) in &report.failed {
                println!("   {} {}: {}", style("✗").red(), endpoint, reason);
            }
            for update in filter_updates {
                dashboard.update_filters(update);
            }
            Some(api)
        }
    };
    // The fixture may already carry an address; the configured one wins
    if let Some(address) = config.wallet()? {
        dashboard.connect(Some(address));
    }

    // =============================================
    // PHASE 3: THE LISTING
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 3: THE LISTING ═══").green().bold());
    println!();

    if !settle(&dashboard).await {
        warn!("Topics did not settle within {:?}", SETTLE_TIMEOUT);
    }
    let rows = render(&dashboard);
    let listed = rows.len();
    log_snapshot(&config, &dashboard, rows);

    for (topic, err) in dashboard.errors() {
        println!("   {} {} failed: {}", style("✗").red(), topic, err);
    }

    if args.watch {
        println!();
        println!(
            "{} Watching: refresh every {}s (Ctrl+C to stop)",
            style("👀").cyan(),
            config.refresh_interval_secs
        );
        dashboard.spawn_ticker(Arc::clone(&clock), Duration::from_secs(config.time_bucket_secs));

        let mut interval = tokio::time::interval(config.refresh_interval());
        interval.tick().await;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if let Some(api) = &api {
                        api.refresh(&dashboard.events()).await;
                    }
                    if settle(&dashboard).await {
                        println!();
                        let rows = render(&dashboard);
                        log_snapshot(&config, &dashboard, rows);
                    }
                }
            }
        }
    }

    // =============================================
    // SUMMARY
    // =============================================
    let state = dashboard.state();
    let total_tvl = dashboard.total_tvl();
    dashboard.shutdown();

    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("{}", style(" ✅ DASHBOARD COMPLETE").green().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!();
    println!("Summary:");
    println!("  • Vaults loaded: {}", state.entities.vaults.len());
    println!("  • Vaults listed: {}", listed);
    println!("  • Total TVL: {}", fmt_usd(total_tvl));
    println!(
        "  • Wallet: {}",
        state
            .connected()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "not connected".to_string())
    );
    println!("  • Elapsed: {:?}", start.elapsed());
    println!();

    if listed == 0 && state.entities.vaults.is_empty() {
        return Err(eyre!("No vaults were loaded"));
    }
    Ok(())
}
