//! Configuration for VaultLens
//!
//! Loaded from environment variables (with `.env` support) or a TOML file.
//! Covers the data sources, the connected wallet, recompute debouncing and
//! the initial listing view.

use alloy_primitives::Address;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::apy::CampaignRule;
use crate::filter::{FilterCriteria, SortDirection, SortKey};
use crate::scheduler::Topic;

// ============================================
// SCHEDULER DEBOUNCE
// ============================================

/// Debounce window per recompute topic, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicDebounce {
    pub total_apy_ms: u64,
    pub avg_apy_ms: u64,
    pub balance_ms: u64,
    pub tvl_ms: u64,
    pub filters_ms: u64,
}

impl Default for TopicDebounce {
    fn default() -> Self {
        Self {
            total_apy_ms: 100,
            avg_apy_ms: 100,
            balance_ms: 100,
            tvl_ms: 100,
            filters_ms: 50,
        }
    }
}

impl TopicDebounce {
    /// Same window for every topic
    pub fn uniform(ms: u64) -> Self {
        Self {
            total_apy_ms: ms,
            avg_apy_ms: ms,
            balance_ms: ms,
            tvl_ms: ms,
            filters_ms: ms,
        }
    }

    pub fn for_topic(&self, topic: Topic) -> Duration {
        let ms = match topic {
            Topic::TotalApy => self.total_apy_ms,
            Topic::AvgApy => self.avg_apy_ms,
            Topic::Balance => self.balance_ms,
            Topic::Tvl => self.tvl_ms,
            Topic::Filters => self.filters_ms,
        };
        Duration::from_millis(ms)
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Sources ==========
    /// Base URL of the vault/price/APY API
    pub api_url: String,

    /// Load everything from a JSON fixture instead of the API
    pub fixture_path: Option<String>,

    pub http_timeout_secs: u64,

    /// Seconds between refreshes in watch mode
    pub refresh_interval_secs: u64,

    // ========== Wallet ==========
    /// Wallet whose balances are broken down (0x-prefixed)
    pub wallet_address: Option<String>,

    // ========== Scheduler ==========
    /// `now` is floored to this many seconds for time-dependent figures
    pub time_bucket_secs: u64,

    // ========== Listing ==========
    pub default_sort: SortKey,

    pub default_sort_direction: SortDirection,

    /// Initial chain filter (empty = all chains)
    pub chains: Vec<String>,

    // ========== Snapshot Log ==========
    /// Append a JSON line per refresh
    pub snapshot_log: bool,

    pub snapshot_log_path: String,

    pub debounce: TopicDebounce,

    /// (provider, chain, type) rules that mark a campaign as boost-like
    pub boost_like_campaigns: Vec<CampaignRule>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Sources
            api_url: env::var("API_URL").unwrap_or(defaults.api_url),
            fixture_path: env::var("FIXTURE_PATH").ok(),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            refresh_interval_secs: env_or("REFRESH_INTERVAL_SECS", defaults.refresh_interval_secs),

            // Wallet
            wallet_address: env::var("WALLET_ADDRESS").ok(),

            // Scheduler
            time_bucket_secs: env_or("TIME_BUCKET_SECS", defaults.time_bucket_secs),
            debounce: TopicDebounce {
                total_apy_ms: env_or("DEBOUNCE_TOTAL_APY_MS", defaults.debounce.total_apy_ms),
                avg_apy_ms: env_or("DEBOUNCE_AVG_APY_MS", defaults.debounce.avg_apy_ms),
                balance_ms: env_or("DEBOUNCE_BALANCE_MS", defaults.debounce.balance_ms),
                tvl_ms: env_or("DEBOUNCE_TVL_MS", defaults.debounce.tvl_ms),
                filters_ms: env_or("DEBOUNCE_FILTERS_MS", defaults.debounce.filters_ms),
            },

            // Listing
            default_sort: env_or("DEFAULT_SORT", defaults.default_sort),
            default_sort_direction: env_or("SORT_DIRECTION", defaults.default_sort_direction),
            chains: env::var("CHAINS")
                .map(|s| split_list(&s))
                .unwrap_or_default(),

            // Campaigns
            boost_like_campaigns: env::var("BOOST_LIKE_CAMPAIGNS")
                .map(|s| Self::parse_campaign_rules(&s))
                .unwrap_or(defaults.boost_like_campaigns),

            // Snapshot log
            snapshot_log: env_or("SNAPSHOT_LOG", defaults.snapshot_log),
            snapshot_log_path: env::var("SNAPSHOT_LOG_PATH").unwrap_or(defaults.snapshot_log_path),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Boost-like campaigns seen on the dashboard today
    fn default_campaign_rules() -> Vec<CampaignRule> {
        vec![
            CampaignRule {
                provider_id: "merkl".to_string(),
                chain_id: "sonic".to_string(),
                campaign_type: "boost".to_string(),
            },
            CampaignRule {
                provider_id: "stellaswap".to_string(),
                chain_id: "moonbeam".to_string(),
                campaign_type: "boost".to_string(),
            },
        ]
    }

    /// `provider:chain:type` entries, comma separated
    fn parse_campaign_rules(raw: &str) -> Vec<CampaignRule> {
        split_list(raw)
            .iter()
            .filter_map(|entry| {
                let mut parts = entry.split(':').map(str::trim);
                match (parts.next(), parts.next(), parts.next(), parts.next()) {
                    (Some(provider), Some(chain), Some(kind), None) => Some(CampaignRule {
                        provider_id: provider.to_string(),
                        chain_id: chain.to_string(),
                        campaign_type: kind.to_string(),
                    }),
                    _ => {
                        tracing::warn!("Ignoring malformed campaign rule: {}", entry);
                        None
                    }
                }
            })
            .collect()
    }

    /// Parsed wallet address, if one is configured
    pub fn wallet(&self) -> Result<Option<Address>> {
        match &self.wallet_address {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => Address::from_str(raw.trim())
                .map(Some)
                .map_err(|e| eyre::eyre!("Invalid WALLET_ADDRESS {}: {}", raw, e)),
        }
    }

    /// Filter criteria the listing starts from
    pub fn initial_filters(&self) -> FilterCriteria {
        FilterCriteria {
            chains: self.chains.iter().cloned().collect(),
            sort: self.default_sort,
            direction: self.default_sort_direction,
            ..FilterCriteria::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validate configuration before starting
    pub fn validate(&self) -> Result<()> {
        if self.fixture_path.is_none()
            && !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://"))
        {
            return Err(eyre::eyre!(
                "Invalid API_URL {:?} - expected an http(s) URL",
                self.api_url
            ));
        }
        if let Some(path) = &self.fixture_path {
            if !Path::new(path).exists() {
                return Err(eyre::eyre!("FIXTURE_PATH {} does not exist", path));
            }
        }
        self.wallet()?;

        if self.time_bucket_secs == 0 {
            return Err(eyre::eyre!("TIME_BUCKET_SECS must be at least 1"));
        }
        if self.refresh_interval_secs < 5 {
            return Err(eyre::eyre!(
                "REFRESH_INTERVAL_SECS below 5 will hammer the API (currently {})",
                self.refresh_interval_secs
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(eyre::eyre!("HTTP_TIMEOUT_SECS must be at least 1"));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let source = match &self.fixture_path {
            Some(path) => format!("fixture {}", path),
            None => self.api_url.clone(),
        };
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 VAULTLENS - CONFIGURATION                  ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SOURCES                                                    ║");
        println!("║ • Source:          {:^40} ║", truncate(&source, 40));
        println!("║ • HTTP Timeout:    {:>38}s ║", self.http_timeout_secs);
        println!("║ • Refresh Every:   {:>38}s ║", self.refresh_interval_secs);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ WALLET                                                     ║");
        println!("║ • Address:         {:^40} ║",
            match &self.wallet_address {
                Some(addr) => truncate(addr, 40),
                None => "✗ Not Set".to_string(),
            }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SCHEDULER                                                  ║");
        println!("║ • Time Bucket:     {:>38}s ║", self.time_bucket_secs);
        println!("║ • Debounce APY:    {:>36}ms ║", self.debounce.total_apy_ms);
        println!("║ • Debounce Filter: {:>36}ms ║", self.debounce.filters_ms);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ LISTING                                                    ║");
        println!("║ • Sort:            {:^40} ║",
            format!("{} ({:?})", self.default_sort.name(), self.default_sort_direction)
        );
        println!("║ • Chains:          {:^40} ║",
            if self.chains.is_empty() { "all".to_string() } else { truncate(&self.chains.join(","), 40) }
        );
        println!("║ • Boost Campaigns: {:^40} ║", self.boost_like_campaigns.len());
        println!("║ • Snapshot Log:    {:^40} ║",
            if self.snapshot_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.beefy.finance".to_string(),
            fixture_path: None,
            http_timeout_secs: 15,
            refresh_interval_secs: 60,
            wallet_address: None,
            time_bucket_secs: 60,
            default_sort: SortKey::Default,
            default_sort_direction: SortDirection::Desc,
            chains: vec![],
            snapshot_log: false,
            snapshot_log_path: "./logs/dashboard_snapshots.log".to_string(),
            debounce: TopicDebounce::default(),
            boost_like_campaigns: Self::default_campaign_rules(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

// ============================================
// SNAPSHOT LOGGER
// ============================================

use chrono::{DateTime, Utc};
use std::io::Write;

/// One vault row of a dashboard snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub vault_id: String,
    pub apy: Option<f64>,
    pub boosted: bool,
    pub tvl_usd: Option<f64>,
    pub deposited: Option<f64>,
}

/// The sorted listing as of one refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Time bucket the figures were derived at
    pub as_of: i64,
    pub wallet: Option<String>,
    pub vault_count: usize,
    pub total_tvl_usd: f64,
    pub rows: Vec<SnapshotRow>,
}

impl DashboardSnapshot {
    /// Append this snapshot as one JSON line
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
