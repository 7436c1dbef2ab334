//! Public vault API source
//!
//! Fetches every endpoint concurrently and delivers each one as a store
//! event the moment it lands. An endpoint that fails is logged and skipped,
//! so whatever depends on it stays Loading.
//!
//! The API has no contract reads. Vault contract data is approximated from
//! the `/tvl` figures, the deposit prices and the advertised share price.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::scheduler::EventSender;
use crate::store::*;

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVault {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub chain: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub token_decimals: Option<u8>,
    #[serde(default)]
    pub oracle_id: Option<String>,
    #[serde(default)]
    pub earned_token_address: Option<String>,
    #[serde(default)]
    pub earn_contract_address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub platform_id: Option<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default, rename = "type")]
    pub vault_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub safety_score: Option<f64>,
    /// 18-decimal integer string, or a plain number
    #[serde(default)]
    pub price_per_full_share: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBoost {
    pub id: String,
    pub pool_id: String,
    pub chain: String,
    pub earn_contract_address: String,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub earned_token_address: Option<String>,
    #[serde(default)]
    pub partners: Vec<String>,
    #[serde(default)]
    pub starts_at: Option<i64>,
}

// ============================================
// PARSING
// ============================================

fn parse_address(raw: Option<&str>) -> Option<Address> {
    raw.and_then(|s| Address::from_str(s.trim()).ok())
}

fn parse_status(raw: Option<&str>) -> VaultStatus {
    match raw {
        Some("eol") => VaultStatus::Eol,
        Some("paused") => VaultStatus::Paused,
        _ => VaultStatus::Active,
    }
}

fn parse_ppfs(raw: Option<&serde_json::Value>) -> Option<f64> {
    let ppfs = match raw? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok().map(|v| v / 1e18),
        _ => None,
    };
    ppfs.filter(|v| v.is_finite() && *v > 0.0)
}

/// Vault entities plus their deposit tokens; entries missing an address are
/// dropped. CLM wrappers are linked to their CLM by deposit token.
pub fn parse_vaults(api: &[ApiVault]) -> (Vec<Vault>, Vec<Token>) {
    // CLM receipt token → CLM vault id
    let clms: HashMap<(String, Address), String> = api
        .iter()
        .filter(|v| v.vault_type.as_deref() == Some("cowcentrated"))
        .filter_map(|v| {
            let receipt = parse_address(v.earned_token_address.as_deref())?;
            Some(((v.chain.clone(), receipt), v.id.clone()))
        })
        .collect();

    let mut vaults = Vec::with_capacity(api.len());
    let mut tokens = Vec::new();
    for entry in api {
        let Some(deposit_token) = parse_address(entry.token_address.as_deref()) else {
            debug!("Skipping vault {} without a deposit token address", entry.id);
            continue;
        };
        let receipt = parse_address(entry.earned_token_address.as_deref());
        let reward_pool = parse_address(entry.earn_contract_address.as_deref());
        let clm_id = clms.get(&(entry.chain.clone(), deposit_token)).cloned();

        let kind = match (entry.vault_type.as_deref(), receipt, reward_pool, clm_id) {
            (Some("gov"), _, Some(reward_pool), Some(clm_id)) => {
                VaultKind::CowcentratedPool { reward_pool, clm_id }
            }
            (Some("gov"), _, Some(reward_pool), None) => VaultKind::Gov { reward_pool },
            (Some("cowcentrated"), Some(receipt_token), _, _) => {
                VaultKind::Cowcentrated { receipt_token }
            }
            (Some("erc4626"), Some(receipt_token), _, _) => VaultKind::Erc4626 { receipt_token },
            (_, Some(receipt_token), _, Some(clm_id)) => VaultKind::CowcentratedVault {
                receipt_token,
                clm_id,
            },
            (_, Some(receipt_token), _, None) => VaultKind::Standard {
                receipt_token,
                bridged: vec![],
            },
            _ => {
                debug!("Skipping vault {}: no receipt token or reward pool", entry.id);
                continue;
            }
        };

        let asset_type = if kind.name().starts_with("cowcentrated") {
            AssetType::Clm
        } else if entry.assets.len() > 1 {
            AssetType::Lps
        } else {
            AssetType::Single
        };

        if let Some(oracle_id) = &entry.oracle_id {
            tokens.push(Token {
                chain_id: entry.chain.clone(),
                address: deposit_token,
                symbol: entry.token.clone().unwrap_or_else(|| oracle_id.clone()),
                decimals: entry.token_decimals.unwrap_or(18),
                oracle_id: oracle_id.clone(),
            });
        }

        vaults.push(Vault {
            id: entry.id.clone(),
            name: entry.name.clone(),
            chain_id: entry.chain.clone(),
            deposit_token,
            status: parse_status(entry.status.as_deref()),
            platform_id: entry.platform_id.clone().unwrap_or_default(),
            assets: entry.assets.clone(),
            safety_score: entry.safety_score,
            categories: vec![],
            asset_type,
            pinned: false,
            created_at: entry.created_at.unwrap_or(0),
            kind,
        });
    }
    (vaults, tokens)
}

pub fn parse_boosts(api: &[ApiBoost]) -> Vec<Boost> {
    api.iter()
        .filter_map(|b| {
            let contract = parse_address(Some(b.earn_contract_address.as_str()))?;
            let staked_token = parse_address(b.token_address.as_deref())?;
            Some(Boost {
                id: b.id.clone(),
                vault_id: b.pool_id.clone(),
                chain_id: b.chain.clone(),
                contract,
                staked_token,
                reward_tokens: parse_address(b.earned_token_address.as_deref())
                    .into_iter()
                    .collect(),
                starts_at: b.starts_at,
                partner: b.partners.first().cloned(),
            })
        })
        .collect()
}

/// `/apy/breakdown` mixes numbers with nulls and strings; only finite
/// numeric fields are kept, and a vault entry that is not an object is skipped
pub fn parse_apy_breakdown(raw: &BTreeMap<VaultId, Value>) -> BTreeMap<VaultId, RawApy> {
    raw.iter()
        .filter_map(|(id, entry)| {
            let fields = entry.as_object()?;
            let values = fields
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.as_f64()?)))
                .filter(|(_, value)| value.is_finite());
            Some((id.clone(), RawApy::from_pairs(values)))
        })
        .collect()
}

/// `/tvl` is keyed by numeric chain id, then vault id
pub fn parse_tvl(raw: &BTreeMap<String, BTreeMap<String, f64>>) -> HashMap<VaultId, f64> {
    raw.values()
        .flat_map(|by_vault| by_vault.iter())
        .map(|(id, tvl)| (id.clone(), *tvl))
        .collect()
}

/// Contract-data stand-ins from API TVL: locked deposit = TVL / price
pub fn contract_from_tvl(
    vaults: &[ApiVault],
    prices: &HashMap<OracleId, f64>,
    tvl: &HashMap<VaultId, f64>,
) -> Vec<(VaultId, VaultContractData)> {
    vaults
        .iter()
        .filter_map(|v| {
            let usd = *tvl.get(&v.id)?;
            let price = *prices.get(v.oracle_id.as_ref()?)?;
            if price <= 0.0 {
                return None;
            }
            let balance = usd / price;
            let ppfs = parse_ppfs(v.price_per_full_share.as_ref()).unwrap_or(1.0);
            Some((
                v.id.clone(),
                VaultContractData {
                    price_per_full_share: ppfs,
                    balance,
                    total_supply: balance / ppfs,
                },
            ))
        })
        .collect()
}

// ============================================
// API SOURCE
// ============================================

enum Payload {
    Vaults(Vec<ApiVault>),
    GovVaults(Vec<ApiVault>),
    Boosts(Vec<ApiBoost>),
    Prices(HashMap<OracleId, f64>),
    Lps(HashMap<OracleId, f64>),
    Apy(BTreeMap<VaultId, Value>),
    Tvl(BTreeMap<String, BTreeMap<String, f64>>),
}

/// What one refresh delivered
#[derive(Debug, Default)]
pub struct FetchReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
    pub elapsed: Duration,
}

pub struct ApiSource {
    http_client: Client,
    base_url: String,
}

impl ApiSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url, config.http_timeout())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(eyre!("{} returned {}", path, response.status()));
        }
        Ok(response.json().await?)
    }

    async fn fetch(&self, endpoint: &'static str) -> (&'static str, Result<Payload>) {
        let payload = match endpoint {
            "/vaults" => self.get("/vaults").await.map(Payload::Vaults),
            "/gov-vaults" => self.get("/gov-vaults").await.map(Payload::GovVaults),
            "/boosts" => self.get("/boosts").await.map(Payload::Boosts),
            "/prices" => self.get("/prices").await.map(Payload::Prices),
            "/lps" => self.get("/lps").await.map(Payload::Lps),
            "/apy/breakdown" => self.get("/apy/breakdown").await.map(Payload::Apy),
            "/tvl" => self.get("/tvl").await.map(Payload::Tvl),
            other => Err(eyre!("Unknown endpoint {}", other)),
        };
        (endpoint, payload)
    }

    /// Fetch everything once, delivering each endpoint as it completes
    pub async fn refresh(&self, events: &EventSender) -> FetchReport {
        const ENDPOINTS: [&str; 7] = [
            "/vaults",
            "/gov-vaults",
            "/boosts",
            "/prices",
            "/lps",
            "/apy/breakdown",
            "/tvl",
        ];
        let started = Instant::now();
        let mut report = FetchReport::default();

        let mut in_flight: FuturesUnordered<_> =
            ENDPOINTS.into_iter().map(|endpoint| self.fetch(endpoint)).collect();

        let mut api_vaults: Vec<ApiVault> = Vec::new();
        let mut vault_parts = 0;
        let mut prices: HashMap<OracleId, f64> = HashMap::new();
        let mut price_parts = 0;
        let mut tvl: Option<HashMap<VaultId, f64>> = None;

        while let Some((endpoint, result)) = in_flight.next().await {
            let payload = match result {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("⚠️  {} fetch failed: {}", endpoint, e);
                    report.failed.push((endpoint, e.to_string()));
                    continue;
                }
            };
            report.delivered.push(endpoint);

            match payload {
                Payload::Vaults(list) | Payload::GovVaults(list) => {
                    // Deliver once both vault lists are in, so the gov → CLM links resolve
                    api_vaults.extend(list);
                    vault_parts += 1;
                    if vault_parts == 2 {
                        let (vaults, tokens) = parse_vaults(&api_vaults);
                        info!("🏦 {} vaults, {} deposit tokens", vaults.len(), tokens.len());
                        events.send(StoreEvent::TokensLoaded(tokens));
                        events.send(StoreEvent::VaultsLoaded(vaults));
                    }
                }
                Payload::Boosts(list) => {
                    events.send(StoreEvent::BoostsLoaded(parse_boosts(&list)));
                }
                Payload::Prices(list) | Payload::Lps(list) => {
                    events.send(StoreEvent::PricesLoaded(
                        list.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                    ));
                    prices.extend(list);
                    price_parts += 1;
                }
                Payload::Apy(raw) => {
                    let apy = parse_apy_breakdown(&raw);
                    debug!("📈 APY breakdown for {} of {} vaults", apy.len(), raw.len());
                    events.send(StoreEvent::ApyLoaded(apy.into_iter().collect()));
                }
                Payload::Tvl(raw) => tvl = Some(parse_tvl(&raw)),
            }
        }

        // A lone failed vault list still delivers the other one
        if vault_parts == 1 {
            let (vaults, tokens) = parse_vaults(&api_vaults);
            events.send(StoreEvent::TokensLoaded(tokens));
            events.send(StoreEvent::VaultsLoaded(vaults));
        }
        match tvl {
            Some(tvl) if vault_parts > 0 && price_parts > 0 => {
                events.send(StoreEvent::ContractDataLoaded {
                    vaults: contract_from_tvl(&api_vaults, &prices, &tvl),
                    boosts: vec![],
                });
            }
            _ => debug!("No contract data this refresh"),
        }

        report.elapsed = started.elapsed();
        info!(
            "🔄 Refresh: {} endpoints ok, {} failed in {:?}",
            report.delivered.len(),
            report.failed.len(),
            report.elapsed
        );
        report
    }
}
