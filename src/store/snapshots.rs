//! Raw Snapshot Cache
//!
//! Numeric snapshots from the two independent raw sources:
//! - contract reads: share prices, locked balances, boost reward streams
//! - off-chain API: APY breakdowns, average-APY history, underlying pool TVL
//!
//! plus per-wallet balances. All amounts are already scaled to token units.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::entities::{BoostId, ChainId, OracleId, PlatformId, TokenKey, VaultId};
use super::table::Table;

// ============================================
// CONTRACT SNAPSHOT
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultContractData {
    /// Deposit tokens per receipt share
    pub price_per_full_share: f64,
    /// Deposit tokens locked in the vault and its strategy
    pub balance: f64,
    /// Receipt shares (or staked deposit tokens for reward pools)
    pub total_supply: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardStream {
    pub token: Address,
    /// Reward tokens emitted per second
    pub rate: f64,
    /// Unix seconds; 0 while the rewards have not been notified yet
    pub period_finish: i64,
}

impl RewardStream {
    pub fn is_emitting(&self, now: i64) -> bool {
        self.rate > 0.0 && self.period_finish > now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostContractData {
    /// Receipt shares staked in the boost
    pub total_supply: f64,
    #[serde(default)]
    pub rewards: Vec<RewardStream>,
}

#[derive(Debug, Clone, Default)]
pub struct ContractSnapshot {
    pub vaults: Table<VaultId, VaultContractData>,
    pub boosts: Table<BoostId, BoostContractData>,
}

// ============================================
// API SNAPSHOT
// ============================================

/// Named APR/APY components as delivered by the breakdown API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawApy {
    pub values: BTreeMap<String, f64>,
}

impl RawApy {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Explicit compounded total, when the API supplies one
    pub fn total_apy(&self) -> Option<f64> {
        self.get("totalApy")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvgApyPoint {
    pub days: u32,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvgApyHistory {
    pub periods: Vec<AvgApyPoint>,
}

/// TVL of the DEX pool a CLM position lives in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderlyingTvl {
    pub tvl_usd: f64,
    pub platform_id: PlatformId,
}

#[derive(Debug, Clone, Default)]
pub struct ApiSnapshot {
    pub apy: Table<VaultId, RawApy>,
    pub avg_apy: Table<VaultId, AvgApyHistory>,
    pub underlying_tvl: Table<VaultId, UnderlyingTvl>,
}

/// `oracleId → USD` price mapping
pub type PriceTable = Table<OracleId, f64>;

// ============================================
// WALLET SNAPSHOT
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceKey {
    pub chain_id: ChainId,
    pub token: Address,
    pub spender: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: u64,
    /// Receipt shares locked in the request
    pub shares: f64,
    /// Unix seconds after which the request can be claimed
    pub claimable_at: i64,
    #[serde(default)]
    pub claimed: bool,
}

/// Everything known about one wallet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletBalances {
    pub tokens: HashMap<TokenKey, f64>,
    pub boosts: HashMap<BoostId, f64>,
    pub gov_vaults: HashMap<VaultId, f64>,
    pub allowances: HashMap<AllowanceKey, f64>,
    pub pending_withdrawals: HashMap<VaultId, Vec<WithdrawalRequest>>,
}

impl WalletBalances {
    pub fn token(&self, chain_id: &str, address: Address) -> f64 {
        self.tokens
            .get(&TokenKey::new(chain_id, address))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn boost(&self, boost_id: &str) -> f64 {
        self.boosts.get(boost_id).copied().unwrap_or(0.0)
    }

    pub fn gov_vault(&self, vault_id: &str) -> f64 {
        self.gov_vaults.get(vault_id).copied().unwrap_or(0.0)
    }

    pub fn allowance(&self, chain_id: &str, token: Address, spender: Address) -> f64 {
        let key = AllowanceKey {
            chain_id: chain_id.to_string(),
            token,
            spender,
        };
        self.allowances.get(&key).copied().unwrap_or(0.0)
    }

    /// Shares still locked in unclaimed withdrawal requests
    pub fn pending_withdrawal_shares(&self, vault_id: &str) -> f64 {
        self.pending_withdrawals
            .get(vault_id)
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| !r.claimed)
                    .map(|r| r.shares)
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalletSnapshot {
    pub connected: Option<Address>,
    pub balances: Table<Address, WalletBalances>,
}

impl WalletSnapshot {
    pub fn balances_for(&self, address: &Address) -> Option<&WalletBalances> {
        self.balances.get(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_withdrawal_skips_claimed_requests() {
        let mut wallet = WalletBalances::default();
        wallet.pending_withdrawals.insert(
            "vault".to_string(),
            vec![
                WithdrawalRequest { id: 1, shares: 3.0, claimable_at: 10, claimed: false },
                WithdrawalRequest { id: 2, shares: 4.0, claimable_at: 20, claimed: true },
                WithdrawalRequest { id: 3, shares: 0.5, claimable_at: 30, claimed: false },
            ],
        );
        assert_eq!(wallet.pending_withdrawal_shares("vault"), 3.5);
        assert_eq!(wallet.pending_withdrawal_shares("other"), 0.0);
    }

    #[test]
    fn test_raw_apy_is_a_plain_json_map() {
        let raw: RawApy =
            serde_json::from_str(r#"{"vaultApr": 0.1, "totalApy": 0.105}"#).unwrap();
        assert_eq!(raw.get("vaultApr"), Some(0.1));
        assert_eq!(raw.total_apy(), Some(0.105));
        assert!(!raw.has("tradingApr"));
    }

    #[test]
    fn test_reward_stream_emitting_window() {
        let stream = RewardStream { token: Address::ZERO, rate: 1.0, period_finish: 100 };
        assert!(stream.is_emitting(99));
        assert!(!stream.is_emitting(100));
        let idle = RewardStream { rate: 0.0, ..stream };
        assert!(!idle.is_emitting(0));
    }
}
