//! Normalized entities: chains, tokens, vaults and promotions
//!
//! Entities arrive from the static config loader and are merged into the
//! store by id. Vault variants are a tagged enum so every computation site
//! matches exhaustively on the kind it supports.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub type ChainId = String;
pub type VaultId = String;
pub type BoostId = String;
pub type CampaignId = String;
pub type OracleId = String;
pub type PlatformId = String;

// ============================================
// CHAINS & TOKENS
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: ChainId,
    pub name: String,
    pub native_symbol: String,
    pub native_decimals: u8,
    pub native_oracle_id: OracleId,
}

/// Chain-scoped token address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenKey {
    pub chain_id: ChainId,
    pub address: Address,
}

impl TokenKey {
    pub fn new(chain_id: impl Into<ChainId>, address: Address) -> Self {
        Self {
            chain_id: chain_id.into(),
            address,
        }
    }
}

impl std::fmt::Display for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub chain_id: ChainId,
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub oracle_id: OracleId,
}

impl Token {
    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.chain_id.clone(), self.address)
    }
}

// ============================================
// VAULTS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    Active,
    Paused,
    Eol,
}

impl Default for VaultStatus {
    fn default() -> Self {
        VaultStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Single,
    Lps,
    Clm,
}

impl Default for AssetType {
    fn default() -> Self {
        AssetType::Single
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultCategory {
    Stable,
    Bluechip,
    Correlated,
}

/// Receipt token of a vault deployed on another chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgedReceipt {
    pub chain_id: ChainId,
    pub address: Address,
}

/// Vault variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VaultKind {
    /// Auto-compounding vault issuing a receipt (share) token
    #[serde(rename_all = "camelCase")]
    Standard {
        receipt_token: Address,
        #[serde(default)]
        bridged: Vec<BridgedReceipt>,
    },
    /// Single-stake reward pool; balances are in deposit-token units
    #[serde(rename_all = "camelCase")]
    Gov { reward_pool: Address },
    /// Concentrated-liquidity manager; the receipt token is the CLM share
    #[serde(rename_all = "camelCase")]
    Cowcentrated { receipt_token: Address },
    /// Reward pool staking the shares of a CLM
    #[serde(rename_all = "camelCase")]
    CowcentratedPool { reward_pool: Address, clm_id: VaultId },
    /// Auto-compounding vault wrapping the shares of a CLM
    #[serde(rename_all = "camelCase")]
    CowcentratedVault {
        receipt_token: Address,
        clm_id: VaultId,
    },
    /// Tokenized vault with an asynchronous withdrawal queue
    #[serde(rename_all = "camelCase")]
    Erc4626 { receipt_token: Address },
}

impl VaultKind {
    pub fn name(&self) -> &'static str {
        match self {
            VaultKind::Standard { .. } => "standard",
            VaultKind::Gov { .. } => "gov",
            VaultKind::Cowcentrated { .. } => "cowcentrated",
            VaultKind::CowcentratedPool { .. } => "cowcentrated-pool",
            VaultKind::CowcentratedVault { .. } => "cowcentrated-vault",
            VaultKind::Erc4626 { .. } => "erc4626",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: VaultId,
    pub name: String,
    pub chain_id: ChainId,
    pub deposit_token: Address,
    #[serde(default)]
    pub status: VaultStatus,
    #[serde(default)]
    pub platform_id: PlatformId,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub safety_score: Option<f64>,
    #[serde(default)]
    pub categories: Vec<VaultCategory>,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub pinned: bool,
    /// Unix seconds
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub kind: VaultKind,
}

impl Vault {
    pub fn deposit_token_key(&self) -> TokenKey {
        TokenKey::new(self.chain_id.clone(), self.deposit_token)
    }

    /// Receipt token, absent for reward-pool style vaults
    pub fn receipt_token(&self) -> Option<Address> {
        match &self.kind {
            VaultKind::Standard { receipt_token, .. }
            | VaultKind::Cowcentrated { receipt_token }
            | VaultKind::CowcentratedVault { receipt_token, .. }
            | VaultKind::Erc4626 { receipt_token } => Some(*receipt_token),
            VaultKind::Gov { .. } | VaultKind::CowcentratedPool { .. } => None,
        }
    }

    pub fn require_receipt_token(&self) -> EngineResult<Address> {
        self.receipt_token()
            .ok_or_else(|| self.mismatch("vault with a receipt token"))
    }

    /// Bridged receipt addresses; only standard vaults carry them
    pub fn require_bridged(&self) -> EngineResult<&[BridgedReceipt]> {
        match &self.kind {
            VaultKind::Standard { bridged, .. } => Ok(bridged),
            _ => Err(self.mismatch("standard")),
        }
    }

    /// Reward pool contract of a gov-style vault
    pub fn require_reward_pool(&self) -> EngineResult<Address> {
        match &self.kind {
            VaultKind::Gov { reward_pool } | VaultKind::CowcentratedPool { reward_pool, .. } => {
                Ok(*reward_pool)
            }
            _ => Err(self.mismatch("gov")),
        }
    }

    /// Gov vaults and CLM pools: no receipt token, never compounded
    pub fn is_gov_like(&self) -> bool {
        matches!(
            self.kind,
            VaultKind::Gov { .. } | VaultKind::CowcentratedPool { .. }
        )
    }

    pub fn is_cowcentrated_like(&self) -> bool {
        matches!(
            self.kind,
            VaultKind::Cowcentrated { .. }
                | VaultKind::CowcentratedPool { .. }
                | VaultKind::CowcentratedVault { .. }
        )
    }

    /// The CLM whose DEX position backs this vault
    pub fn underlying_clm_id(&self) -> Option<&str> {
        match &self.kind {
            VaultKind::Cowcentrated { .. } => Some(&self.id),
            VaultKind::CowcentratedPool { clm_id, .. }
            | VaultKind::CowcentratedVault { clm_id, .. } => Some(clm_id),
            _ => None,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.status == VaultStatus::Eol
    }

    pub fn is_paused(&self) -> bool {
        self.status == VaultStatus::Paused
    }

    fn mismatch(&self, expected: &'static str) -> EngineError {
        EngineError::VariantMismatch {
            vault_id: self.id.clone(),
            expected,
            actual: self.kind.name(),
        }
    }
}

// ============================================
// PROMOTIONS
// ============================================

/// Separately staked, time-boxed reward program on a vault's receipt token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boost {
    pub id: BoostId,
    pub vault_id: VaultId,
    pub chain_id: ChainId,
    pub contract: Address,
    /// Token staked into the boost (the vault receipt token)
    pub staked_token: Address,
    #[serde(default)]
    pub reward_tokens: Vec<Address>,
    /// Scheduled start (unix seconds), if announced ahead of the rewards
    #[serde(default)]
    pub starts_at: Option<i64>,
    #[serde(default)]
    pub partner: Option<String>,
}

/// Off-chain incentive campaign record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub vault_id: VaultId,
    pub provider_id: String,
    pub chain_id: ChainId,
    #[serde(rename = "type")]
    pub campaign_type: String,
    /// Unix seconds, inclusive
    pub starts_at: i64,
    /// Unix seconds, exclusive
    pub ends_at: i64,
    pub apr: f64,
}

impl Campaign {
    pub fn is_live(&self, now: i64) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

/// Derived promotion state, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    Prestake,
    Active,
    Inactive,
}

impl std::fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromotionStatus::Prestake => write!(f, "prestake"),
            PromotionStatus::Active => write!(f, "active"),
            PromotionStatus::Inactive => write!(f, "inactive"),
        }
    }
}
