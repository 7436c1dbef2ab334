//! Entity Store and Raw Snapshot Cache
//!
//! Responsible for:
//! - Normalized entity tables (chains, tokens, vaults, boosts, campaigns)
//! - Raw contract/API/wallet snapshots with per-entry revisions
//! - Applying fetch-completion events to an immutable, `Arc`-shared state

mod entities;
mod entity_store;
mod events;
mod snapshots;
mod state;
mod table;

pub use entities::{
    AssetType, BoostId, Boost, BridgedReceipt, Campaign, CampaignId, Chain, ChainId, OracleId,
    PlatformId, PromotionStatus, Token, TokenKey, Vault, VaultCategory, VaultId, VaultKind,
    VaultStatus,
};
pub use entity_store::EntityStore;
pub use events::{Slice, StoreEvent};
pub use snapshots::{
    AllowanceKey, ApiSnapshot, AvgApyHistory, AvgApyPoint, BoostContractData, ContractSnapshot,
    PriceTable, RawApy, RewardStream, UnderlyingTvl, VaultContractData, WalletBalances,
    WalletSnapshot, WithdrawalRequest,
};
pub use state::{bucket_start, DashboardState, SourceFlags};
pub use table::Table;
