//! Fetch-completion events
//!
//! The only way the store changes. Each event names one source delivery
//! (or one user-driven criteria change) and is applied serially.

use alloy_primitives::Address;

use super::entities::*;
use super::snapshots::*;
use crate::filter::FilterUpdate;

#[derive(Debug, Clone)]
pub enum StoreEvent {
    ChainsLoaded(Vec<Chain>),
    TokensLoaded(Vec<Token>),
    VaultsLoaded(Vec<Vault>),
    BoostsLoaded(Vec<Boost>),
    CampaignsLoaded(Vec<Campaign>),
    PricesLoaded(Vec<(OracleId, f64)>),
    ContractDataLoaded {
        vaults: Vec<(VaultId, VaultContractData)>,
        boosts: Vec<(BoostId, BoostContractData)>,
    },
    ApyLoaded(Vec<(VaultId, RawApy)>),
    AvgApyLoaded(Vec<(VaultId, AvgApyHistory)>),
    UnderlyingTvlLoaded(Vec<(VaultId, UnderlyingTvl)>),
    WalletBalancesLoaded {
        address: Address,
        balances: WalletBalances,
    },
    AddressChanged(Option<Address>),
    FiltersChanged(FilterUpdate),
    /// Wall-clock tick, unix seconds
    Tick(i64),
}

impl StoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::ChainsLoaded(_) => "chains",
            StoreEvent::TokensLoaded(_) => "tokens",
            StoreEvent::VaultsLoaded(_) => "vaults",
            StoreEvent::BoostsLoaded(_) => "boosts",
            StoreEvent::CampaignsLoaded(_) => "campaigns",
            StoreEvent::PricesLoaded(_) => "prices",
            StoreEvent::ContractDataLoaded { .. } => "contract-data",
            StoreEvent::ApyLoaded(_) => "apy",
            StoreEvent::AvgApyLoaded(_) => "avg-apy",
            StoreEvent::UnderlyingTvlLoaded(_) => "underlying-tvl",
            StoreEvent::WalletBalancesLoaded { .. } => "wallet-balances",
            StoreEvent::AddressChanged(_) => "address",
            StoreEvent::FiltersChanged(_) => "filters",
            StoreEvent::Tick(_) => "tick",
        }
    }
}

/// Store slice touched by an applied event; the scheduler routes on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Chains,
    Tokens,
    Vaults,
    Boosts,
    Campaigns,
    Prices,
    Contract,
    Apy,
    AvgApy,
    UnderlyingTvl,
    Wallet,
    Address,
    Filters,
    Sort,
    Clock,
}
