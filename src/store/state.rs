//! Store snapshot threaded through every computation
//!
//! `DashboardState` is an immutable value from the engines' point of view:
//! the event loop clones it (cheap, every slice is an `Arc`), applies one
//! event with copy-on-write on the touched slice, and swaps the whole
//! record in.

use alloy_primitives::Address;
use std::sync::Arc;
use tracing::debug;

use super::entity_store::EntityStore;
use super::events::{Slice, StoreEvent};
use super::snapshots::*;
use crate::filter::FilterCriteria;

/// Which sources have delivered at least once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceFlags {
    pub chains: bool,
    pub tokens: bool,
    pub vaults: bool,
    pub boosts: bool,
    pub campaigns: bool,
    pub prices: bool,
    pub contract: bool,
    pub apy: bool,
    pub avg_apy: bool,
    pub underlying_tvl: bool,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub entities: Arc<EntityStore>,
    pub contract: Arc<ContractSnapshot>,
    pub api: Arc<ApiSnapshot>,
    pub prices: Arc<PriceTable>,
    pub wallet: Arc<WalletSnapshot>,
    pub filters: Arc<FilterCriteria>,
    pub loaded: SourceFlags,
    /// Start of the current time bucket, unix seconds
    pub now: i64,
    time_bucket_secs: i64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(0, 60, FilterCriteria::default())
    }
}

/// Floor a timestamp to the start of its bucket
pub fn bucket_start(ts: i64, bucket_secs: i64) -> i64 {
    if bucket_secs <= 1 {
        return ts;
    }
    ts - ts.rem_euclid(bucket_secs)
}

impl DashboardState {
    pub fn new(now: i64, time_bucket_secs: u64, filters: FilterCriteria) -> Self {
        let time_bucket_secs = time_bucket_secs.max(1) as i64;
        Self {
            entities: Arc::new(EntityStore::new()),
            contract: Arc::new(ContractSnapshot::default()),
            api: Arc::new(ApiSnapshot::default()),
            prices: Arc::new(PriceTable::new()),
            wallet: Arc::new(WalletSnapshot::default()),
            filters: Arc::new(filters),
            loaded: SourceFlags::default(),
            now: bucket_start(now, time_bucket_secs),
            time_bucket_secs,
        }
    }

    pub fn time_bucket_secs(&self) -> i64 {
        self.time_bucket_secs
    }

    /// Currently connected wallet
    pub fn connected(&self) -> Option<Address> {
        self.wallet.connected
    }

    pub fn wallet_balances(&self, address: &Address) -> Option<&WalletBalances> {
        self.wallet.balances_for(address)
    }

    /// Apply one event. Returns the slices that actually changed.
    pub fn apply(&mut self, event: StoreEvent) -> Vec<Slice> {
        let name = event.name();
        let changed = match event {
            StoreEvent::ChainsLoaded(chains) => {
                let first = !std::mem::replace(&mut self.loaded.chains, true);
                let merged = Arc::make_mut(&mut self.entities).merge_chains(chains);
                flag(first || merged, Slice::Chains)
            }
            StoreEvent::TokensLoaded(tokens) => {
                let first = !std::mem::replace(&mut self.loaded.tokens, true);
                let merged = Arc::make_mut(&mut self.entities).merge_tokens(tokens);
                flag(first || merged, Slice::Tokens)
            }
            StoreEvent::VaultsLoaded(vaults) => {
                let first = !std::mem::replace(&mut self.loaded.vaults, true);
                let merged = Arc::make_mut(&mut self.entities).merge_vaults(vaults);
                flag(first || merged, Slice::Vaults)
            }
            StoreEvent::BoostsLoaded(boosts) => {
                let first = !std::mem::replace(&mut self.loaded.boosts, true);
                let merged = Arc::make_mut(&mut self.entities).merge_boosts(boosts);
                flag(first || merged, Slice::Boosts)
            }
            StoreEvent::CampaignsLoaded(campaigns) => {
                let first = !std::mem::replace(&mut self.loaded.campaigns, true);
                let merged = Arc::make_mut(&mut self.entities).merge_campaigns(campaigns);
                flag(first || merged, Slice::Campaigns)
            }
            StoreEvent::PricesLoaded(prices) => {
                let first = !std::mem::replace(&mut self.loaded.prices, true);
                let merged = Arc::make_mut(&mut self.prices).merge(prices);
                flag(first || merged, Slice::Prices)
            }
            StoreEvent::ContractDataLoaded { vaults, boosts } => {
                let first = !std::mem::replace(&mut self.loaded.contract, true);
                let contract = Arc::make_mut(&mut self.contract);
                let merged = contract.vaults.merge(vaults) | contract.boosts.merge(boosts);
                flag(first || merged, Slice::Contract)
            }
            StoreEvent::ApyLoaded(apys) => {
                let first = !std::mem::replace(&mut self.loaded.apy, true);
                let merged = Arc::make_mut(&mut self.api).apy.merge(apys);
                flag(first || merged, Slice::Apy)
            }
            StoreEvent::AvgApyLoaded(history) => {
                let first = !std::mem::replace(&mut self.loaded.avg_apy, true);
                let merged = Arc::make_mut(&mut self.api).avg_apy.merge(history);
                flag(first || merged, Slice::AvgApy)
            }
            StoreEvent::UnderlyingTvlLoaded(tvls) => {
                let first = !std::mem::replace(&mut self.loaded.underlying_tvl, true);
                let merged = Arc::make_mut(&mut self.api).underlying_tvl.merge(tvls);
                flag(first || merged, Slice::UnderlyingTvl)
            }
            StoreEvent::WalletBalancesLoaded { address, balances } => {
                let merged = Arc::make_mut(&mut self.wallet)
                    .balances
                    .upsert(address, balances);
                flag(merged, Slice::Wallet)
            }
            StoreEvent::AddressChanged(address) => {
                let wallet = Arc::make_mut(&mut self.wallet);
                let merged = wallet.connected != address;
                wallet.connected = address;
                flag(merged, Slice::Address)
            }
            StoreEvent::FiltersChanged(update) => {
                let slice = if update.is_sort() {
                    Slice::Sort
                } else {
                    Slice::Filters
                };
                let merged = Arc::make_mut(&mut self.filters).apply(update);
                flag(merged, slice)
            }
            StoreEvent::Tick(ts) => {
                let bucket = bucket_start(ts, self.time_bucket_secs);
                let rolled = bucket > self.now;
                if rolled {
                    self.now = bucket;
                }
                flag(rolled, Slice::Clock)
            }
        };

        debug!("Applied {} event: {:?}", name, changed);
        changed
    }
}

fn flag(changed: bool, slice: Slice) -> Vec<Slice> {
    if changed {
        vec![slice]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterUpdate, SortKey};

    #[test]
    fn test_first_empty_delivery_still_counts_as_change() {
        let mut state = DashboardState::default();
        assert_eq!(state.apply(StoreEvent::ApyLoaded(vec![])), vec![Slice::Apy]);
        assert!(state.loaded.apy);
        // A second identical delivery is a no-op
        assert!(state.apply(StoreEvent::ApyLoaded(vec![])).is_empty());
    }

    #[test]
    fn test_tick_only_changes_on_bucket_rollover() {
        let mut state = DashboardState::new(1_000, 60, FilterCriteria::default());
        assert_eq!(state.now, 960);
        assert!(state.apply(StoreEvent::Tick(1_019)).is_empty());
        assert_eq!(state.apply(StoreEvent::Tick(1_020)), vec![Slice::Clock]);
        assert_eq!(state.now, 1_020);
        // Never moves backwards
        assert!(state.apply(StoreEvent::Tick(500)).is_empty());
    }

    #[test]
    fn test_apply_is_copy_on_write() {
        let mut state = DashboardState::default();
        let before = state.clone();
        state.apply(StoreEvent::PricesLoaded(vec![("ETH".to_string(), 3000.0)]));

        assert!(before.prices.is_empty());
        assert_eq!(state.prices.get("ETH"), Some(&3000.0));
        // Untouched slices are still shared
        assert!(Arc::ptr_eq(&before.entities, &state.entities));
    }

    #[test]
    fn test_filter_events_split_into_filter_and_sort_slices() {
        let mut state = DashboardState::default();
        assert_eq!(
            state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetSort(SortKey::Tvl))),
            vec![Slice::Sort]
        );
        assert_eq!(
            state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetSearch("eth".into()))),
            vec![Slice::Filters]
        );
        assert!(state
            .apply(StoreEvent::FiltersChanged(FilterUpdate::SetSearch("eth".into())))
            .is_empty());
    }

    #[test]
    fn test_address_change_detection() {
        let mut state = DashboardState::default();
        let addr = Address::repeat_byte(9);
        assert_eq!(state.apply(StoreEvent::AddressChanged(Some(addr))), vec![Slice::Address]);
        assert!(state.apply(StoreEvent::AddressChanged(Some(addr))).is_empty());
        assert_eq!(state.connected(), Some(addr));
    }
}
