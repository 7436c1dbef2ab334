//! Recompute topics, trigger routing and run preconditions

use serde::Serialize;
use std::fmt;

use crate::derived::DerivedState;
use crate::filter::RecomputeFlags;
use crate::store::{DashboardState, Slice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Topic {
    TotalApy,
    AvgApy,
    Balance,
    Tvl,
    Filters,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::TotalApy,
        Topic::AvgApy,
        Topic::Balance,
        Topic::Tvl,
        Topic::Filters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Topic::TotalApy => "total-apy",
            Topic::AvgApy => "avg-apy",
            Topic::Balance => "balance",
            Topic::Tvl => "tvl",
            Topic::Filters => "filters",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Topic::TotalApy => 0,
            Topic::AvgApy => 1,
            Topic::Balance => 2,
            Topic::Tvl => 3,
            Topic::Filters => 4,
        }
    }

    /// Whether the topic may run against this store and derived snapshot
    pub fn precondition(self, state: &DashboardState, derived: &DerivedState) -> bool {
        let loaded = &state.loaded;
        if !loaded.vaults {
            return false;
        }
        match self {
            Topic::TotalApy => loaded.apy,
            Topic::AvgApy => loaded.avg_apy && derived.apy.is_some(),
            Topic::Balance => match state.connected() {
                None => true,
                Some(address) => state.wallet_balances(&address).is_some(),
            },
            Topic::Tvl => loaded.contract && loaded.prices,
            Topic::Filters => derived.apy.is_some(),
        }
    }

    /// Topics triggered after this one publishes
    pub fn downstream(self) -> &'static [(Topic, RecomputeFlags)] {
        match self {
            Topic::TotalApy => &[
                (Topic::AvgApy, RecomputeFlags::DATA),
                (Topic::Filters, RecomputeFlags::DATA),
            ],
            Topic::Balance | Topic::Tvl => &[(Topic::Filters, RecomputeFlags::DATA)],
            Topic::AvgApy | Topic::Filters => &[],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Topics a changed store slice triggers
pub fn routes(slice: Slice) -> &'static [(Topic, RecomputeFlags)] {
    use RecomputeFlags as F;
    use Topic::*;

    match slice {
        Slice::Vaults => &[
            (TotalApy, F::DATA),
            (AvgApy, F::DATA),
            (Balance, F::DATA),
            (Tvl, F::DATA),
            (Filters, F::DATA),
        ],
        Slice::Chains | Slice::Tokens => &[(TotalApy, F::DATA), (Tvl, F::DATA), (Balance, F::DATA)],
        Slice::Boosts => &[(TotalApy, F::DATA), (Balance, F::DATA)],
        Slice::Campaigns | Slice::Apy => &[(TotalApy, F::DATA)],
        Slice::Prices => &[(TotalApy, F::DATA), (Tvl, F::DATA), (Filters, F::DATA)],
        Slice::Contract => &[(TotalApy, F::DATA), (Balance, F::DATA), (Tvl, F::DATA)],
        Slice::AvgApy => &[(AvgApy, F::DATA)],
        Slice::UnderlyingTvl => &[(Tvl, F::DATA)],
        Slice::Wallet | Slice::Address => &[(Balance, F::DATA), (Filters, F::DATA)],
        Slice::Filters => &[(Filters, F::FILTERS)],
        Slice::Sort => &[(Filters, F::SORT)],
        Slice::Clock => &[(TotalApy, F::DATA), (Balance, F::DATA), (Filters, F::DATA)],
    }
}

/// Observable lifecycle of one topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TopicState {
    Idle,
    /// Triggered, inside the debounce window
    Debouncing,
    /// Debounce elapsed, precondition not met yet
    Waiting,
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::ApyTables;
    use crate::store::StoreEvent;
    use crate::testing::*;
    use std::sync::Arc;

    #[test]
    fn test_every_precondition_needs_vaults() {
        let state = state_with(vec![
            StoreEvent::ApyLoaded(vec![]),
            StoreEvent::PricesLoaded(vec![]),
            StoreEvent::ContractDataLoaded { vaults: vec![], boosts: vec![] },
        ]);
        let derived = DerivedState {
            apy: Some(Arc::new(ApyTables::default())),
            ..Default::default()
        };
        for topic in Topic::ALL {
            assert!(!topic.precondition(&state, &derived), "{}", topic);
        }
    }

    #[test]
    fn test_downstream_topics_wait_for_total_apy() {
        let state = state_with(vec![
            StoreEvent::VaultsLoaded(vec![]),
            StoreEvent::AvgApyLoaded(vec![]),
        ]);
        let empty = DerivedState::default();
        assert!(!Topic::AvgApy.precondition(&state, &empty));
        assert!(!Topic::Filters.precondition(&state, &empty));

        let published = DerivedState {
            apy: Some(Arc::new(ApyTables::default())),
            ..Default::default()
        };
        assert!(Topic::AvgApy.precondition(&state, &published));
        assert!(Topic::Filters.precondition(&state, &published));
    }

    #[test]
    fn test_balance_waits_for_connected_wallet_balances() {
        let mut state = state_with(vec![StoreEvent::VaultsLoaded(vec![])]);
        let derived = DerivedState::default();
        assert!(Topic::Balance.precondition(&state, &derived));

        state.apply(StoreEvent::AddressChanged(Some(addr(0x11))));
        assert!(!Topic::Balance.precondition(&state, &derived));

        state.apply(StoreEvent::WalletBalancesLoaded {
            address: addr(0x11),
            balances: Default::default(),
        });
        assert!(Topic::Balance.precondition(&state, &derived));
    }

    #[test]
    fn test_sort_slice_only_resorts() {
        assert_eq!(routes(Slice::Sort), &[(Topic::Filters, RecomputeFlags::SORT)]);
        assert!(routes(Slice::Vaults).len() == Topic::ALL.len());
    }
}
