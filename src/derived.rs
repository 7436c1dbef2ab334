//! Derived records published by the recompute topics
//!
//! Every table here is replaced wholesale by a recompute pass and read
//! through `Arc` clones, so readers never observe a partial update.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;

use crate::apy::{AvgApy, BoostApr, TotalApy};
use crate::balance::VaultBalance;
use crate::error::EngineError;
use crate::filter::FilteredVaults;
use crate::store::{BoostId, VaultId};
use crate::tvl::TvlBreakdown;

/// Read-side discriminant: "loading" vs "unavailable" vs a value (zero included)
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    /// The source feeding this value has not delivered yet
    Loading,
    /// The source delivered, but holds nothing for this entity
    Unavailable,
    Ready(T),
}

impl<T> Availability<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Availability::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Availability::Loading)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Availability::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Availability<&T> {
        match self {
            Availability::Loading => Availability::Loading,
            Availability::Unavailable => Availability::Unavailable,
            Availability::Ready(value) => Availability::Ready(value),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Availability<U> {
        match self {
            Availability::Loading => Availability::Loading,
            Availability::Unavailable => Availability::Unavailable,
            Availability::Ready(value) => Availability::Ready(f(value)),
        }
    }

    /// `Ready` when loaded, `Unavailable` when the lookup came back empty
    pub fn from_lookup(loaded: bool, value: Option<T>) -> Self {
        match (loaded, value) {
            (false, _) => Availability::Loading,
            (true, None) => Availability::Unavailable,
            (true, Some(value)) => Availability::Ready(value),
        }
    }
}

/// APY topic output
#[derive(Debug, Clone, Default)]
pub struct ApyTables {
    pub totals: HashMap<VaultId, TotalApy>,
    /// Only currently active boosts
    pub boost_aprs: HashMap<BoostId, BoostApr>,
    /// Time bucket the tables were derived at
    pub as_of: i64,
}

/// Balance topic output, for one wallet
#[derive(Debug, Clone, Default)]
pub struct BalanceTable {
    pub address: Option<Address>,
    pub by_vault: HashMap<VaultId, VaultBalance>,
}

/// Everything the topics have published so far
#[derive(Debug, Clone, Default)]
pub struct DerivedState {
    pub apy: Option<Arc<ApyTables>>,
    pub avg_apy: Option<Arc<HashMap<VaultId, AvgApy>>>,
    pub balances: Option<Arc<BalanceTable>>,
    pub tvl: Option<Arc<HashMap<VaultId, TvlBreakdown>>>,
    pub filtered: Option<Arc<FilteredVaults>>,
    /// Last failure per topic name; cleared by the topic's next good run
    pub errors: HashMap<&'static str, EngineError>,
}

impl DerivedState {
    pub fn total_apy(&self, vault_id: &str) -> Availability<&TotalApy> {
        match &self.apy {
            None => Availability::Loading,
            Some(tables) => Availability::from_lookup(true, tables.totals.get(vault_id)),
        }
    }

    pub fn boost_apr(&self, boost_id: &str) -> Option<&BoostApr> {
        self.apy.as_ref().and_then(|t| t.boost_aprs.get(boost_id))
    }

    pub fn avg_apy(&self, vault_id: &str) -> Availability<&AvgApy> {
        match &self.avg_apy {
            None => Availability::Loading,
            Some(table) => Availability::from_lookup(true, table.get(vault_id)),
        }
    }

    /// Balance of `connected`. Loading until the published table belongs
    /// to that wallet, so a stale table never leaks into a new wallet's view.
    pub fn balance(
        &self,
        connected: Option<Address>,
        vault_id: &str,
    ) -> Availability<&VaultBalance> {
        let Some(connected) = connected else {
            return Availability::Unavailable;
        };
        match &self.balances {
            Some(table) if table.address == Some(connected) => {
                Availability::from_lookup(true, table.by_vault.get(vault_id))
            }
            _ => Availability::Loading,
        }
    }

    pub fn tvl(&self, vault_id: &str) -> Availability<&TvlBreakdown> {
        match &self.tvl {
            None => Availability::Loading,
            Some(table) => Availability::from_lookup(true, table.get(vault_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceBreakdown;
    use crate::store::TokenKey;

    #[test]
    fn test_availability_distinguishes_loading_unavailable_and_zero() {
        assert_eq!(Availability::<f64>::from_lookup(false, Some(1.0)), Availability::Loading);
        assert_eq!(Availability::<f64>::from_lookup(true, None), Availability::Unavailable);
        assert_eq!(Availability::from_lookup(true, Some(0.0)), Availability::Ready(0.0));
    }

    #[test]
    fn test_unpublished_tables_read_as_loading() {
        let derived = DerivedState::default();
        assert!(derived.total_apy("any").is_loading());
        assert!(derived.tvl("any").is_loading());
        assert!(derived.balance(Some(Address::repeat_byte(0x11)), "any").is_loading());
    }

    #[test]
    fn test_balance_without_wallet_is_unavailable() {
        let derived = DerivedState {
            balances: Some(Arc::new(BalanceTable::default())),
            ..Default::default()
        };
        assert_eq!(derived.balance(None, "any"), Availability::Unavailable);
    }

    #[test]
    fn test_balance_of_previous_wallet_reads_as_loading() {
        let old = Address::repeat_byte(0x11);
        let mut by_vault = HashMap::new();
        let balance = VaultBalance {
            breakdown: BalanceBreakdown {
                deposit_token: TokenKey::new("base", Address::repeat_byte(0xaa)),
                entries: vec![],
            },
            total: 1.0,
            not_earning: 0.0,
        };
        by_vault.insert("v1".to_string(), balance);
        let derived = DerivedState {
            balances: Some(Arc::new(BalanceTable {
                address: Some(old),
                by_vault,
            })),
            ..Default::default()
        };
        assert!(derived.balance(Some(old), "v1").is_ready());
        assert_eq!(derived.balance(Some(old), "v2"), Availability::Unavailable);
        assert!(derived.balance(Some(Address::repeat_byte(0x22)), "v1").is_loading());
    }
}
