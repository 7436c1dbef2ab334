//! Filter + sort recompute
//!
//! One entry point with three flags. Filtering reruns only when data or
//! filters changed; a sort-only change re-sorts the previous filtered list.
//! With no flags the previous result is returned as is.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::criteria::{FilterCriteria, RecomputeFlags};
use super::predicates::build_predicates;
use super::sort::sort_ids;
use crate::derived::DerivedState;
use crate::error::EngineResult;
use crate::pricing::deposit_token_price;
use crate::store::{DashboardState, Vault, VaultId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredVaults {
    /// Passing vaults in store order
    pub filtered_ids: Arc<Vec<VaultId>>,
    pub sorted_ids: Arc<Vec<VaultId>>,
    /// Vaults considered, before filtering
    pub total_count: usize,
}

/// Everything a filter pass reads
pub struct FilterContext<'a> {
    pub state: &'a DashboardState,
    pub derived: &'a DerivedState,
}

impl<'a> FilterContext<'a> {
    pub fn new(state: &'a DashboardState, derived: &'a DerivedState) -> Self {
        Self { state, derived }
    }

    pub fn criteria(&self) -> &'a FilterCriteria {
        &self.state.filters
    }

    /// Connected wallet's total deposit in the vault, in deposit-token units
    pub fn deposit_amount(&self, vault_id: &str) -> Option<f64> {
        self.derived
            .balance(self.state.connected(), vault_id)
            .ready()
            .map(|balance| balance.total)
    }

    pub fn vault_tvl(&self, vault_id: &str) -> Option<f64> {
        self.derived.tvl(vault_id).ready().map(|tvl| tvl.vault_tvl())
    }

    /// Connected wallet has a non-zero deposit in the vault
    pub fn deposited(&self, vault_id: &str) -> bool {
        self.derived
            .balance(self.state.connected(), vault_id)
            .ready()
            .map_or(false, |balance| balance.has_deposit())
    }

    /// Connected wallet holds the vault's deposit token
    pub fn holds_deposit_token(&self, vault: &Vault) -> bool {
        self.wallet_deposit_tokens(vault).map_or(false, |held| held > 0.0)
    }

    pub fn wallet_deposit_tokens(&self, vault: &Vault) -> Option<f64> {
        let address = self.state.connected()?;
        let wallet = self.state.wallet_balances(&address)?;
        Some(wallet.token(&vault.chain_id, vault.deposit_token))
    }

    pub fn deposit_price(&self, vault: &Vault) -> Option<f64> {
        deposit_token_price(self.state, vault)
    }
}

fn filter_vaults(ctx: &FilterContext<'_>) -> Vec<VaultId> {
    let predicates = build_predicates(ctx);
    ctx.state
        .entities
        .vaults
        .iter()
        .filter(|(_, vault)| predicates.iter().all(|p| p.test(vault)))
        .map(|(id, _)| id.clone())
        .collect()
}

pub fn recompute_filtered(
    prev: Option<&Arc<FilteredVaults>>,
    ctx: &FilterContext<'_>,
    flags: RecomputeFlags,
) -> EngineResult<Arc<FilteredVaults>> {
    let prev = match prev {
        Some(prev) if flags.is_empty() => return Ok(Arc::clone(prev)),
        other => other,
    };

    let filtered_ids = match prev {
        Some(prev) if !flags.needs_filtering() => Arc::clone(&prev.filtered_ids),
        _ => Arc::new(filter_vaults(ctx)),
    };
    let sorted_ids = Arc::new(sort_ids(&filtered_ids, ctx)?);
    let total_count = ctx.state.entities.vaults.len();

    debug!(
        "Filtered {} of {} vaults ({:?})",
        filtered_ids.len(),
        total_count,
        flags
    );
    Ok(Arc::new(FilteredVaults {
        filtered_ids,
        sorted_ids,
        total_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterUpdate, SortKey};
    use crate::store::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn listing_state() -> DashboardState {
        let mut retired = standard_vault("old", 0xaa, 0xb3);
        retired.status = VaultStatus::Eol;
        let mut op = standard_vault("op-usdc", 0xaa, 0xb2);
        op.chain_id = "optimism".to_string();
        state_with(vec![StoreEvent::VaultsLoaded(vec![
            standard_vault("base-eth", 0xaa, 0xb1),
            op,
            retired,
        ])])
    }

    #[test]
    fn test_no_flags_returns_previous_arrays() {
        let state = listing_state();
        let derived = DerivedState::default();
        let ctx = FilterContext::new(&state, &derived);

        let first = recompute_filtered(None, &ctx, RecomputeFlags::NONE).unwrap();
        let again = recompute_filtered(Some(&first), &ctx, RecomputeFlags::NONE).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.total_count, 3);
        assert_eq!(*first.filtered_ids, vec!["base-eth".to_string(), "op-usdc".to_string()]);
    }

    #[test]
    fn test_sort_change_reuses_filtered_list() {
        let mut state = listing_state();
        let derived = DerivedState::default();
        let first = {
            let ctx = FilterContext::new(&state, &derived);
            recompute_filtered(None, &ctx, RecomputeFlags::ALL).unwrap()
        };

        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetSort(SortKey::SafetyScore)));
        let ctx = FilterContext::new(&state, &derived);
        let sorted = recompute_filtered(Some(&first), &ctx, RecomputeFlags::SORT).unwrap();
        assert!(Arc::ptr_eq(&first.filtered_ids, &sorted.filtered_ids));
    }

    #[test]
    fn test_chain_filter_and_min_tvl() {
        let mut state = listing_state();
        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetChains(vec!["base".to_string()])));
        let derived = DerivedState::default();
        let ctx = FilterContext::new(&state, &derived);
        let result = recompute_filtered(None, &ctx, RecomputeFlags::FILTERS).unwrap();
        assert_eq!(*result.filtered_ids, vec!["base-eth".to_string()]);

        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetMinTvl(100.0)));
        let mut tvl = HashMap::new();
        tvl.insert("base-eth".to_string(), crate::tvl::TvlBreakdown::Simple { vault_tvl: 50.0 });
        let derived = DerivedState { tvl: Some(Arc::new(tvl)), ..Default::default() };
        let ctx = FilterContext::new(&state, &derived);
        let result = recompute_filtered(Some(&result), &ctx, RecomputeFlags::FILTERS).unwrap();
        assert!(result.filtered_ids.is_empty());
    }
}
