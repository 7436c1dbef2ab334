//! Vault ordering
//!
//! Value sorts are stable on the filtered order and put vaults whose value
//! is not loaded yet at the end, in either direction. The default order
//! has no value selector: it ranks by status and promotions instead.

use std::cmp::Ordering;

use super::criteria::{SortDirection, SortKey};
use super::pipeline::FilterContext;
use crate::error::{EngineError, EngineResult};
use crate::promotions::{current_boost, period_finish};
use crate::store::{PromotionStatus, Vault, VaultId};

/// Value a vault sorts by; `Ok(None)` when not loaded yet
pub fn sort_value(ctx: &FilterContext<'_>, key: SortKey, vault: &Vault) -> EngineResult<Option<f64>> {
    let value = match key {
        SortKey::Default => {
            return Err(EngineError::UnsupportedSortValue {
                key: key.name(),
                vault_id: vault.id.clone(),
            })
        }
        SortKey::Apy => ctx.derived.total_apy(&vault.id).ready().map(|t| t.headline()),
        SortKey::Daily => ctx
            .derived
            .total_apy(&vault.id)
            .ready()
            .map(|t| t.headline_daily()),
        SortKey::Tvl => ctx.vault_tvl(&vault.id),
        SortKey::SafetyScore => vault.safety_score,
        SortKey::DepositValue => {
            let deposited = ctx.deposit_amount(&vault.id);
            deposited.zip(ctx.deposit_price(vault)).map(|(amount, price)| amount * price)
        }
        SortKey::WalletValue => ctx
            .wallet_deposit_tokens(vault)
            .zip(ctx.deposit_price(vault))
            .map(|(amount, price)| amount * price),
    };
    Ok(value.filter(|v| v.is_finite()))
}

fn compare_values(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_ids(ids: &[VaultId], ctx: &FilterContext<'_>) -> EngineResult<Vec<VaultId>> {
    let criteria = ctx.criteria();
    let mut keyed = Vec::with_capacity(ids.len());
    for id in ids {
        let vault = ctx.state.entities.vault(id)?;
        keyed.push((id, vault));
    }

    if criteria.sort == SortKey::Default {
        if criteria.is_deposited_view() {
            keyed.sort_by_key(|(_, vault)| position_rank(vault));
        } else {
            keyed.sort_by_key(|(_, vault)| promotion_rank(ctx, vault));
        }
        return Ok(keyed.into_iter().map(|(id, _)| id.clone()).collect());
    }

    let mut valued = Vec::with_capacity(keyed.len());
    for (id, vault) in keyed {
        valued.push((id, sort_value(ctx, criteria.sort, vault)?));
    }
    valued.sort_by(|(_, a), (_, b)| compare_values(*a, *b, criteria.direction));
    Ok(valued.into_iter().map(|(id, _)| id.clone()).collect())
}

/// "My Positions": retired, then paused, then pinned, then the rest
fn position_rank(vault: &Vault) -> u8 {
    if vault.is_retired() {
        0
    } else if vault.is_paused() {
        1
    } else if vault.pinned {
        2
    } else {
        3
    }
}

/// Prestake boosts (soonest start), then active boosts (soonest end), then the rest
fn promotion_rank(ctx: &FilterContext<'_>, vault: &Vault) -> (u8, i64) {
    match current_boost(ctx.state, &vault.id) {
        Some((boost, PromotionStatus::Prestake)) => (0, boost.starts_at.unwrap_or(i64::MAX)),
        Some((boost, PromotionStatus::Active)) => {
            (1, period_finish(ctx.state, boost).unwrap_or(i64::MAX))
        }
        _ => (2, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apy::TotalApy;
    use crate::derived::{ApyTables, DerivedState};
    use crate::filter::{recompute_filtered, FilterUpdate, RecomputeFlags, UserCategory};
    use crate::store::*;
    use crate::testing::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn apy_of(total: f64) -> TotalApy {
        TotalApy {
            total_apy: total,
            total_daily: total / 365.0,
            total_monthly: total / 12.0,
            total_type: crate::apy::TotalType::Apr,
            components: Default::default(),
            boost: None,
            merkl_boost: None,
            boosted_total_apy: None,
            boosted_total_daily: None,
        }
    }

    fn ids(list: &[&str]) -> Vec<VaultId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn three_vaults() -> DashboardState {
        state_with(vec![StoreEvent::VaultsLoaded(vec![
            standard_vault("a", 0xaa, 0xb1),
            standard_vault("b", 0xaa, 0xb2),
            standard_vault("c", 0xaa, 0xb3),
        ])])
    }

    fn derived_with_apy(values: &[(&str, f64)]) -> DerivedState {
        let totals: HashMap<VaultId, TotalApy> =
            values.iter().map(|(id, v)| (id.to_string(), apy_of(*v))).collect();
        DerivedState {
            apy: Some(Arc::new(ApyTables { totals, ..Default::default() })),
            ..Default::default()
        }
    }

    #[test]
    fn test_unloaded_values_sort_last_both_ways() {
        let mut state = three_vaults();
        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetSort(SortKey::Apy)));
        let derived = derived_with_apy(&[("a", 0.1), ("c", 0.3)]);
        let ctx = FilterContext::new(&state, &derived);
        assert_eq!(sort_ids(&ids(&["a", "b", "c"]), &ctx).unwrap(), ids(&["c", "a", "b"]));

        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetSortDirection(SortDirection::Asc)));
        let ctx = FilterContext::new(&state, &derived);
        assert_eq!(sort_ids(&ids(&["a", "b", "c"]), &ctx).unwrap(), ids(&["a", "c", "b"]));
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let mut state = three_vaults();
        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetSort(SortKey::Apy)));
        let derived = derived_with_apy(&[("a", 0.2), ("b", 0.2), ("c", 0.2)]);
        let ctx = FilterContext::new(&state, &derived);
        let once = sort_ids(&ids(&["c", "a", "b"]), &ctx).unwrap();
        assert_eq!(once, ids(&["c", "a", "b"]));
        assert_eq!(sort_ids(&once, &ctx).unwrap(), once);
    }

    #[test]
    fn test_default_key_has_no_value_selector() {
        let state = three_vaults();
        let derived = DerivedState::default();
        let ctx = FilterContext::new(&state, &derived);
        let vault = state.entities.vaults.get("a").unwrap();
        assert_eq!(
            sort_value(&ctx, SortKey::Default, vault),
            Err(EngineError::UnsupportedSortValue { key: "default", vault_id: "a".to_string() })
        );
    }

    #[test]
    fn test_default_sort_puts_boosts_first() {
        let mut prestake = boost("pre", "c", 0xb3);
        prestake.starts_at = Some(NOW + 3_600);
        let mut state = three_vaults();
        state.apply(StoreEvent::BoostsLoaded(vec![boost("act", "b", 0xb2), prestake]));
        state.apply(StoreEvent::ContractDataLoaded {
            vaults: vec![],
            boosts: vec![
                ("act".to_string(), active_boost_data(1.0, 0xcc, 1.0)),
                ("pre".to_string(), active_boost_data(1.0, 0xcc, 1.0)),
            ],
        });
        let derived = DerivedState::default();
        let ctx = FilterContext::new(&state, &derived);
        let result = recompute_filtered(None, &ctx, RecomputeFlags::ALL).unwrap();
        assert_eq!(*result.sorted_ids, ids(&["c", "b", "a"]));
        assert_eq!(*result.filtered_ids, ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_my_positions_default_order() {
        let mut paused = standard_vault("paused", 0xaa, 0xb4);
        paused.status = VaultStatus::Paused;
        let mut retired = standard_vault("retired", 0xaa, 0xb5);
        retired.status = VaultStatus::Eol;
        let mut pinned = standard_vault("pinned", 0xaa, 0xb6);
        pinned.pinned = true;
        let mut state = state_with(vec![StoreEvent::VaultsLoaded(vec![
            standard_vault("plain", 0xaa, 0xb7),
            pinned,
            paused,
            retired,
        ])]);
        state.apply(StoreEvent::FiltersChanged(FilterUpdate::SetUserCategory(
            UserCategory::Deposited,
        )));
        let derived = DerivedState::default();
        let ctx = FilterContext::new(&state, &derived);
        let sorted = sort_ids(&ids(&["plain", "pinned", "paused", "retired"]), &ctx).unwrap();
        assert_eq!(sorted, ids(&["retired", "paused", "pinned", "plain"]));
    }
}
