//! Vault predicates, cheapest first
//!
//! Only the predicates the criteria actually enable are built. They are
//! ordered by cost so the expensive ones (prices, balances) only see vaults
//! that already passed the static checks.

use super::criteria::{AssetTypeFilter, FilterCriteria, UserCategory};
use super::pipeline::FilterContext;
use crate::promotions::is_boosted;
use crate::store::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cost {
    /// Entity fields only
    Static,
    /// Promotions and `now`
    Local,
    /// Prices, TVL or wallet balances
    Expensive,
}

pub struct Predicate<'a> {
    pub name: &'static str,
    pub cost: Cost,
    test: Box<dyn Fn(&Vault) -> bool + 'a>,
}

impl<'a> Predicate<'a> {
    fn new(name: &'static str, cost: Cost, test: impl Fn(&Vault) -> bool + 'a) -> Self {
        Self {
            name,
            cost,
            test: Box::new(test),
        }
    }

    pub fn test(&self, vault: &Vault) -> bool {
        (self.test)(vault)
    }
}

/// Lowercased, with `-`, `/` and spaces removed
pub fn normalize_search(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '-' | '/' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn matches_search(vault: &Vault, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    normalize_search(&vault.name).contains(needle)
        || normalize_search(&vault.id).contains(needle)
        || vault
            .assets
            .iter()
            .any(|asset| normalize_search(asset).contains(needle))
}

/// Retired vaults only show when asked for, or in "My Positions"
fn status_visible(criteria: &FilterCriteria, vault: &Vault) -> bool {
    if criteria.only_retired {
        return vault.is_retired();
    }
    if criteria.only_paused {
        return vault.is_paused();
    }
    !vault.is_retired() || criteria.is_deposited_view()
}

pub fn build_predicates<'a>(ctx: &'a FilterContext<'a>) -> Vec<Predicate<'a>> {
    let criteria = ctx.criteria();
    let mut predicates = vec![Predicate::new("status", Cost::Static, move |v| {
        status_visible(criteria, v)
    })];

    if !criteria.chains.is_empty() {
        predicates.push(Predicate::new("chain", Cost::Static, move |v| {
            criteria.chains.contains(&v.chain_id)
        }));
    }
    if !criteria.platforms.is_empty() {
        predicates.push(Predicate::new("platform", Cost::Static, move |v| {
            criteria.platforms.contains(&v.platform_id)
        }));
    }
    if !criteria.categories.is_empty() {
        predicates.push(Predicate::new("category", Cost::Static, move |v| {
            criteria.categories.iter().all(|c| v.categories.contains(c))
        }));
    }
    if criteria.asset_type != AssetTypeFilter::All {
        predicates.push(Predicate::new("asset-type", Cost::Static, move |v| {
            criteria.asset_type.accepts(v.asset_type)
        }));
    }
    let needle = normalize_search(&criteria.search);
    if !needle.is_empty() {
        predicates.push(Predicate::new("search", Cost::Static, move |v| {
            matches_search(v, &needle)
        }));
    }

    if criteria.only_boosted {
        predicates.push(Predicate::new("boosted", Cost::Local, move |v| {
            is_boosted(ctx.state, &v.id)
        }));
    }

    if criteria.min_tvl > 0.0 {
        let min = criteria.min_tvl;
        predicates.push(Predicate::new("min-tvl", Cost::Expensive, move |v| {
            ctx.vault_tvl(&v.id).unwrap_or(0.0) >= min
        }));
    }
    match criteria.user_category {
        UserCategory::All => {}
        UserCategory::Deposited => {
            predicates.push(Predicate::new("deposited", Cost::Expensive, move |v| {
                ctx.deposited(&v.id)
            }));
        }
        UserCategory::Eligible => {
            predicates.push(Predicate::new("eligible", Cost::Expensive, move |v| {
                ctx.holds_deposit_token(v)
            }));
        }
    }

    // Stable, so same-cost predicates keep the order above
    predicates.sort_by_key(|p| p.cost);
    predicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::DerivedState;
    use crate::filter::FilterUpdate;
    use crate::store::*;
    use crate::testing::*;

    #[test]
    fn test_search_ignores_case_and_separators() {
        let mut v = standard_vault("aero-weth-usdc", 0xaa, 0xbb);
        v.name = "WETH-USDC LP".to_string();
        v.assets = vec!["WETH".to_string(), "USDC".to_string()];
        assert!(matches_search(&v, &normalize_search("weth/usdc")));
        assert!(matches_search(&v, &normalize_search("Aero WETH")));
        assert!(!matches_search(&v, &normalize_search("dai")));
    }

    #[test]
    fn test_predicates_sorted_by_cost() {
        let mut state = state_with(vec![]);
        for update in [
            FilterUpdate::SetMinTvl(10.0),
            FilterUpdate::SetOnlyBoosted(true),
            FilterUpdate::SetSearch("eth".to_string()),
            FilterUpdate::SetUserCategory(UserCategory::Deposited),
        ] {
            state.apply(StoreEvent::FiltersChanged(update));
        }
        let derived = DerivedState::default();
        let ctx = FilterContext::new(&state, &derived);
        let names: Vec<_> = build_predicates(&ctx).iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["status", "search", "boosted", "min-tvl", "deposited"]);
    }

    #[test]
    fn test_retired_visibility() {
        let mut criteria = FilterCriteria::default();
        let mut v = standard_vault("v1", 0xaa, 0xbb);
        v.status = VaultStatus::Eol;
        assert!(!status_visible(&criteria, &v));

        criteria.user_category = UserCategory::Deposited;
        assert!(status_visible(&criteria, &v));

        criteria.user_category = UserCategory::All;
        criteria.only_retired = true;
        assert!(status_visible(&criteria, &v));
        v.status = VaultStatus::Active;
        assert!(!status_visible(&criteria, &v));
    }
}
