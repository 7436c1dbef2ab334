//! TVL / Share Engine
//!
//! Vault TVL is the locked deposit amount times the deposit token price.
//! CLM-backed vaults also report their share of the DEX pool the position
//! lives in.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::pricing::deposit_token_price;
use crate::store::{DashboardState, PlatformId, Vault, VaultId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTvl {
    /// TVL of the CLM the wrapper deposits into
    pub total_tvl: f64,
    pub total_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TvlBreakdown {
    #[serde(rename_all = "camelCase")]
    Simple { vault_tvl: f64 },
    #[serde(rename_all = "camelCase")]
    Wrapped {
        vault_tvl: f64,
        vault_share: f64,
        underlying_tvl: f64,
        underlying_platform_id: PlatformId,
        /// Set for pool/vault wrappers of a CLM
        total: Option<AggregateTvl>,
    },
}

impl TvlBreakdown {
    pub fn vault_tvl(&self) -> f64 {
        match self {
            TvlBreakdown::Simple { vault_tvl } | TvlBreakdown::Wrapped { vault_tvl, .. } => {
                *vault_tvl
            }
        }
    }
}

/// Zero denominator → 0
fn share_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 && part.is_finite() {
        part / whole
    } else {
        0.0
    }
}

/// Locked value in USD; `None` while contract data or the price is missing
pub fn vault_tvl(state: &DashboardState, vault: &Vault) -> Option<f64> {
    let data = state.contract.vaults.get(vault.id.as_str())?;
    let price = deposit_token_price(state, vault)?;
    // Reward pools hold deposit tokens 1:1 with their supply
    let locked = if vault.is_gov_like() {
        data.total_supply
    } else {
        data.balance
    };
    Some(locked * price)
}

pub fn tvl_breakdown(state: &DashboardState, vault: &Vault) -> Option<TvlBreakdown> {
    let vault_tvl = vault_tvl(state, vault)?;

    let Some(clm_id) = vault.underlying_clm_id() else {
        return Some(TvlBreakdown::Simple { vault_tvl });
    };
    let Some(underlying) = state
        .api
        .underlying_tvl
        .get(clm_id)
        .filter(|u| u.tvl_usd > 0.0)
    else {
        return Some(TvlBreakdown::Simple { vault_tvl });
    };

    let total = if clm_id != vault.id {
        state
            .entities
            .vaults
            .get(clm_id)
            .and_then(|clm| self::vault_tvl(state, clm))
            .map(|clm_tvl| AggregateTvl {
                total_tvl: clm_tvl,
                total_share: share_of(clm_tvl, underlying.tvl_usd),
            })
    } else {
        None
    };

    Some(TvlBreakdown::Wrapped {
        vault_tvl,
        vault_share: share_of(vault_tvl, underlying.tvl_usd),
        underlying_tvl: underlying.tvl_usd,
        underlying_platform_id: underlying.platform_id.clone(),
        total,
    })
}

pub fn tvl_table(state: &DashboardState) -> HashMap<VaultId, TvlBreakdown> {
    let table: HashMap<VaultId, TvlBreakdown> = state
        .entities
        .vaults
        .iter()
        .filter_map(|(id, vault)| tvl_breakdown(state, vault).map(|tvl| (id.clone(), tvl)))
        .collect();
    debug!("TVL computed for {} vaults", table.len());
    table
}

/// Sum of vault TVLs, counting each CLM position once
pub fn total_tvl(state: &DashboardState, table: &HashMap<VaultId, TvlBreakdown>) -> f64 {
    table
        .iter()
        .filter(|(id, _)| {
            // Wrapper deposits are already inside their CLM's TVL
            state
                .entities
                .vaults
                .get(id.as_str())
                .and_then(|v| v.underlying_clm_id())
                .map_or(true, |clm_id| clm_id == id.as_str())
        })
        .map(|(_, tvl)| tvl.vault_tvl())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::*;
    use crate::testing::*;

    fn clm_state(underlying: f64) -> DashboardState {
        state_with(vec![
            StoreEvent::TokensLoaded(vec![token("LP", 0xaa), token("WETH", 0xa1)]),
            StoreEvent::VaultsLoaded(vec![
                vault("clm", 0xaa, VaultKind::Cowcentrated { receipt_token: addr(0xbb) }),
                vault(
                    "clm-vault",
                    0xbb,
                    VaultKind::CowcentratedVault {
                        receipt_token: addr(0xbc),
                        clm_id: "clm".to_string(),
                    },
                ),
                gov_vault("gov", 0xa1),
            ]),
            StoreEvent::PricesLoaded(vec![("LP".to_string(), 10.0), ("WETH".to_string(), 2.0)]),
            StoreEvent::ContractDataLoaded {
                vaults: vec![
                    ("clm".to_string(), contract(1.0, 100.0, 100.0)),
                    ("clm-vault".to_string(), contract(1.0, 40.0, 40.0)),
                    ("gov".to_string(), contract(1.0, 0.0, 50.0)),
                ],
                boosts: vec![],
            },
            StoreEvent::UnderlyingTvlLoaded(vec![(
                "clm".to_string(),
                UnderlyingTvl { tvl_usd: underlying, platform_id: "uniswap".to_string() },
            )]),
        ])
    }

    #[test]
    fn test_wrapper_share_of_underlying_pool() {
        let state = clm_state(10_000.0);
        let wrapper = state.entities.vaults.get("clm-vault").unwrap();

        // Wrapper deposit token is the CLM share: 10 × ppfs 1.0
        match tvl_breakdown(&state, wrapper).unwrap() {
            TvlBreakdown::Wrapped { vault_tvl, vault_share, total, .. } => {
                assert!(approx(vault_tvl, 400.0));
                assert!(approx(vault_share, 0.04));
                let total = total.unwrap();
                assert!(approx(total.total_tvl, 1_000.0));
                assert!(approx(total.total_share, 0.1));
            }
            other => panic!("expected wrapped tvl, got {:?}", other),
        }

        let clm = state.entities.vaults.get("clm").unwrap();
        match tvl_breakdown(&state, clm).unwrap() {
            TvlBreakdown::Wrapped { total, .. } => assert!(total.is_none()),
            other => panic!("expected wrapped tvl, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_underlying_falls_back_to_simple() {
        let state = clm_state(0.0);
        let clm = state.entities.vaults.get("clm").unwrap();
        assert_eq!(
            tvl_breakdown(&state, clm),
            Some(TvlBreakdown::Simple { vault_tvl: 1_000.0 })
        );
    }

    #[test]
    fn test_gov_tvl_uses_total_supply() {
        let state = clm_state(1.0);
        let gov = state.entities.vaults.get("gov").unwrap();
        assert_eq!(vault_tvl(&state, gov), Some(100.0));
    }

    #[test]
    fn test_missing_contract_data_is_none() {
        let state = state_with(vec![StoreEvent::VaultsLoaded(vec![standard_vault("v1", 0xaa, 0xbb)])]);
        let v = state.entities.vaults.get("v1").unwrap();
        assert!(tvl_breakdown(&state, v).is_none());
    }

    #[test]
    fn test_total_counts_clm_once() {
        let state = clm_state(10_000.0);
        let table = tvl_table(&state);
        assert_eq!(table.len(), 3);
        assert!(approx(total_tvl(&state, &table), 1_100.0));
    }
}
