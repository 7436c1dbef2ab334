use std::collections::HashMap;
use tracing::debug;

use super::boost_apr::{boost_apr, BoostApr};
use super::campaigns::{CampaignClassifier, CampaignSplit};
use super::compose::{compose_total_apy, TotalApy};
use crate::derived::ApyTables;
use crate::error::EngineResult;
use crate::memo::{Memo, MemoStats};
use crate::promotions::{boost_status, current_boost};
use crate::store::{BoostId, DashboardState, PromotionStatus, VaultId};

/// (boost data, prices, vault contract data, tokens, time bucket)
type BoostDeps = (Option<u64>, u64, u64, u64, i64);
/// (vault entity, raw apy, active boost apr, campaign split)
type VaultDeps = (
    Option<u64>,
    Option<u64>,
    Option<u64>,
    Option<(u64, usize, u64, usize)>,
);

/// APY topic worker state. Lives across passes so unchanged vaults and
/// boosts are served from the memo tables.
pub struct ApyEngine {
    classifier: CampaignClassifier,
    boosts: Memo<BoostId, BoostDeps, BoostApr>,
    vaults: Memo<VaultId, VaultDeps, TotalApy>,
}

impl ApyEngine {
    pub fn new(classifier: CampaignClassifier) -> Self {
        Self {
            classifier,
            boosts: Memo::new("boost-apr"),
            vaults: Memo::new("total-apy"),
        }
    }

    pub fn compute(&mut self, state: &DashboardState) -> EngineResult<ApyTables> {
        let boost_aprs = self.active_boost_aprs(state)?;

        let mut totals = HashMap::new();
        for (vault_id, vault) in state.entities.vaults.iter() {
            // Vaults missing from the breakdown stay unavailable
            let Some(raw) = state.api.apy.get(vault_id.as_str()) else {
                continue;
            };

            let boost = current_boost(state, vault_id)
                .filter(|(_, status)| *status == PromotionStatus::Active)
                .and_then(|(boost, _)| boost_aprs.get(&boost.id));
            let campaigns: Option<CampaignSplit> = state.loaded.campaigns.then(|| {
                self.classifier
                    .split(state.entities.campaigns_for_vault(vault_id), state.now)
            });

            let deps = (
                state.entities.vaults.revision_of(vault_id.as_str()),
                state.api.apy.revision_of(vault_id.as_str()),
                boost.map(|b| b.apr.to_bits()),
                campaigns.map(|c| c.fingerprint()),
            );
            let total = self.vaults.get_or_compute(vault_id, deps, || {
                Ok(compose_total_apy(vault, raw, boost, campaigns.as_ref()))
            })?;
            totals.insert(vault_id.clone(), total);
        }
        self.vaults.retain_keys(|id| totals.contains_key(id));

        debug!(
            "Composed {} vault totals, {} active boosts",
            totals.len(),
            boost_aprs.len()
        );

        Ok(ApyTables {
            totals,
            boost_aprs,
            as_of: state.now,
        })
    }

    /// APR of every currently active boost; inactive ones are dropped from
    /// the table and the memo.
    fn active_boost_aprs(
        &mut self,
        state: &DashboardState,
    ) -> EngineResult<HashMap<BoostId, BoostApr>> {
        let mut aprs = HashMap::new();
        for boost in state.entities.boosts.values() {
            if boost_status(state, boost) != Some(PromotionStatus::Active) {
                continue;
            }
            let Some(data) = state.contract.boosts.get(boost.id.as_str()) else {
                continue;
            };
            let deps = (
                state.contract.boosts.revision_of(boost.id.as_str()),
                state.prices.revision(),
                state.contract.vaults.revision(),
                state.entities.tokens.revision(),
                state.now,
            );
            let apr = self
                .boosts
                .get_or_compute(&boost.id, deps, || Ok(boost_apr(state, boost, data)))?;
            aprs.insert(boost.id.clone(), apr);
        }
        self.boosts.retain_keys(|id| aprs.contains_key(id));
        Ok(aprs)
    }

    pub fn memo_stats(&self) -> (MemoStats, MemoStats) {
        (self.vaults.stats(), self.boosts.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apy::{ComponentKind, TotalType};
    use crate::store::*;
    use crate::testing::*;

    fn base_events() -> Vec<StoreEvent> {
        vec![
            StoreEvent::TokensLoaded(vec![token("WETH", 0xaa), token("OP", 0xcc)]),
            StoreEvent::VaultsLoaded(vec![
                standard_vault("v1", 0xaa, 0xbb),
                gov_vault("gov", 0xaa),
                standard_vault("no-apy", 0xaa, 0xbd),
            ]),
            StoreEvent::BoostsLoaded(vec![boost("b1", "v1", 0xbb)]),
            StoreEvent::PricesLoaded(vec![("WETH".to_string(), 2000.0), ("OP".to_string(), 2.0)]),
            StoreEvent::ApyLoaded(vec![
                ("v1".to_string(), raw_apy(&[("tradingApr", 0.05), ("vaultApr", 0.08)])),
                ("gov".to_string(), raw_apy(&[("vaultApr", 0.12)])),
            ]),
        ]
    }

    /// Boost data sized so the boost contributes exactly 20% APR
    fn twenty_percent_boost() -> (String, BoostContractData) {
        // $20k staked; 0.2 × 20_000 / (SECONDS_PER_YEAR × $2) reward rate
        let rate = 0.2 * 20_000.0 / (crate::apy::SECONDS_PER_YEAR * 2.0);
        ("b1".to_string(), active_boost_data(10.0, 0xcc, rate))
    }

    #[test]
    fn test_scenarios_without_and_with_boost() {
        let mut engine = ApyEngine::new(CampaignClassifier::default());
        let mut state = state_with(base_events());

        let tables = engine.compute(&state).unwrap();
        let v1 = &tables.totals["v1"];
        assert!(approx(v1.total_apy, 0.13));
        assert!(v1.boosted_total_apy.is_none());
        assert!(!tables.totals.contains_key("no-apy"));

        let gov = &tables.totals["gov"];
        assert!(gov.component(ComponentKind::RewardPool).is_some());
        assert_eq!(gov.total_type, TotalType::Apr);

        state.apply(StoreEvent::ContractDataLoaded {
            vaults: vec![("v1".to_string(), contract(1.0, 10.0, 10.0))],
            boosts: vec![twenty_percent_boost()],
        });
        let tables = engine.compute(&state).unwrap();
        let v1 = &tables.totals["v1"];
        assert!(approx(v1.total_apy, 0.13));
        assert!((v1.boosted_total_apy.unwrap() - 0.33).abs() < 1e-9);
        assert!(tables.boost_aprs.contains_key("b1"));
    }

    #[test]
    fn test_expired_boost_is_pruned_on_tick() {
        let mut engine = ApyEngine::new(CampaignClassifier::default());
        let mut state = state_with(base_events());
        state.apply(StoreEvent::ContractDataLoaded {
            vaults: vec![("v1".to_string(), contract(1.0, 10.0, 10.0))],
            boosts: vec![twenty_percent_boost()],
        });
        assert!(engine.compute(&state).unwrap().boost_aprs.contains_key("b1"));

        state.apply(StoreEvent::Tick(NOW + 2 * 86_400));
        let tables = engine.compute(&state).unwrap();
        assert!(tables.boost_aprs.is_empty());
        assert!(tables.totals["v1"].boosted_total_apy.is_none());
        assert_eq!(engine.memo_stats().1.entries, 0);
    }

    #[test]
    fn test_unchanged_vaults_come_from_memo() {
        let mut engine = ApyEngine::new(CampaignClassifier::default());
        let mut state = state_with(base_events());
        engine.compute(&state).unwrap();

        state.apply(StoreEvent::ApyLoaded(vec![(
            "v1".to_string(),
            raw_apy(&[("vaultApr", 0.2)]),
        )]));
        let tables = engine.compute(&state).unwrap();
        assert!(approx(tables.totals["v1"].total_apy, 0.2));

        let (vaults, _) = engine.memo_stats();
        // First pass: 2 misses. Second pass: v1 recomputed, gov served from memo
        assert_eq!(vaults.misses, 3);
        assert_eq!(vaults.hits, 1);
    }

    #[test]
    fn test_campaigns_apply_once_loaded() {
        let mut engine = ApyEngine::new(CampaignClassifier::default());
        let mut state = state_with(base_events());
        state.apply(StoreEvent::CampaignsLoaded(vec![Campaign {
            id: "c1".to_string(),
            vault_id: "v1".to_string(),
            provider_id: "merkl".to_string(),
            chain_id: CHAIN.to_string(),
            campaign_type: "erc20".to_string(),
            starts_at: NOW - 60,
            ends_at: NOW + 86_400,
            apr: 0.04,
        }]));
        let tables = engine.compute(&state).unwrap();
        assert!(approx(tables.totals["v1"].total_apy, 0.17));
    }
}
