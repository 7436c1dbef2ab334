//! Boost status derivation
//!
//! Status is never stored: it is read off the latest boost contract
//! snapshot against the bucketed `now`.

use crate::store::{Boost, BoostContractData, DashboardState, PromotionStatus};

/// Status of one boost from its contract data
pub fn status_from_data(boost: &Boost, data: &BoostContractData, now: i64) -> PromotionStatus {
    let scheduled_later = boost.starts_at.map_or(false, |start| start > now);
    // Rewards notified but the reward period has not started yet
    let unstarted = data.rewards.iter().any(|stream| stream.period_finish == 0);
    if scheduled_later || unstarted {
        return PromotionStatus::Prestake;
    }
    if data.rewards.iter().any(|stream| stream.period_finish > now) {
        PromotionStatus::Active
    } else {
        PromotionStatus::Inactive
    }
}

/// `None` while the boost has no contract snapshot
pub fn boost_status(state: &DashboardState, boost: &Boost) -> Option<PromotionStatus> {
    state
        .contract
        .boosts
        .get(boost.id.as_str())
        .map(|data| status_from_data(boost, data, state.now))
}

/// The vault's boost that currently matters: the first active one, else the
/// first prestaking one
pub fn current_boost<'a>(
    state: &'a DashboardState,
    vault_id: &str,
) -> Option<(&'a Boost, PromotionStatus)> {
    let statuses: Vec<(&Boost, PromotionStatus)> = state
        .entities
        .boosts_for_vault(vault_id)
        .filter_map(|boost| boost_status(state, boost).map(|status| (boost, status)))
        .collect();

    statuses
        .iter()
        .find(|(_, status)| *status == PromotionStatus::Active)
        .or_else(|| {
            statuses
                .iter()
                .find(|(_, status)| *status == PromotionStatus::Prestake)
        })
        .copied()
}

pub fn is_boosted(state: &DashboardState, vault_id: &str) -> bool {
    current_boost(state, vault_id).is_some()
}

/// Latest reward period end among the boost's streams
pub fn period_finish(state: &DashboardState, boost: &Boost) -> Option<i64> {
    state
        .contract
        .boosts
        .get(boost.id.as_str())
        .and_then(|data| data.rewards.iter().map(|s| s.period_finish).max())
}
