//! TotalApy composition
//!
//! Turns one vault's raw component map into a `TotalApy`, then overlays,
//! in order: gov-vault relabeling, CLM compounding, the active boost, the
//! CLM-pool reward bonus and finally off-chain campaigns.

use serde::{Deserialize, Serialize};

use super::boost_apr::BoostApr;
use super::campaigns::CampaignSplit;
use super::components::{extract_components, split_daily, ComponentKind, Components};
use crate::store::{RawApy, Vault, VaultKind};

/// Strict 365-day compounding year, on every chain
pub const DAYS_PER_YEAR: f64 = 365.0;
pub const DAYS_PER_MONTH: f64 = 30.0;

pub fn yearly_to_daily(yearly: f64) -> f64 {
    yearly / DAYS_PER_YEAR
}

/// `(1 + daily)^periods - 1`
pub fn compound(daily: f64, periods: f64) -> f64 {
    (1.0 + daily).powf(periods) - 1.0
}

/// Daily rate that compounds to `apy` over a year
pub fn uncompound_daily(apy: f64) -> f64 {
    (1.0 + apy).powf(1.0 / DAYS_PER_YEAR) - 1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentRate {
    pub yearly: f64,
    pub daily: f64,
}

impl ComponentRate {
    pub fn from_yearly(yearly: f64) -> Self {
        Self {
            yearly,
            daily: yearly_to_daily(yearly),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalType {
    Apy,
    Apr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalApy {
    pub total_apy: f64,
    pub total_daily: f64,
    pub total_monthly: f64,
    pub total_type: TotalType,
    pub components: Components,
    /// On-chain boost overlay
    pub boost: Option<ComponentRate>,
    /// Boost-like campaign overlay
    pub merkl_boost: Option<ComponentRate>,
    pub boosted_total_apy: Option<f64>,
    pub boosted_total_daily: Option<f64>,
}

impl TotalApy {
    pub fn component(&self, kind: ComponentKind) -> Option<ComponentRate> {
        self.components.get(&kind).copied()
    }

    /// Boosted figure when there is one, else the base total
    pub fn headline(&self) -> f64 {
        self.boosted_total_apy.unwrap_or(self.total_apy)
    }

    pub fn headline_daily(&self) -> f64 {
        self.boosted_total_daily.unwrap_or(self.total_daily)
    }

    fn add_boosted(&mut self, rate: ComponentRate) {
        self.boosted_total_apy = Some(self.boosted_total_apy.unwrap_or(self.total_apy) + rate.yearly);
        self.boosted_total_daily =
            Some(self.boosted_total_daily.unwrap_or(self.total_daily) + rate.daily);
    }
}

/// Compose the vault's total.
///
/// `boost` is the vault's currently active boost, if any. `campaigns` is
/// `None` until the campaign source has delivered.
pub fn compose_total_apy(
    vault: &Vault,
    raw: &RawApy,
    boost: Option<&BoostApr>,
    campaigns: Option<&CampaignSplit>,
) -> TotalApy {
    let mut components = extract_components(raw);

    // Legacy gov payloads report the pool rewards as vaultApr
    if vault.is_gov_like() && !components.contains_key(&ComponentKind::RewardPool) {
        if let Some(rate) = components.remove(&ComponentKind::Vault) {
            components.insert(ComponentKind::RewardPool, rate);
        }
    }

    let mut total = base_total(raw, components);
    let (compoundable_daily, non_compoundable_daily) = split_daily(&total.components);

    if vault.is_gov_like() {
        total.total_apy = total.total_daily * DAYS_PER_YEAR;
        total.total_monthly = total.total_daily * DAYS_PER_MONTH;
        total.total_type = TotalType::Apr;
    }

    if vault.is_cowcentrated_like() && compoundable_daily > 0.0 {
        total.total_type = TotalType::Apy;
        total.total_apy = compound(compoundable_daily, DAYS_PER_YEAR)
            + non_compoundable_daily * DAYS_PER_YEAR;
    }

    if let Some(boost) = boost {
        let rate = ComponentRate {
            yearly: boost.apr,
            daily: boost.daily,
        };
        total.boost = Some(rate);
        total.add_boosted(rate);
    }

    // Pool rewards on a CLM pool are a bonus: only the boosted figure shows them
    if let VaultKind::CowcentratedPool { .. } = vault.kind {
        if let Some(reward_pool) = total.component(ComponentKind::RewardPool) {
            if reward_pool.yearly > 0.0 {
                total.boosted_total_apy = Some(total.boosted_total_apy.unwrap_or(total.total_apy));
                total.boosted_total_daily =
                    Some(total.boosted_total_daily.unwrap_or(total.total_daily));
                total.total_apy -= reward_pool.yearly;
                total.total_daily -= reward_pool.daily;
                total.total_monthly -= reward_pool.daily * DAYS_PER_MONTH;
            }
        }
    }

    if let Some(split) = campaigns {
        apply_campaigns(&mut total, split);
    }

    total
}

fn base_total(raw: &RawApy, components: Components) -> TotalApy {
    if components.is_empty() {
        let (total_apy, total_type) = match raw.total_apy() {
            Some(apy) if apy.is_finite() => (apy, TotalType::Apy),
            _ => (0.0, TotalType::Apr),
        };
        let total_daily = uncompound_daily(total_apy);
        return TotalApy {
            total_apy,
            total_daily,
            total_monthly: total_daily * DAYS_PER_MONTH,
            total_type,
            components,
            boost: None,
            merkl_boost: None,
            boosted_total_apy: None,
            boosted_total_daily: None,
        };
    }

    let total_daily: f64 = components.values().map(|c| c.daily).sum();
    let (compoundable_daily, non_compoundable_daily) = split_daily(&components);
    let total_monthly = non_compoundable_daily * DAYS_PER_MONTH
        + compound(compoundable_daily, DAYS_PER_MONTH);

    let (total_apy, total_type) = match raw.total_apy() {
        Some(apy) if apy.is_finite() => (apy, TotalType::Apy),
        _ => (components.values().map(|c| c.yearly).sum(), TotalType::Apr),
    };

    TotalApy {
        total_apy,
        total_daily,
        total_monthly,
        total_type,
        components,
        boost: None,
        merkl_boost: None,
        boosted_total_apy: None,
        boosted_total_daily: None,
    }
}

/// Regular campaigns replace the raw merkl component; boost-like campaigns
/// stack on the boosted figure.
fn apply_campaigns(total: &mut TotalApy, split: &CampaignSplit) {
    if split.regular_count > 0 {
        let previous = total.component(ComponentKind::Merkl).unwrap_or_default();
        let replacement = ComponentRate::from_yearly(split.regular_apr);
        let delta_yearly = replacement.yearly - previous.yearly;
        let delta_daily = replacement.daily - previous.daily;

        total.components.insert(ComponentKind::Merkl, replacement);
        total.total_apy += delta_yearly;
        total.total_daily += delta_daily;
        total.total_monthly += delta_daily * DAYS_PER_MONTH;
        if let Some(boosted) = total.boosted_total_apy.as_mut() {
            *boosted += delta_yearly;
        }
        if let Some(boosted) = total.boosted_total_daily.as_mut() {
            *boosted += delta_daily;
        }
    }

    if split.boost_like_count > 0 && split.boost_like_apr > 0.0 {
        let rate = ComponentRate::from_yearly(split.boost_like_apr);
        total.merkl_boost = Some(rate);
        total.add_boosted(rate);
    }
}
