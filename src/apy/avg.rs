//! Average APY over trailing periods
//!
//! Combines the API's average-APY history with the vault's age: a period
//! longer than the vault has existed is reported but flagged partial.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::derived::ApyTables;
use crate::store::{AvgApyHistory, DashboardState, Vault, VaultId};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvgApyPeriod {
    pub days: u32,
    pub value: f64,
    /// The vault is at least `days` old
    pub full: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvgApy {
    pub periods: Vec<AvgApyPeriod>,
    /// Current headline APY, for comparison
    pub current: f64,
}

impl AvgApy {
    pub fn period(&self, days: u32) -> Option<&AvgApyPeriod> {
        self.periods.iter().find(|p| p.days == days)
    }
}

pub fn vault_age_days(vault: &Vault, now: i64) -> i64 {
    (now - vault.created_at).max(0) / SECONDS_PER_DAY
}

pub fn avg_apy(vault: &Vault, history: &AvgApyHistory, current: f64, now: i64) -> AvgApy {
    let age = vault_age_days(vault, now);
    let mut periods: Vec<AvgApyPeriod> = history
        .periods
        .iter()
        .filter(|point| point.value.is_finite())
        .map(|point| AvgApyPeriod {
            days: point.days,
            value: point.value,
            full: age >= i64::from(point.days),
        })
        .collect();
    periods.sort_by_key(|p| p.days);
    AvgApy { periods, current }
}

/// One entry per vault with both a history and a published total
pub fn avg_apy_table(state: &DashboardState, apy: &ApyTables) -> HashMap<VaultId, AvgApy> {
    state
        .entities
        .vaults
        .iter()
        .filter_map(|(vault_id, vault)| {
            let history = state.api.avg_apy.get(vault_id.as_str())?;
            let total = apy.totals.get(vault_id)?;
            Some((
                vault_id.clone(),
                avg_apy(vault, history, total.headline(), state.now),
            ))
        })
        .collect()
}
