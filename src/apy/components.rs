//! Recognized APY components
//!
//! The breakdown API sends a flat map of `<name>Apr` / `<name>Daily`
//! values. Only the names listed here take part in composition; anything
//! else in the payload (fees, lp stats, ...) is ignored.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::compose::{ComponentRate, DAYS_PER_YEAR};
use crate::store::RawApy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Vault,
    Clm,
    Trading,
    ComposablePool,
    LiquidStaking,
    RewardPool,
    RewardPoolTrading,
    Merkl,
    StellaSwap,
    Bonus,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 10] = [
        ComponentKind::Vault,
        ComponentKind::Clm,
        ComponentKind::Trading,
        ComponentKind::ComposablePool,
        ComponentKind::LiquidStaking,
        ComponentKind::RewardPool,
        ComponentKind::RewardPoolTrading,
        ComponentKind::Merkl,
        ComponentKind::StellaSwap,
        ComponentKind::Bonus,
    ];

    /// Payload prefix, e.g. `vault` for `vaultApr` / `vaultDaily`
    pub fn prefix(&self) -> &'static str {
        match self {
            ComponentKind::Vault => "vault",
            ComponentKind::Clm => "clm",
            ComponentKind::Trading => "trading",
            ComponentKind::ComposablePool => "composablePool",
            ComponentKind::LiquidStaking => "liquidStaking",
            ComponentKind::RewardPool => "rewardPool",
            ComponentKind::RewardPoolTrading => "rewardPoolTrading",
            ComponentKind::Merkl => "merkl",
            ComponentKind::StellaSwap => "stellaSwap",
            ComponentKind::Bonus => "bonus",
        }
    }

    /// Reinvested by the vault strategy, so it compounds
    pub fn is_compoundable(&self) -> bool {
        matches!(
            self,
            ComponentKind::Vault
                | ComponentKind::Clm
                | ComponentKind::Trading
                | ComponentKind::ComposablePool
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Yearly,
    Daily,
}

lazy_static! {
    /// `vaultApr` → (Vault, Yearly), `vaultDaily` → (Vault, Daily), ...
    static ref COMPONENT_KEYS: HashMap<String, (ComponentKind, Period)> = {
        let mut keys = HashMap::new();
        for kind in ComponentKind::ALL {
            keys.insert(format!("{}Apr", kind.prefix()), (kind, Period::Yearly));
            keys.insert(format!("{}Daily", kind.prefix()), (kind, Period::Daily));
        }
        keys
    };
}

pub type Components = BTreeMap<ComponentKind, ComponentRate>;

/// Pull the recognized components out of a raw payload.
///
/// A yearly value implies `daily = yearly / 365` unless the daily value is
/// supplied; a daily-only component gets `yearly = daily * 365`.
pub fn extract_components(raw: &RawApy) -> Components {
    let mut yearly: BTreeMap<ComponentKind, f64> = BTreeMap::new();
    let mut daily: BTreeMap<ComponentKind, f64> = BTreeMap::new();

    for (key, value) in &raw.values {
        if !value.is_finite() {
            continue;
        }
        match COMPONENT_KEYS.get(key.as_str()) {
            Some((kind, Period::Yearly)) => {
                yearly.insert(*kind, *value);
            }
            Some((kind, Period::Daily)) => {
                daily.insert(*kind, *value);
            }
            None => {}
        }
    }

    let mut components = Components::new();
    for kind in ComponentKind::ALL {
        let rate = match (yearly.get(&kind), daily.get(&kind)) {
            (Some(&y), Some(&d)) => ComponentRate { yearly: y, daily: d },
            (Some(&y), None) => ComponentRate::from_yearly(y),
            (None, Some(&d)) => ComponentRate {
                yearly: d * DAYS_PER_YEAR,
                daily: d,
            },
            (None, None) => continue,
        };
        components.insert(kind, rate);
    }
    components
}

/// (compoundable daily, non-compoundable daily)
pub fn split_daily(components: &Components) -> (f64, f64) {
    components
        .iter()
        .fold((0.0, 0.0), |(comp, non_comp), (kind, rate)| {
            if kind.is_compoundable() {
                (comp + rate.daily, non_comp)
            } else {
                (comp, non_comp + rate.daily)
            }
        })
}
