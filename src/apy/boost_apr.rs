//! Boost APR from reward streams
//!
//! apr_i = rate × seconds/year × reward price ÷ (staked × staked price)
//!
//! The staked token is the vault's receipt token, so its price goes through
//! the share price. Rewards paid in another vault's receipt are priced the
//! same way.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::compose::yearly_to_daily;
use crate::pricing::token_price;
use crate::store::{Boost, BoostContractData, BoostId, DashboardState, TokenKey};

pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTokenApr {
    pub token: Address,
    pub apr: f64,
    pub yearly_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostApr {
    pub boost_id: BoostId,
    pub apr: f64,
    pub daily: f64,
    pub by_reward_token: Vec<RewardTokenApr>,
}

/// APR of every emitting stream. Unpriced or degenerate ratios count as 0
/// but the stream stays listed.
pub fn boost_apr(state: &DashboardState, boost: &Boost, data: &BoostContractData) -> BoostApr {
    let staked_price = token_price(state, &TokenKey::new(boost.chain_id.clone(), boost.staked_token))
        .unwrap_or(f64::NAN);
    let staked_usd = data.total_supply * staked_price;

    let by_reward_token: Vec<RewardTokenApr> = data
        .rewards
        .iter()
        .filter(|stream| stream.is_emitting(state.now))
        .map(|stream| {
            let reward_price = token_price(state, &TokenKey::new(boost.chain_id.clone(), stream.token))
                .unwrap_or(f64::NAN);
            let yearly_usd = finite_or_zero(stream.rate * SECONDS_PER_YEAR * reward_price);
            RewardTokenApr {
                token: stream.token,
                apr: finite_or_zero(yearly_usd / staked_usd),
                yearly_usd,
            }
        })
        .collect();

    let apr: f64 = by_reward_token.iter().map(|r| r.apr).sum();
    BoostApr {
        boost_id: boost.id.clone(),
        apr,
        daily: yearly_to_daily(apr),
        by_reward_token,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
