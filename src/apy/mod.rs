//! APY Composition Engine
//!
//! Responsible for:
//! - Extracting recognized APR/APY components from raw API payloads
//! - Composing daily/monthly/yearly totals per vault
//! - Boost APR from on-chain reward streams, campaign overlays
//! - Average APY over trailing periods (downstream of the totals)

mod avg;
mod boost_apr;
mod campaigns;
mod components;
mod compose;
mod engine;

pub use avg::{avg_apy, avg_apy_table, vault_age_days, AvgApy, AvgApyPeriod};
pub use boost_apr::{boost_apr, BoostApr, RewardTokenApr, SECONDS_PER_YEAR};
pub use campaigns::{CampaignClassifier, CampaignRule, CampaignSplit};
pub use components::{extract_components, split_daily, ComponentKind, Components};
pub use compose::{
    compose_total_apy, compound, uncompound_daily, yearly_to_daily, ComponentRate, TotalApy,
    TotalType, DAYS_PER_MONTH, DAYS_PER_YEAR,
};
pub use engine::ApyEngine;
