//! Off-chain incentive campaigns
//!
//! Live campaigns on a vault are split into boost-like ones, matched by an
//! allow-list of (provider, chain, type) rules from config, and regular
//! ones.

use serde::{Deserialize, Serialize};

use crate::store::Campaign;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRule {
    pub provider_id: String,
    pub chain_id: String,
    pub campaign_type: String,
}

impl CampaignRule {
    pub fn matches(&self, campaign: &Campaign) -> bool {
        self.provider_id == campaign.provider_id
            && self.chain_id == campaign.chain_id
            && self.campaign_type == campaign.campaign_type
    }
}

/// Sum of live campaign APRs on one vault
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CampaignSplit {
    pub regular_apr: f64,
    pub regular_count: usize,
    pub boost_like_apr: f64,
    pub boost_like_count: usize,
}

impl CampaignSplit {
    /// Memo key component
    pub fn fingerprint(&self) -> (u64, usize, u64, usize) {
        (
            self.regular_apr.to_bits(),
            self.regular_count,
            self.boost_like_apr.to_bits(),
            self.boost_like_count,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CampaignClassifier {
    boost_like: Vec<CampaignRule>,
}

impl CampaignClassifier {
    pub fn new(boost_like: Vec<CampaignRule>) -> Self {
        Self { boost_like }
    }

    pub fn is_boost_like(&self, campaign: &Campaign) -> bool {
        self.boost_like.iter().any(|rule| rule.matches(campaign))
    }

    pub fn split<'a, I>(&self, campaigns: I, now: i64) -> CampaignSplit
    where
        I: IntoIterator<Item = &'a Campaign>,
    {
        let mut split = CampaignSplit::default();
        for campaign in campaigns {
            if !campaign.is_live(now) || !campaign.apr.is_finite() {
                continue;
            }
            if self.is_boost_like(campaign) {
                split.boost_like_apr += campaign.apr;
                split.boost_like_count += 1;
            } else {
                split.regular_apr += campaign.apr;
                split.regular_count += 1;
            }
        }
        split
    }
}
