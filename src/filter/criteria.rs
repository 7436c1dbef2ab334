//! Filter criteria and their mutations
//!
//! Criteria live in the store like any other slice. Each UI action is one
//! `FilterUpdate` event; sort updates and filter updates raise different
//! recompute flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::store::{AssetType, ChainId, PlatformId, VaultCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Default,
    Apy,
    Daily,
    Tvl,
    SafetyScore,
    DepositValue,
    WalletValue,
}

impl SortKey {
    pub fn name(&self) -> &'static str {
        match self {
            SortKey::Default => "default",
            SortKey::Apy => "apy",
            SortKey::Daily => "daily",
            SortKey::Tvl => "tvl",
            SortKey::SafetyScore => "safetyScore",
            SortKey::DepositValue => "depositValue",
            SortKey::WalletValue => "walletValue",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "default" => Ok(SortKey::Default),
            "apy" => Ok(SortKey::Apy),
            "daily" => Ok(SortKey::Daily),
            "tvl" => Ok(SortKey::Tvl),
            "safety" | "safetyscore" => Ok(SortKey::SafetyScore),
            "deposit" | "depositvalue" => Ok(SortKey::DepositValue),
            "wallet" | "walletvalue" => Ok(SortKey::WalletValue),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

/// Which vaults relative to the connected wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserCategory {
    #[default]
    All,
    /// Wallet holds the deposit token
    Eligible,
    /// Wallet has a deposit ("My Positions")
    Deposited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetTypeFilter {
    #[default]
    All,
    Single,
    Lps,
    Clm,
}

impl AssetTypeFilter {
    pub fn accepts(&self, asset_type: AssetType) -> bool {
        match self {
            AssetTypeFilter::All => true,
            AssetTypeFilter::Single => asset_type == AssetType::Single,
            AssetTypeFilter::Lps => asset_type == AssetType::Lps,
            AssetTypeFilter::Clm => asset_type == AssetType::Clm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    /// Empty means every chain
    pub chains: BTreeSet<ChainId>,
    pub search: String,
    pub user_category: UserCategory,
    /// A vault must carry every selected category
    pub categories: Vec<VaultCategory>,
    pub asset_type: AssetTypeFilter,
    /// Empty means every platform
    pub platforms: BTreeSet<PlatformId>,
    pub only_boosted: bool,
    pub only_retired: bool,
    pub only_paused: bool,
    /// USD; 0 disables
    pub min_tvl: f64,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            chains: BTreeSet::new(),
            search: String::new(),
            user_category: UserCategory::All,
            categories: Vec::new(),
            asset_type: AssetTypeFilter::All,
            platforms: BTreeSet::new(),
            only_boosted: false,
            only_retired: false,
            only_paused: false,
            min_tvl: 0.0,
            sort: SortKey::Default,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterUpdate {
    SetChains(Vec<ChainId>),
    ToggleChain(ChainId),
    SetSearch(String),
    SetUserCategory(UserCategory),
    SetCategories(Vec<VaultCategory>),
    SetAssetType(AssetTypeFilter),
    SetPlatforms(Vec<PlatformId>),
    SetOnlyBoosted(bool),
    SetOnlyRetired(bool),
    SetOnlyPaused(bool),
    SetMinTvl(f64),
    SetSort(SortKey),
    SetSortDirection(SortDirection),
    /// Clear every filter, keeping the sort
    Reset,
}

impl FilterUpdate {
    pub fn is_sort(&self) -> bool {
        matches!(self, FilterUpdate::SetSort(_) | FilterUpdate::SetSortDirection(_))
    }
}

impl FilterCriteria {
    /// Apply one update. Returns true if the criteria changed.
    pub fn apply(&mut self, update: FilterUpdate) -> bool {
        let before = self.clone();
        match update {
            FilterUpdate::SetChains(chains) => self.chains = chains.into_iter().collect(),
            FilterUpdate::ToggleChain(chain) => {
                if !self.chains.remove(&chain) {
                    self.chains.insert(chain);
                }
            }
            FilterUpdate::SetSearch(search) => self.search = search,
            FilterUpdate::SetUserCategory(category) => self.user_category = category,
            FilterUpdate::SetCategories(mut categories) => {
                categories.dedup();
                self.categories = categories;
            }
            FilterUpdate::SetAssetType(asset_type) => self.asset_type = asset_type,
            FilterUpdate::SetPlatforms(platforms) => {
                self.platforms = platforms.into_iter().collect()
            }
            FilterUpdate::SetOnlyBoosted(on) => self.only_boosted = on,
            FilterUpdate::SetOnlyRetired(on) => self.only_retired = on,
            FilterUpdate::SetOnlyPaused(on) => self.only_paused = on,
            FilterUpdate::SetMinTvl(min) => self.min_tvl = if min.is_finite() { min.max(0.0) } else { 0.0 },
            FilterUpdate::SetSort(sort) => self.sort = sort,
            FilterUpdate::SetSortDirection(direction) => self.direction = direction,
            FilterUpdate::Reset => {
                *self = FilterCriteria {
                    sort: self.sort,
                    direction: self.direction,
                    ..FilterCriteria::default()
                }
            }
        }
        *self != before
    }

    /// The "My Positions" view
    pub fn is_deposited_view(&self) -> bool {
        self.user_category == UserCategory::Deposited
    }
}

/// What changed since the last filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeFlags {
    pub data: bool,
    pub filters: bool,
    pub sort: bool,
}

impl RecomputeFlags {
    pub const NONE: Self = Self { data: false, filters: false, sort: false };
    pub const DATA: Self = Self { data: true, filters: false, sort: false };
    pub const FILTERS: Self = Self { data: false, filters: true, sort: false };
    pub const SORT: Self = Self { data: false, filters: false, sort: true };
    pub const ALL: Self = Self { data: true, filters: true, sort: true };

    pub fn is_empty(&self) -> bool {
        !(self.data || self.filters || self.sort)
    }

    /// Membership may have changed, not just the order
    pub fn needs_filtering(&self) -> bool {
        self.data || self.filters
    }
}

impl BitOr for RecomputeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            data: self.data || rhs.data,
            filters: self.filters || rhs.filters,
            sort: self.sort || rhs.sort,
        }
    }
}

impl BitOrAssign for RecomputeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_reports_changes_only() {
        let mut criteria = FilterCriteria::default();
        assert!(criteria.apply(FilterUpdate::ToggleChain("base".to_string())));
        assert!(criteria.chains.contains("base"));
        assert!(criteria.apply(FilterUpdate::ToggleChain("base".to_string())));
        assert!(criteria.chains.is_empty());
        assert!(!criteria.apply(FilterUpdate::SetOnlyBoosted(false)));
        assert!(!criteria.apply(FilterUpdate::SetSort(SortKey::Default)));
    }

    #[test]
    fn test_reset_keeps_sort() {
        let mut criteria = FilterCriteria::default();
        criteria.apply(FilterUpdate::SetSort(SortKey::Tvl));
        criteria.apply(FilterUpdate::SetSearch("eth".to_string()));
        criteria.apply(FilterUpdate::SetMinTvl(1_000.0));

        assert!(criteria.apply(FilterUpdate::Reset));
        assert_eq!(criteria.sort, SortKey::Tvl);
        assert!(criteria.search.is_empty());
        assert_eq!(criteria.min_tvl, 0.0);
    }

    #[test]
    fn test_flags_coalesce() {
        let mut flags = RecomputeFlags::NONE;
        assert!(flags.is_empty());
        flags |= RecomputeFlags::SORT;
        assert!(!flags.needs_filtering());
        flags |= RecomputeFlags::DATA;
        assert_eq!(flags, RecomputeFlags { data: true, filters: false, sort: true });
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("apy".parse::<SortKey>(), Ok(SortKey::Apy));
        assert_eq!("safety-score".parse::<SortKey>(), Ok(SortKey::SafetyScore));
        assert_eq!("walletValue".parse::<SortKey>(), Ok(SortKey::WalletValue));
        assert!("bogus".parse::<SortKey>().is_err());
    }
}
