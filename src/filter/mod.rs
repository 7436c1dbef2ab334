//! Filter + Sort Pipeline
//!
//! Responsible for:
//! - Filter criteria stored as a store slice, changed by `FilterUpdate` events
//! - Cost-ordered predicates over the vault list
//! - Stable sorting with loading values last
//! - Reusing previous results when nothing relevant changed

mod criteria;
mod pipeline;
mod predicates;
mod sort;

pub use criteria::{
    AssetTypeFilter, FilterCriteria, FilterUpdate, RecomputeFlags, SortDirection, SortKey,
    UserCategory,
};
pub use pipeline::{recompute_filtered, FilterContext, FilteredVaults};
pub use predicates::{build_predicates, matches_search, normalize_search, Cost, Predicate};
pub use sort::{sort_ids, sort_value};
