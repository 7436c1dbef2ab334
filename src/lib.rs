//! VaultLens - derived financial state for a yield-vault dashboard
//!
//! Raw entities, prices, contract reads, API payloads and wallet balances go
//! into the store as events. Recompute topics turn them into per-vault APY,
//! balance breakdowns, TVL and the filtered/sorted listing, published as
//! immutable snapshots.

pub mod apy;
pub mod balance;
pub mod clock;
pub mod config;
pub mod derived;
pub mod error;
pub mod filter;
pub mod memo;
pub mod pricing;
pub mod promotions;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod tvl;

#[cfg(test)]
mod testing;

pub use derived::{Availability, DerivedState};
pub use error::{EngineError, EngineResult};
pub use scheduler::{Dashboard, DashboardOptions};
