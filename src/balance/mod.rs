//! Balance Breakdown Engine
//!
//! Responsible for:
//! - Locating a wallet's deposit across direct, boosted, bridged and
//!   pending-withdrawal positions
//! - Converting share balances to deposit-token units
//! - Flagging deposits that are not earning an available boost

mod breakdown;
mod engine;

pub use breakdown::{
    balance_breakdown, not_earning_balance, total_including_displaced, vault_balance,
    BalanceBreakdown, BreakdownEntry, BreakdownKind, VaultBalance,
};
pub use engine::{balance_for, BalanceEngine};
