//! Per-vault deposit breakdown for one wallet
//!
//! A deposit can sit in several places at once: directly in the wallet,
//! staked in a boost, bridged to another chain or locked in a withdrawal
//! request. Each location is one entry, converted to deposit-token units.

use serde::Serialize;
use tracing::debug;

use crate::error::EngineResult;
use crate::pricing::share_price_or_default;
use crate::promotions::current_boost;
use crate::store::{
    DashboardState, PromotionStatus, TokenKey, Vault, VaultKind, WalletBalances,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakdownKind {
    Vault,
    Boost,
    Bridged,
    PendingWithdrawal,
    Clm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub kind: BreakdownKind,
    /// Vault id, boost id or bridged chain id
    pub id: String,
    /// Deposit-token units
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBreakdown {
    pub deposit_token: TokenKey,
    pub entries: Vec<BreakdownEntry>,
}

impl BalanceBreakdown {
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Amount held directly (the `vault` or `clm` entry)
    pub fn direct(&self) -> f64 {
        self.entries
            .iter()
            .find(|e| matches!(e.kind, BreakdownKind::Vault | BreakdownKind::Clm))
            .map_or(0.0, |e| e.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBalance {
    pub breakdown: BalanceBreakdown,
    pub total: f64,
    /// Directly held deposit that a live boost would be paying rewards on
    pub not_earning: f64,
}

impl VaultBalance {
    pub fn has_deposit(&self) -> bool {
        self.total > 0.0
    }
}

struct Shares {
    direct: f64,
    pending: f64,
    boosts: Vec<(String, f64)>,
    bridged: Vec<(String, f64)>,
}

/// Raw share (or deposit-unit) balances per location, in output order
fn collect_shares(
    state: &DashboardState,
    vault: &Vault,
    wallet: &WalletBalances,
) -> EngineResult<Shares> {
    let mut shares = Shares {
        direct: 0.0,
        pending: 0.0,
        boosts: Vec::new(),
        bridged: Vec::new(),
    };

    match &vault.kind {
        VaultKind::Gov { .. } | VaultKind::CowcentratedPool { .. } => {
            shares.direct = wallet.gov_vault(&vault.id);
        }
        VaultKind::Cowcentrated { .. } | VaultKind::CowcentratedVault { .. } => {
            shares.direct = wallet.token(&vault.chain_id, vault.require_receipt_token()?);
        }
        VaultKind::Erc4626 { .. } => {
            shares.direct = wallet.token(&vault.chain_id, vault.require_receipt_token()?);
            shares.pending = wallet.pending_withdrawal_shares(&vault.id);
        }
        VaultKind::Standard { .. } => {
            shares.direct = wallet.token(&vault.chain_id, vault.require_receipt_token()?);
            shares.boosts = state
                .entities
                .boosts_for_vault(&vault.id)
                .map(|boost| (boost.id.clone(), wallet.boost(&boost.id)))
                .collect();
            shares.bridged = vault
                .require_bridged()?
                .iter()
                .map(|b| (b.chain_id.clone(), wallet.token(&b.chain_id, b.address)))
                .collect();
        }
    }
    Ok(shares)
}

impl Shares {
    fn is_zero(&self) -> bool {
        self.direct == 0.0
            && self.pending == 0.0
            && self.boosts.iter().all(|(_, s)| *s == 0.0)
            && self.bridged.iter().all(|(_, s)| *s == 0.0)
    }

    /// Sum of the amounts that would be listed as entries
    fn held_total(&self, price: f64) -> f64 {
        let located = self.boosts.iter().chain(self.bridged.iter()).map(|(_, s)| *s);
        [self.direct, self.pending]
            .into_iter()
            .chain(located)
            .filter_map(|shares| held_amount(shares, price))
            .sum()
    }
}

/// Deposit-token amount for a share balance; only positive amounts count
fn held_amount(shares: f64, price: f64) -> Option<f64> {
    let amount = shares * price;
    (amount > 0.0).then_some(amount)
}

/// Deposit-token units per share. Gov balances are already in deposit
/// units; unknown share prices default to 1.
fn conversion(state: &DashboardState, vault: &Vault) -> f64 {
    if vault.is_gov_like() {
        1.0
    } else {
        share_price_or_default(state, vault)
    }
}

pub fn balance_breakdown(
    state: &DashboardState,
    vault: &Vault,
    wallet: &WalletBalances,
) -> EngineResult<BalanceBreakdown> {
    let shares = collect_shares(state, vault, wallet)?;
    let mut entries = Vec::new();

    if !shares.is_zero() {
        let price = conversion(state, vault);
        let direct_kind = match vault.kind {
            VaultKind::Cowcentrated { .. } => BreakdownKind::Clm,
            _ => BreakdownKind::Vault,
        };

        let mut push = |kind: BreakdownKind, id: &str, shares: f64| {
            if let Some(amount) = held_amount(shares, price) {
                entries.push(BreakdownEntry {
                    kind,
                    id: id.to_string(),
                    amount,
                });
            }
        };

        push(direct_kind, &vault.id, shares.direct);
        push(BreakdownKind::PendingWithdrawal, &vault.id, shares.pending);
        for (boost_id, staked) in &shares.boosts {
            push(BreakdownKind::Boost, boost_id, *staked);
        }
        for (chain_id, held) in &shares.bridged {
            push(BreakdownKind::Bridged, chain_id, *held);
        }
    }

    debug!("Balance breakdown for {}: {} entries", vault.id, entries.len());
    Ok(BalanceBreakdown {
        deposit_token: vault.deposit_token_key(),
        entries,
    })
}

/// Total deposit including displaced positions, summed straight from the
/// wallet snapshot rather than from the breakdown entries
pub fn total_including_displaced(
    state: &DashboardState,
    vault: &Vault,
    wallet: &WalletBalances,
) -> EngineResult<f64> {
    let shares = collect_shares(state, vault, wallet)?;
    if shares.is_zero() {
        return Ok(0.0);
    }
    Ok(shares.held_total(conversion(state, vault)))
}

/// Direct deposit that is missing out on a live (or upcoming) boost
pub fn not_earning_balance(
    state: &DashboardState,
    vault: &Vault,
    breakdown: &BalanceBreakdown,
) -> f64 {
    match current_boost(state, &vault.id) {
        Some((_, PromotionStatus::Active | PromotionStatus::Prestake)) => breakdown.direct(),
        _ => 0.0,
    }
}

pub fn vault_balance(
    state: &DashboardState,
    vault: &Vault,
    wallet: &WalletBalances,
) -> EngineResult<VaultBalance> {
    let breakdown = balance_breakdown(state, vault, wallet)?;
    let total = total_including_displaced(state, vault, wallet)?;
    let not_earning = not_earning_balance(state, vault, &breakdown);
    Ok(VaultBalance {
        breakdown,
        total,
        not_earning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::*;
    use crate::testing::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bridged_vault() -> Vault {
        vault(
            "v1",
            0xaa,
            VaultKind::Standard {
                receipt_token: addr(0xbb),
                bridged: vec![
                    BridgedReceipt { chain_id: "optimism".to_string(), address: addr(0xb1) },
                    BridgedReceipt { chain_id: "arbitrum".to_string(), address: addr(0xb2) },
                ],
            },
        )
    }

    fn state_for(v: Vault, ppfs: f64, boost_data: Option<BoostContractData>) -> DashboardState {
        state_with(vec![
            StoreEvent::VaultsLoaded(vec![v]),
            StoreEvent::BoostsLoaded(vec![boost("b1", "v1", 0xbb)]),
            StoreEvent::ContractDataLoaded {
                vaults: vec![("v1".to_string(), contract(ppfs, 0.0, 0.0))],
                boosts: boost_data.map(|d| ("b1".to_string(), d)).into_iter().collect(),
            },
        ])
    }

    fn wallet_with(direct: f64, boosted: f64, optimism: f64) -> WalletBalances {
        let mut wallet = WalletBalances::default();
        wallet.tokens.insert(TokenKey::new(CHAIN, addr(0xbb)), direct);
        wallet.tokens.insert(TokenKey::new("optimism", addr(0xb1)), optimism);
        wallet.boosts.insert("b1".to_string(), boosted);
        wallet
    }

    #[test]
    fn test_direct_boost_and_bridged_entries() {
        let state = state_for(bridged_vault(), 1.0, Some(active_boost_data(50.0, 0xcc, 1.0)));
        let v = state.entities.vaults.get("v1").unwrap();
        let wallet = wallet_with(100.0, 50.0, 25.0);

        let balance = vault_balance(&state, v, &wallet).unwrap();
        let entries = &balance.breakdown.entries;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, BreakdownKind::Vault);
        assert_eq!(entries[0].amount, 100.0);
        assert_eq!(entries[1].kind, BreakdownKind::Boost);
        assert_eq!(entries[1].id, "b1");
        assert_eq!(entries[2].kind, BreakdownKind::Bridged);
        assert_eq!(entries[2].id, "optimism");
        assert_eq!(balance.total, 175.0);
        assert_eq!(balance.breakdown.total(), 175.0);
        // Direct deposit is not staked in the active boost
        assert_eq!(balance.not_earning, 100.0);
    }

    #[test]
    fn test_share_price_converts_every_entry() {
        let state = state_for(bridged_vault(), 2.0, None);
        let v = state.entities.vaults.get("v1").unwrap();
        let balance = vault_balance(&state, v, &wallet_with(10.0, 5.0, 0.0)).unwrap();
        assert_eq!(balance.breakdown.entries[0].amount, 20.0);
        assert_eq!(balance.breakdown.entries[1].amount, 10.0);
        assert_eq!(balance.total, 30.0);
        assert_eq!(balance.not_earning, 0.0);
    }

    #[test]
    fn test_zero_balances_give_empty_breakdown() {
        let state = state_for(bridged_vault(), 1.0, None);
        let v = state.entities.vaults.get("v1").unwrap();
        let balance = vault_balance(&state, v, &WalletBalances::default()).unwrap();
        assert!(balance.breakdown.is_empty());
        assert_eq!(balance.total, 0.0);
    }

    #[test]
    fn test_gov_balance_is_in_deposit_units() {
        let state = state_with(vec![
            StoreEvent::VaultsLoaded(vec![gov_vault("gov", 0xaa)]),
            StoreEvent::ContractDataLoaded {
                vaults: vec![("gov".to_string(), contract(3.0, 0.0, 0.0))],
                boosts: vec![],
            },
        ]);
        let v = state.entities.vaults.get("gov").unwrap();
        let mut wallet = WalletBalances::default();
        wallet.gov_vaults.insert("gov".to_string(), 12.0);

        let breakdown = balance_breakdown(&state, v, &wallet).unwrap();
        assert_eq!(breakdown.entries.len(), 1);
        assert_eq!(breakdown.entries[0].amount, 12.0);
    }

    #[test]
    fn test_erc4626_pending_withdrawal_and_clm_kind() {
        let erc = vault("erc", 0xaa, VaultKind::Erc4626 { receipt_token: addr(0xbe) });
        let clm = vault("clm", 0xaa, VaultKind::Cowcentrated { receipt_token: addr(0xbf) });
        let state = state_with(vec![StoreEvent::VaultsLoaded(vec![erc, clm])]);

        let mut wallet = WalletBalances::default();
        wallet.tokens.insert(TokenKey::new(CHAIN, addr(0xbe)), 4.0);
        wallet.tokens.insert(TokenKey::new(CHAIN, addr(0xbf)), 2.0);
        wallet.pending_withdrawals.insert(
            "erc".to_string(),
            vec![WithdrawalRequest { id: 1, shares: 6.0, claimable_at: NOW, claimed: false }],
        );

        let erc = state.entities.vaults.get("erc").unwrap();
        let breakdown = balance_breakdown(&state, erc, &wallet).unwrap();
        let kinds: Vec<_> = breakdown.entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![BreakdownKind::Vault, BreakdownKind::PendingWithdrawal]);
        assert_eq!(breakdown.total(), 10.0);

        let clm = state.entities.vaults.get("clm").unwrap();
        let breakdown = balance_breakdown(&state, clm, &wallet).unwrap();
        assert_eq!(breakdown.entries[0].kind, BreakdownKind::Clm);
    }

    #[test]
    fn test_negative_inputs_never_reach_the_total() {
        let state = state_for(bridged_vault(), 1.0, None);
        let v = state.entities.vaults.get("v1").unwrap();
        let balance = vault_balance(&state, v, &wallet_with(-40.0, 10.0, f64::NAN)).unwrap();

        assert_eq!(balance.breakdown.entries.len(), 1);
        assert_eq!(balance.breakdown.entries[0].kind, BreakdownKind::Boost);
        assert_eq!(balance.total, 10.0);
        assert_eq!(balance.breakdown.total(), balance.total);
    }

    #[test]
    fn test_entries_sum_to_independent_total() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let ppfs = rng.gen_range(0.5..3.0);
            let state = state_for(bridged_vault(), ppfs, None);
            let v = state.entities.vaults.get("v1").unwrap();
            let wallet = wallet_with(
                rng.gen_range(-100.0..1_000.0),
                rng.gen_range(-100.0..1_000.0),
                rng.gen_range(-100.0..1_000.0),
            );
            let balance = vault_balance(&state, v, &wallet).unwrap();
            assert!((balance.breakdown.total() - balance.total).abs() < 1e-6);
            assert!(balance.breakdown.entries.iter().all(|e| e.amount > 0.0));
        }
    }
}
