use alloy_primitives::Address;
use std::collections::HashMap;
use tracing::debug;

use super::breakdown::{vault_balance, VaultBalance};
use crate::derived::{Availability, BalanceTable};
use crate::error::EngineResult;
use crate::memo::Memo;
use crate::store::{DashboardState, VaultId};

/// (vault entity, wallet entry, vault contract data, boost contracts, boosts, time bucket)
type BalanceDeps = (Option<u64>, Option<u64>, Option<u64>, u64, u64, i64);

pub struct BalanceEngine {
    memo: Memo<(Address, VaultId), BalanceDeps, VaultBalance>,
}

impl Default for BalanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceEngine {
    pub fn new() -> Self {
        Self {
            memo: Memo::new("balance"),
        }
    }

    /// Breakdown of every vault for the connected wallet
    pub fn compute(&mut self, state: &DashboardState) -> EngineResult<BalanceTable> {
        let Some(address) = state.connected() else {
            self.memo.clear();
            return Ok(BalanceTable::default());
        };
        let Some(wallet) = state.wallet_balances(&address) else {
            return Ok(BalanceTable {
                address: Some(address),
                by_vault: HashMap::new(),
            });
        };

        let mut by_vault = HashMap::new();
        for (vault_id, vault) in state.entities.vaults.iter() {
            let deps = (
                state.entities.vaults.revision_of(vault_id.as_str()),
                state.wallet.balances.revision_of(&address),
                state.contract.vaults.revision_of(vault_id.as_str()),
                state.contract.boosts.revision(),
                state.entities.boosts.revision(),
                state.now,
            );
            let key = (address, vault_id.clone());
            let balance = self
                .memo
                .get_or_compute(&key, deps, || vault_balance(state, vault, wallet))?;
            by_vault.insert(vault_id.clone(), balance);
        }
        self.memo.retain_keys(|(owner, _)| *owner == address);

        debug!("Balances for {}: {} vaults", address, by_vault.len());
        Ok(BalanceTable {
            address: Some(address),
            by_vault,
        })
    }
}

/// One vault's balance for an explicit wallet, or the connected one.
///
/// Unavailable with no wallet at all; Loading until that wallet's balances
/// have been delivered.
pub fn balance_for(
    state: &DashboardState,
    vault_id: &str,
    wallet: Option<Address>,
) -> EngineResult<Availability<VaultBalance>> {
    let Some(address) = wallet.or_else(|| state.connected()) else {
        return Ok(Availability::Unavailable);
    };
    let Some(balances) = state.wallet_balances(&address) else {
        return Ok(Availability::Loading);
    };
    let vault = state.entities.vault(vault_id)?;
    Ok(Availability::Ready(vault_balance(state, vault, balances)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::*;
    use crate::testing::*;

    fn wallet(direct: f64) -> WalletBalances {
        let mut wallet = WalletBalances::default();
        wallet.tokens.insert(TokenKey::new(CHAIN, addr(0xbb)), direct);
        wallet
    }

    #[test]
    fn test_no_wallet_is_unavailable_and_undelivered_is_loading() {
        let mut state = state_with(vec![StoreEvent::VaultsLoaded(vec![standard_vault(
            "v1", 0xaa, 0xbb,
        )])]);
        assert_eq!(balance_for(&state, "v1", None).unwrap(), Availability::Unavailable);

        state.apply(StoreEvent::AddressChanged(Some(addr(0x11))));
        assert_eq!(balance_for(&state, "v1", None).unwrap(), Availability::Loading);

        state.apply(StoreEvent::WalletBalancesLoaded { address: addr(0x11), balances: wallet(3.0) });
        let balance = balance_for(&state, "v1", None).unwrap().ready().unwrap();
        assert_eq!(balance.total, 3.0);

        // Explicit wallet overrides the connected one
        assert!(balance_for(&state, "v1", Some(addr(0x22))).unwrap().is_loading());
        assert!(balance_for(&state, "missing", None).is_err());
    }

    #[test]
    fn test_engine_follows_address_switch() {
        let mut engine = BalanceEngine::new();
        let mut state = state_with(vec![
            StoreEvent::VaultsLoaded(vec![standard_vault("v1", 0xaa, 0xbb)]),
            StoreEvent::WalletBalancesLoaded { address: addr(0x11), balances: wallet(3.0) },
            StoreEvent::WalletBalancesLoaded { address: addr(0x22), balances: wallet(7.0) },
            StoreEvent::AddressChanged(Some(addr(0x11))),
        ]);

        let table = engine.compute(&state).unwrap();
        assert_eq!(table.by_vault["v1"].total, 3.0);

        state.apply(StoreEvent::AddressChanged(Some(addr(0x22))));
        let table = engine.compute(&state).unwrap();
        assert_eq!(table.address, Some(addr(0x22)));
        assert_eq!(table.by_vault["v1"].total, 7.0);

        state.apply(StoreEvent::AddressChanged(None));
        let table = engine.compute(&state).unwrap();
        assert!(table.address.is_none());
        assert!(table.by_vault.is_empty());
    }
}
