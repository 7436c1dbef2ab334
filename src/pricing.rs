//! USD price resolution
//!
//! Plain tokens resolve through their oracle id. A token that is itself a
//! vault receipt (a boost reward paid in shares, a CLM share deposited into
//! a wrapper) resolves to its vault's deposit-token price times the share
//! price, recursively.

use tracing::warn;

use crate::store::{DashboardState, TokenKey, Vault};

/// Receipt-of-receipt chains deeper than this are treated as unpriced
const MAX_RECEIPT_DEPTH: usize = 4;

pub fn oracle_price(state: &DashboardState, oracle_id: &str) -> Option<f64> {
    state.prices.get(oracle_id).copied()
}

/// Deposit tokens per share from the latest contract snapshot
pub fn share_price(state: &DashboardState, vault: &Vault) -> Option<f64> {
    state
        .contract
        .vaults
        .get(vault.id.as_str())
        .map(|data| data.price_per_full_share)
}

/// Share price, defaulting to 1 while contract data has not arrived
pub fn share_price_or_default(state: &DashboardState, vault: &Vault) -> f64 {
    match share_price(state, vault) {
        Some(price) => price,
        None => {
            warn!("Share price for {} not loaded, assuming 1.0", vault.id);
            1.0
        }
    }
}

pub fn token_price(state: &DashboardState, key: &TokenKey) -> Option<f64> {
    token_price_at_depth(state, key, 0)
}

pub fn deposit_token_price(state: &DashboardState, vault: &Vault) -> Option<f64> {
    token_price(state, &vault.deposit_token_key())
}

/// Price of one receipt share of the vault
pub fn receipt_price(state: &DashboardState, vault: &Vault) -> Option<f64> {
    receipt_price_at_depth(state, vault, 0)
}

fn token_price_at_depth(state: &DashboardState, key: &TokenKey, depth: usize) -> Option<f64> {
    if depth > MAX_RECEIPT_DEPTH {
        warn!("Receipt price chain too deep at {}", key);
        return None;
    }
    if let Some(vault) = state.entities.vault_by_receipt(key) {
        return receipt_price_at_depth(state, vault, depth + 1);
    }
    let token = state.entities.token(key)?;
    oracle_price(state, &token.oracle_id)
}

fn receipt_price_at_depth(state: &DashboardState, vault: &Vault, depth: usize) -> Option<f64> {
    let deposit_price = token_price_at_depth(state, &vault.deposit_token_key(), depth)?;
    Some(deposit_price * share_price(state, vault).unwrap_or(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::*;
    use alloy_primitives::Address;

    fn priced_state() -> DashboardState {
        let mut state = DashboardState::default();
        state.apply(StoreEvent::TokensLoaded(vec![Token {
            chain_id: "base".to_string(),
            address: Address::repeat_byte(0xaa),
            symbol: "WETH".to_string(),
            decimals: 18,
            oracle_id: "WETH".to_string(),
        }]));
        state.apply(StoreEvent::VaultsLoaded(vec![Vault {
            id: "moo-weth".to_string(),
            name: "WETH".to_string(),
            chain_id: "base".to_string(),
            deposit_token: Address::repeat_byte(0xaa),
            status: VaultStatus::Active,
            platform_id: "aave".to_string(),
            assets: vec!["WETH".to_string()],
            safety_score: None,
            categories: vec![],
            asset_type: AssetType::Single,
            pinned: false,
            created_at: 0,
            kind: VaultKind::Standard {
                receipt_token: Address::repeat_byte(0xbb),
                bridged: vec![],
            },
        }]));
        state.apply(StoreEvent::PricesLoaded(vec![("WETH".to_string(), 2000.0)]));
        state
    }

    #[test]
    fn test_receipt_token_priced_through_share_price() {
        let mut state = priced_state();
        let receipt = TokenKey::new("base", Address::repeat_byte(0xbb));

        // No contract data yet: share price defaults to 1
        assert_eq!(token_price(&state, &receipt), Some(2000.0));

        state.apply(StoreEvent::ContractDataLoaded {
            vaults: vec![(
                "moo-weth".to_string(),
                VaultContractData { price_per_full_share: 1.25, balance: 10.0, total_supply: 8.0 },
            )],
            boosts: vec![],
        });
        assert_eq!(token_price(&state, &receipt), Some(2500.0));
    }

    #[test]
    fn test_unknown_token_has_no_price() {
        let state = priced_state();
        let key = TokenKey::new("base", Address::repeat_byte(0x01));
        assert_eq!(token_price(&state, &key), None);
    }
}
