//! Shared fixtures for unit tests

use alloy_primitives::Address;

use crate::store::*;

/// Bucket-aligned "now" used across tests (multiple of 60)
pub const NOW: i64 = 1_700_000_040;

pub const CHAIN: &str = "base";

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn token(symbol: &str, byte: u8) -> Token {
    Token {
        chain_id: CHAIN.to_string(),
        address: addr(byte),
        symbol: symbol.to_string(),
        decimals: 18,
        oracle_id: symbol.to_string(),
    }
}

pub fn vault(id: &str, deposit: u8, kind: VaultKind) -> Vault {
    Vault {
        id: id.to_string(),
        name: id.to_uppercase(),
        chain_id: CHAIN.to_string(),
        deposit_token: addr(deposit),
        status: VaultStatus::Active,
        platform_id: "aerodrome".to_string(),
        assets: vec![id.to_uppercase()],
        safety_score: Some(8.0),
        categories: vec![],
        asset_type: AssetType::Single,
        pinned: false,
        created_at: NOW - 400 * 86_400,
        kind,
    }
}

pub fn standard_vault(id: &str, deposit: u8, receipt: u8) -> Vault {
    vault(
        id,
        deposit,
        VaultKind::Standard {
            receipt_token: addr(receipt),
            bridged: vec![],
        },
    )
}

pub fn gov_vault(id: &str, deposit: u8) -> Vault {
    vault(
        id,
        deposit,
        VaultKind::Gov {
            reward_pool: addr(0xf0),
        },
    )
}

pub fn boost(id: &str, vault_id: &str, staked: u8) -> Boost {
    Boost {
        id: id.to_string(),
        vault_id: vault_id.to_string(),
        chain_id: CHAIN.to_string(),
        contract: addr(0xe0),
        staked_token: addr(staked),
        reward_tokens: vec![],
        starts_at: None,
        partner: None,
    }
}

pub fn contract(ppfs: f64, balance: f64, total_supply: f64) -> VaultContractData {
    VaultContractData {
        price_per_full_share: ppfs,
        balance,
        total_supply,
    }
}

/// One emitting reward stream finishing a day after `NOW`
pub fn active_boost_data(total_supply: f64, reward: u8, rate: f64) -> BoostContractData {
    BoostContractData {
        total_supply,
        rewards: vec![RewardStream {
            token: addr(reward),
            rate,
            period_finish: NOW + 86_400,
        }],
    }
}

pub fn raw_apy(pairs: &[(&str, f64)]) -> RawApy {
    RawApy::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), *v)))
}

/// Fresh state at `NOW` with every event applied in order
pub fn state_with(events: Vec<StoreEvent>) -> DashboardState {
    let mut state = DashboardState::new(NOW, 60, Default::default());
    for event in events {
        state.apply(event);
    }
    state
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
