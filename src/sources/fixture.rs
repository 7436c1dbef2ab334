//! JSON fixture source
//!
//! One document holding every collaborator payload. A missing section is a
//! source that never delivers, so the topics it feeds stay Loading.

use alloy_primitives::Address;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::filter::FilterUpdate;
use crate::scheduler::EventSender;
use crate::store::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractFixture {
    pub vaults: BTreeMap<VaultId, VaultContractData>,
    pub boosts: BTreeMap<BoostId, BoostContractData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub chain_id: ChainId,
    pub address: Address,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAllowance {
    pub chain_id: ChainId,
    pub token: Address,
    pub spender: Address,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletFixture {
    pub address: Address,
    #[serde(default)]
    pub tokens: Vec<TokenBalance>,
    #[serde(default)]
    pub boosts: HashMap<BoostId, f64>,
    #[serde(default)]
    pub gov_vaults: HashMap<VaultId, f64>,
    #[serde(default)]
    pub allowances: Vec<TokenAllowance>,
    #[serde(default)]
    pub pending_withdrawals: HashMap<VaultId, Vec<WithdrawalRequest>>,
}

impl WalletFixture {
    pub fn balances(&self) -> WalletBalances {
        WalletBalances {
            tokens: self
                .tokens
                .iter()
                .map(|t| (TokenKey::new(t.chain_id.clone(), t.address), t.amount))
                .collect(),
            boosts: self.boosts.clone(),
            gov_vaults: self.gov_vaults.clone(),
            allowances: self
                .allowances
                .iter()
                .map(|a| {
                    let key = AllowanceKey {
                        chain_id: a.chain_id.clone(),
                        token: a.token,
                        spender: a.spender,
                    };
                    (key, a.amount)
                })
                .collect(),
            pending_withdrawals: self.pending_withdrawals.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fixture {
    /// Unix seconds the fixture was captured at
    pub now: Option<i64>,
    pub chains: Option<Vec<Chain>>,
    pub tokens: Option<Vec<Token>>,
    pub vaults: Option<Vec<Vault>>,
    pub boosts: Option<Vec<Boost>>,
    pub campaigns: Option<Vec<Campaign>>,
    pub prices: Option<BTreeMap<OracleId, f64>>,
    pub contract: Option<ContractFixture>,
    pub apy: Option<BTreeMap<VaultId, RawApy>>,
    pub avg_apy: Option<BTreeMap<VaultId, AvgApyHistory>>,
    pub underlying_tvl: Option<BTreeMap<VaultId, UnderlyingTvl>>,
    pub wallets: Vec<WalletFixture>,
    /// Wallet connected once everything else has loaded
    pub address: Option<Address>,
}

impl Fixture {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: Self = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse fixture {}", path.display()))?;
        Ok(fixture)
    }

    /// The event sequence a live session would produce: entities first,
    /// then raw data, then the wallet
    pub fn events(&self) -> Vec<StoreEvent> {
        let mut events = Vec::new();

        if let Some(chains) = &self.chains {
            events.push(StoreEvent::ChainsLoaded(chains.clone()));
        }
        if let Some(tokens) = &self.tokens {
            events.push(StoreEvent::TokensLoaded(tokens.clone()));
        }
        if let Some(vaults) = &self.vaults {
            events.push(StoreEvent::VaultsLoaded(vaults.clone()));
        }
        if let Some(boosts) = &self.boosts {
            events.push(StoreEvent::BoostsLoaded(boosts.clone()));
        }
        if let Some(campaigns) = &self.campaigns {
            events.push(StoreEvent::CampaignsLoaded(campaigns.clone()));
        }
        if let Some(prices) = &self.prices {
            events.push(StoreEvent::PricesLoaded(
                prices.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            ));
        }
        if let Some(contract) = &self.contract {
            events.push(StoreEvent::ContractDataLoaded {
                vaults: contract.vaults.clone().into_iter().collect(),
                boosts: contract.boosts.clone().into_iter().collect(),
            });
        }
        if let Some(apy) = &self.apy {
            events.push(StoreEvent::ApyLoaded(apy.clone().into_iter().collect()));
        }
        if let Some(avg) = &self.avg_apy {
            events.push(StoreEvent::AvgApyLoaded(avg.clone().into_iter().collect()));
        }
        if let Some(tvl) = &self.underlying_tvl {
            events.push(StoreEvent::UnderlyingTvlLoaded(tvl.clone().into_iter().collect()));
        }
        for wallet in &self.wallets {
            events.push(StoreEvent::WalletBalancesLoaded {
                address: wallet.address,
                balances: wallet.balances(),
            });
        }
        if self.address.is_some() {
            events.push(StoreEvent::AddressChanged(self.address));
        }
        events
    }

    /// Send every event, then any extra filter updates. Returns how many
    /// were accepted.
    pub fn deliver(&self, events: &EventSender, filters: Vec<FilterUpdate>) -> usize {
        let mut sent = 0;
        let all = self
            .events()
            .into_iter()
            .chain(filters.into_iter().map(StoreEvent::FiltersChanged));
        for event in all {
            if events.send(event) {
                sent += 1;
            }
        }
        info!("📦 Fixture delivered {} events", sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "now": 1700000000,
        "tokens": [
            {"chainId": "base", "address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
             "symbol": "WETH", "decimals": 18, "oracleId": "WETH"}
        ],
        "vaults": [
            {"id": "aero-weth", "name": "WETH", "chainId": "base",
             "depositToken": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
             "type": "standard",
             "receiptToken": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"}
        ],
        "prices": {"WETH": 2000.0},
        "apy": {"aero-weth": {"vaultApr": 0.1}},
        "wallets": [
            {"address": "0x1111111111111111111111111111111111111111",
             "tokens": [{"chainId": "base",
                         "address": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
                         "amount": 1.5}],
             "allowances": [{"chainId": "base",
                             "token": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                             "spender": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
                             "amount": 10.0}]}
        ],
        "address": "0x1111111111111111111111111111111111111111"
    }"#;

    #[test]
    fn test_missing_sections_never_deliver() {
        let fixture: Fixture = serde_json::from_str(SAMPLE).unwrap();
        let names: Vec<_> = fixture.events().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["tokens", "vaults", "prices", "apy", "wallet-balances", "address"]
        );
    }

    #[test]
    fn test_wallet_fixture_becomes_balances() {
        let fixture: Fixture = serde_json::from_str(SAMPLE).unwrap();
        let balances = fixture.wallets[0].balances();
        assert_eq!(balances.token("base", Address::repeat_byte(0xbb)), 1.5);
        let (weth, vault) = (Address::repeat_byte(0xaa), Address::repeat_byte(0xbb));
        assert_eq!(balances.allowance("base", weth, vault), 10.0);
        assert_eq!(balances.allowance("optimism", weth, vault), 0.0);
        assert_eq!(fixture.vaults.unwrap()[0].kind.name(), "standard");
    }
}
