//! Entity Store
//!
//! Normalized tables for chains, tokens, vaults and promotions plus the
//! secondary indexes the engines need (boosts per vault in load order,
//! vault by receipt token, campaigns per vault).

use std::collections::HashMap;

use super::entities::*;
use super::table::Table;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    pub chains: Table<ChainId, Chain>,
    pub tokens: Table<TokenKey, Token>,
    pub vaults: Table<VaultId, Vault>,
    pub boosts: Table<BoostId, Boost>,
    pub campaigns: Table<CampaignId, Campaign>,
    boost_ids_by_vault: HashMap<VaultId, Vec<BoostId>>,
    campaign_ids_by_vault: HashMap<VaultId, Vec<CampaignId>>,
    vault_id_by_receipt: HashMap<TokenKey, VaultId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================
    // MERGES
    // ============================================

    pub fn merge_chains(&mut self, chains: Vec<Chain>) -> bool {
        self.chains
            .merge(chains.into_iter().map(|c| (c.id.clone(), c)))
    }

    pub fn merge_tokens(&mut self, tokens: Vec<Token>) -> bool {
        self.tokens.merge(tokens.into_iter().map(|t| (t.key(), t)))
    }

    /// Vaults are never deleted; a refresh patches status and fields in place.
    pub fn merge_vaults(&mut self, vaults: Vec<Vault>) -> bool {
        let mut changed = false;
        for vault in vaults {
            if let Some(receipt) = vault.receipt_token() {
                self.vault_id_by_receipt.insert(
                    TokenKey::new(vault.chain_id.clone(), receipt),
                    vault.id.clone(),
                );
            }
            changed |= self.vaults.upsert(vault.id.clone(), vault);
        }
        changed
    }

    pub fn merge_boosts(&mut self, boosts: Vec<Boost>) -> bool {
        let mut changed = false;
        for boost in boosts {
            let ids = self
                .boost_ids_by_vault
                .entry(boost.vault_id.clone())
                .or_default();
            if !ids.contains(&boost.id) {
                ids.push(boost.id.clone());
            }
            changed |= self.boosts.upsert(boost.id.clone(), boost);
        }
        changed
    }

    pub fn merge_campaigns(&mut self, campaigns: Vec<Campaign>) -> bool {
        let mut changed = false;
        for campaign in campaigns {
            let ids = self
                .campaign_ids_by_vault
                .entry(campaign.vault_id.clone())
                .or_default();
            if !ids.contains(&campaign.id) {
                ids.push(campaign.id.clone());
            }
            changed |= self.campaigns.upsert(campaign.id.clone(), campaign);
        }
        changed
    }

    // ============================================
    // LOOKUPS
    // ============================================

    pub fn vault(&self, vault_id: &str) -> EngineResult<&Vault> {
        self.vaults
            .get(vault_id)
            .ok_or_else(|| EngineError::UnknownVault(vault_id.to_string()))
    }

    pub fn vault_ids(&self) -> impl Iterator<Item = &VaultId> {
        self.vaults.keys()
    }

    pub fn token(&self, key: &TokenKey) -> Option<&Token> {
        self.tokens.get(key)
    }

    /// Every boost ever associated with the vault, in load order
    pub fn boost_ids_for_vault(&self, vault_id: &str) -> &[BoostId] {
        self.boost_ids_by_vault
            .get(vault_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn boosts_for_vault<'a>(&'a self, vault_id: &str) -> impl Iterator<Item = &'a Boost> + 'a {
        self.boost_ids_for_vault(vault_id)
            .iter()
            .filter_map(move |id| self.boosts.get(id))
    }

    pub fn campaigns_for_vault<'a>(
        &'a self,
        vault_id: &str,
    ) -> impl Iterator<Item = &'a Campaign> + 'a {
        self.campaign_ids_by_vault
            .get(vault_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter_map(move |id| self.campaigns.get(id))
    }

    /// The vault issuing this token as its receipt, if any
    pub fn vault_by_receipt(&self, key: &TokenKey) -> Option<&Vault> {
        self.vault_id_by_receipt
            .get(key)
            .and_then(|id| self.vaults.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn standard(id: &str, receipt: u8) -> Vault {
        Vault {
            id: id.to_string(),
            name: id.to_uppercase(),
            chain_id: "optimism".to_string(),
            deposit_token: Address::repeat_byte(0xaa),
            status: VaultStatus::Active,
            platform_id: "velodrome".to_string(),
            assets: vec!["OP".to_string(), "USDC".to_string()],
            safety_score: Some(7.5),
            categories: vec![],
            asset_type: AssetType::Lps,
            pinned: false,
            created_at: 0,
            kind: VaultKind::Standard {
                receipt_token: Address::repeat_byte(receipt),
                bridged: vec![],
            },
        }
    }

    fn boost(id: &str, vault_id: &str) -> Boost {
        Boost {
            id: id.to_string(),
            vault_id: vault_id.to_string(),
            chain_id: "optimism".to_string(),
            contract: Address::repeat_byte(0x33),
            staked_token: Address::repeat_byte(0x10),
            reward_tokens: vec![],
            starts_at: None,
            partner: None,
        }
    }

    #[test]
    fn test_vault_refresh_patches_status_in_place() {
        let mut store = EntityStore::new();
        assert!(store.merge_vaults(vec![standard("a", 0x10), standard("b", 0x11)]));

        let mut retired = standard("a", 0x10);
        retired.status = VaultStatus::Eol;
        assert!(store.merge_vaults(vec![retired]));

        assert!(store.vault("a").unwrap().is_retired());
        let ids: Vec<_> = store.vault_ids().cloned().collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_boost_index_keeps_load_order_without_duplicates() {
        let mut store = EntityStore::new();
        store.merge_boosts(vec![boost("moo-2", "a"), boost("moo-1", "a"), boost("x", "b")]);
        store.merge_boosts(vec![boost("moo-2", "a")]);

        assert_eq!(store.boost_ids_for_vault("a"), &["moo-2".to_string(), "moo-1".to_string()]);
        assert!(store.boost_ids_for_vault("missing").is_empty());
    }

    #[test]
    fn test_vault_by_receipt_and_unknown_vault() {
        let mut store = EntityStore::new();
        store.merge_vaults(vec![standard("a", 0x10)]);

        let key = TokenKey::new("optimism", Address::repeat_byte(0x10));
        assert_eq!(store.vault_by_receipt(&key).map(|v| v.id.as_str()), Some("a"));
        assert!(matches!(store.vault("zzz"), Err(EngineError::UnknownVault(_))));
    }
}
