//! Error types for the derived-state engine
//!
//! Loading/unavailable data and numeric degeneracy are not errors; they are
//! handled inline (see `derived::Availability`). What lands here are
//! programming errors that must stay visible, plus config/source failures.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A computation asked for a field the vault's variant does not carry
    #[error("Vault {vault_id} is a {actual} vault, expected {expected}")]
    VariantMismatch {
        vault_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Unknown vault: {0}")]
    UnknownVault(String),

    #[error("Sort key {key} has no value selector (vault {vault_id})")]
    UnsupportedSortValue { key: &'static str, vault_id: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
