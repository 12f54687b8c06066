//! Catalog and account-map seed loaded at startup.
//!
//! The catalog is owned by an external system; this seed is how its rows reach the
//! in-memory store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use millerp_accounting::SystemAccountKey;
use millerp_core::{AccountId, CompanyId};
use millerp_inventory::{Bin, Item, Unit, Warehouse};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed json: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAccountSeed {
    pub company_id: CompanyId,
    pub key: SystemAccountKey,
    pub account_id: AccountId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
    #[serde(default)]
    pub bins: Vec<Bin>,
    #[serde(default)]
    pub system_accounts: Vec<SystemAccountSeed>,
}

impl CatalogSeed {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_seed() {
        let company = CompanyId::new();
        let wh = millerp_core::WarehouseId::new();
        let json = format!(
            r#"{{
                "warehouses": [{{"id": "{wh}", "company_id": "{company}", "code": "WH01", "name": "Main store"}}],
                "system_accounts": [{{"company_id": "{company}", "key": "INVENTORY_GENERAL", "account_id": "{acc}"}}]
            }}"#,
            acc = AccountId::new()
        );
        let seed = CatalogSeed::from_json_str(&json).unwrap();
        assert_eq!(seed.warehouses.len(), 1);
        assert!(seed.warehouses[0].active);
        assert_eq!(seed.system_accounts[0].key, SystemAccountKey::InventoryGeneral);
        assert!(seed.items.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = CatalogSeed::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
