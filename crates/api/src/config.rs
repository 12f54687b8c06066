//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use millerp_infra::config::{CatalogSeed, ConfigError};
use millerp_infra::{InMemoryWarehouseStore, StoreError};

pub const BIND_ADDR_ENV: &str = "MILLERP_BIND_ADDR";
pub const SEED_FILE_ENV: &str = "MILLERP_SEED_FILE";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("invalid {BIND_ADDR_ENV} value {0:?}")]
    InvalidBindAddr(String),

    #[error(transparent)]
    Seed(#[from] ConfigError),

    #[error("seed rejected by store: {0}")]
    SeedRejected(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub seed_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppConfigError> {
        let raw = lookup(BIND_ADDR_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw
            .trim()
            .parse()
            .map_err(|_| AppConfigError::InvalidBindAddr(raw.clone()))?;
        let seed_file = lookup(SEED_FILE_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Ok(Self {
            bind_addr,
            seed_file,
        })
    }

    /// In-memory store loaded with the configured seed (empty without one).
    pub fn load_store(&self) -> Result<InMemoryWarehouseStore, AppConfigError> {
        match &self.seed_file {
            Some(path) => {
                let seed = CatalogSeed::load(path)?;
                tracing::info!(
                    path = %path.display(),
                    items = seed.items.len(),
                    warehouses = seed.warehouses.len(),
                    "catalog seed loaded"
                );
                Ok(InMemoryWarehouseStore::from_seed(seed)?)
            }
            None => {
                tracing::warn!("{SEED_FILE_ENV} not set; starting with an empty catalog");
                Ok(InMemoryWarehouseStore::new())
            }
        }
    }
}
