use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Location and pool sizing for one store. The remote store is just a second
/// `StoreConfig`; nothing in the sync path knows which side is "really"
/// networked.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            max_connections: 8,
        }
    }
}

/// Knobs for the reconciliation loop. `throttle` is pacing between batches
/// and between record types, not a correctness mechanism; zero disables it.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub throttle: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            throttle: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub local: StoreConfig,
    pub remote: StoreConfig,
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Read configuration from `SACRISTIA_*` environment variables.
    /// Store locations have working-directory defaults; credentials and
    /// remote endpoints are never embedded in source.
    pub fn from_env() -> Result<Self> {
        let local = StoreConfig::new(
            env::var("SACRISTIA_LOCAL_DB").unwrap_or_else(|_| "parroquia.sqlite3".into()),
        );
        let remote = StoreConfig::new(
            env::var("SACRISTIA_REMOTE_DB").unwrap_or_else(|_| "parroquia-remota.sqlite3".into()),
        );

        let mut sync = SyncSettings::default();
        if let Ok(raw) = env::var("SACRISTIA_BATCH_SIZE") {
            sync.batch_size = raw
                .parse::<usize>()
                .context("SACRISTIA_BATCH_SIZE must be a positive integer")?;
            if sync.batch_size == 0 {
                anyhow::bail!("SACRISTIA_BATCH_SIZE must be a positive integer");
            }
        }
        if let Ok(raw) = env::var("SACRISTIA_THROTTLE_MS") {
            let ms = raw
                .parse::<u64>()
                .context("SACRISTIA_THROTTLE_MS must be milliseconds")?;
            sync.throttle = Duration::from_millis(ms);
        }

        Ok(Self {
            local,
            remote,
            sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = SyncSettings::default();
        assert_eq!(settings.batch_size, 50);
        assert!(settings.throttle.is_zero());
    }
}
