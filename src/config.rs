//! Runtime settings for opening the workflow service
use super::engine::{DEFAULT_CANCELLATION_MARKER, TransitionEngine};
use super::service::TransferService;
use super::store::TransferStore;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const ENV_DB_PATH: &str = "RELOCATION_DB_PATH";
pub const ENV_CANCEL_MARKER: &str = "RELOCATION_CANCEL_MARKER";
pub const ENV_FLUSH: &str = "RELOCATION_FLUSH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    db_path: PathBuf,
    cancellation_marker: String,
    flush_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("relocation.db"),
            cancellation_marker: DEFAULT_CANCELLATION_MARKER.to_string(),
            flush_on_commit: false,
        }
    }
}

impl Config {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
    pub fn set_cancellation_marker(mut self, marker: &str) -> Self {
        self.cancellation_marker = marker.to_string();
        self
    }
    pub fn set_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
    pub fn cancellation_marker(&self) -> &str {
        &self.cancellation_marker
    }
    pub fn flush_on_commit(&self) -> bool {
        self.flush_on_commit
    }

    /// Read settings from the environment, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(marker) = lookup(ENV_CANCEL_MARKER) {
            config.cancellation_marker = marker;
        }
        if let Some(flush) = lookup(ENV_FLUSH) {
            config.flush_on_commit = flush
                .parse()
                .with_context(|| format!("{ENV_FLUSH} must be true or false, got {flush:?}"))?;
        }
        Ok(config)
    }

    /// Open the sled database and wire up a service with these settings.
    pub fn open(&self) -> anyhow::Result<TransferService> {
        let db = sled::open(&self.db_path)
            .with_context(|| format!("failed to open database at {}", self.db_path.display()))?;
        let store = TransferStore::new(Arc::new(db))?.with_flush_on_commit(self.flush_on_commit);

        info!(
            path = %self.db_path.display(),
            flush = self.flush_on_commit,
            "opened relocation store"
        );

        Ok(TransferService::with_engine(
            store,
            TransitionEngine::new(&self.cancellation_marker),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars = HashMap::from([
            (ENV_DB_PATH, "/tmp/registry.db".to_string()),
            (ENV_FLUSH, "true".to_string()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.db_path(), Path::new("/tmp/registry.db"));
        assert!(config.flush_on_commit());
        assert_eq!(config.cancellation_marker(), DEFAULT_CANCELLATION_MARKER);
    }

    #[test]
    fn bad_flush_value_is_an_error() {
        let res = Config::from_lookup(|key| (key == ENV_FLUSH).then(|| "sometimes".to_string()));
        assert!(res.is_err());
    }
}
