//! Client configuration loaded from environment variables.
//!
//! Everything has a default so the client starts on the in-memory backend
//! with zero configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use unimart_backend::firebase::{FirebaseBackend, FirebaseConfig};
use unimart_backend::memory::MemoryBackend;
use unimart_backend::Backend;
use unimart_shared::constants::DEFAULT_POLL_INTERVAL;
use unimart_store::Database;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Firebase,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "firebase" => Ok(BackendKind::Firebase),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Env: `UNIMART_BACKEND` (`memory` | `firebase`)
    /// Default: `memory`
    pub backend: BackendKind,

    /// Env: `UNIMART_API_KEY`. Required for `firebase`.
    pub api_key: Option<String>,

    /// Env: `UNIMART_PROJECT_ID`. Required for `firebase`.
    pub project_id: Option<String>,

    /// Env: `UNIMART_STORAGE_BUCKET`
    /// Default: `{project_id}.appspot.com`
    pub storage_bucket: Option<String>,

    /// Env: `UNIMART_DB_PATH`
    /// Default: the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Env: `UNIMART_POLL_INTERVAL_MS`
    /// Default: 2000
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            api_key: None,
            project_id: None,
            storage_bucket: None,
            db_path: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup, falling back to defaults
    /// for missing or invalid values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(kind) = non_empty("UNIMART_BACKEND") {
            match kind.parse::<BackendKind>() {
                Ok(parsed) => config.backend = parsed,
                Err(e) => tracing::warn!(value = %kind, error = %e, "Invalid UNIMART_BACKEND, using default"),
            }
        }

        config.api_key = non_empty("UNIMART_API_KEY");
        config.project_id = non_empty("UNIMART_PROJECT_ID");
        config.storage_bucket = non_empty("UNIMART_STORAGE_BUCKET");
        config.db_path = non_empty("UNIMART_DB_PATH").map(PathBuf::from);

        if let Some(ms) = non_empty("UNIMART_POLL_INTERVAL_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.poll_interval = Duration::from_millis(ms),
                _ => tracing::warn!(value = %ms, "Invalid UNIMART_POLL_INTERVAL_MS, using default"),
            }
        }

        config
    }

    pub fn firebase(&self) -> Result<FirebaseConfig> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ClientError::Config("UNIMART_API_KEY is not set".into()))?;
        let project_id = self
            .project_id
            .clone()
            .ok_or_else(|| ClientError::Config("UNIMART_PROJECT_ID is not set".into()))?;
        let mut firebase = FirebaseConfig::new(api_key, project_id);
        if let Some(bucket) = &self.storage_bucket {
            firebase = firebase.with_bucket(bucket.clone());
        }
        Ok(firebase)
    }

    pub fn build_backend(&self) -> Result<Arc<dyn Backend>> {
        let backend: Arc<dyn Backend> = match self.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Firebase => Arc::new(FirebaseBackend::new(self.firebase()?)?),
        };
        Ok(backend)
    }

    pub fn open_database(&self) -> Result<Database> {
        Ok(match &self.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        })
    }
}
