//! Maps repository configuration to shared adapter instances.
//!
//! A [`RepositoryRegistry`] is built once at startup and handed to whatever
//! needs a repository. It keeps one adapter per cache key, so two parts of
//! an application configured for the same storage key or base URL share
//! the same instance instead of racing each other.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::local::{LocalRepository, DEFAULT_STORAGE_KEY};
use crate::network::{
    ConnectivityWatcher, ErrorCallback, NetworkConfig, NetworkRepository, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
use crate::repository::ProjectRepository;
use crate::store::KeyValueStore;

/// Raised while turning configuration into an adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("Unknown repository backend '{0}' (expected 'local' or 'network')")]
    UnknownBackend(String),

    #[error("Network repository requires a base_url")]
    MissingBaseUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Network,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Network => "network",
        }
    }
}

impl FromStr for BackendKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "network" => Ok(BackendKind::Network),
            _ => Err(FactoryError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend selection plus backend-specific parameters.
///
/// Only the parameters of the selected backend are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// `local` or `network`
    pub backend: String,
    /// Key the local backend stores its collection under.
    pub storage_key: String,
    /// Base address of the network backend.
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local.as_str().to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            base_url: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl RepositoryConfig {
    pub fn local(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            ..Self::default()
        }
    }

    pub fn network(base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Network.as_str().to_string(),
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> Result<BackendKind, FactoryError> {
        self.backend.parse()
    }

    /// Base URL without trailing slashes, if one is set and non-blank.
    fn normalized_base_url(&self) -> Result<String, FactoryError> {
        self.base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .map(String::from)
            .ok_or(FactoryError::MissingBaseUrl)
    }

    /// `kind:discriminating-parameter`, e.g. `local:trvis-projects`.
    pub fn cache_key(&self) -> Result<String, FactoryError> {
        match self.kind()? {
            BackendKind::Local => Ok(format!("local:{}", self.storage_key)),
            BackendKind::Network => Ok(format!("network:{}", self.normalized_base_url()?)),
        }
    }

    pub fn network_config(&self) -> Result<NetworkConfig, FactoryError> {
        Ok(NetworkConfig::new(self.normalized_base_url()?)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_retry_attempts(self.retry_attempts)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms)))
    }
}

/// Builds and caches repository adapters.
pub struct RepositoryRegistry {
    store: Arc<dyn KeyValueStore>,
    watcher: Option<Arc<dyn ConnectivityWatcher>>,
    on_error: Option<ErrorCallback>,
    repositories: Mutex<HashMap<String, Arc<dyn ProjectRepository>>>,
}

impl RepositoryRegistry {
    /// `store` backs every local repository the registry creates.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            watcher: None,
            on_error: None,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    /// Connectivity source attached to network repositories.
    pub fn with_watcher(mut self, watcher: Arc<dyn ConnectivityWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Callback for unrecoverable sync failures of network repositories.
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    fn repositories(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn ProjectRepository>>> {
        self.repositories.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached adapter for `config`, building it on first use.
    /// The caller is responsible for initializing a freshly built adapter.
    pub fn create_repository(
        &self,
        config: &RepositoryConfig,
    ) -> Result<Arc<dyn ProjectRepository>, FactoryError> {
        let key = config.cache_key()?;
        let mut repositories = self.repositories();

        if let Some(existing) = repositories.get(&key) {
            tracing::debug!(key = %key, "Reusing cached repository");
            return Ok(existing.clone());
        }

        let repository = self.build(config)?;
        tracing::debug!(key = %key, "Created repository");
        repositories.insert(key, repository.clone());
        Ok(repository)
    }

    fn build(&self, config: &RepositoryConfig) -> Result<Arc<dyn ProjectRepository>, FactoryError> {
        match config.kind()? {
            BackendKind::Local => Ok(Arc::new(LocalRepository::new(
                self.store.clone(),
                config.storage_key.clone(),
            ))),
            BackendKind::Network => {
                let mut repository = NetworkRepository::new(config.network_config()?);
                if let Some(watcher) = &self.watcher {
                    repository = repository.with_watcher(watcher.clone());
                }
                if let Some(callback) = &self.on_error {
                    repository = repository.with_error_callback(callback.clone());
                }
                Ok(Arc::new(repository))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.repositories().len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories().is_empty()
    }

    /// Closes every cached adapter and forgets it.
    pub async fn clear_repositories(&self) {
        let repositories: Vec<_> = self.repositories().drain().map(|(_, r)| r).collect();
        for repository in repositories {
            repository.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> RepositoryRegistry {
        RepositoryRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_default_config_is_local() {
        let config = RepositoryConfig::default();
        assert_eq!(config.kind().unwrap(), BackendKind::Local);
        assert_eq!(config.cache_key().unwrap(), "local:trvis-projects");
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("Network".parse::<BackendKind>().unwrap(), BackendKind::Network);
        assert_eq!(
            "indexeddb".parse::<BackendKind>().unwrap_err(),
            FactoryError::UnknownBackend("indexeddb".into())
        );
    }

    #[test]
    fn test_network_cache_key_ignores_trailing_slash() {
        let a = RepositoryConfig::network("http://api.test/");
        let b = RepositoryConfig::network("http://api.test");
        assert_eq!(a.cache_key().unwrap(), "network:http://api.test");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_network_config_conversion() {
        let config = RepositoryConfig {
            timeout_ms: 250,
            retry_attempts: 5,
            retry_delay_ms: 10,
            ..RepositoryConfig::network("http://api.test")
        };
        let network = config.network_config().unwrap();
        assert_eq!(network.base_url, "http://api.test");
        assert_eq!(network.timeout, Duration::from_millis(250));
        assert_eq!(network.retry_attempts, 5);
        assert_eq!(network.retry_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_same_key_returns_same_instance() {
        let registry = registry();
        let a = registry
            .create_repository(&RepositoryConfig::local("projects"))
            .unwrap();
        let b = registry
            .create_repository(&RepositoryConfig::local("projects"))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_network_instances_shared_by_base_url() {
        let registry = registry();
        let a = registry
            .create_repository(&RepositoryConfig::network("http://api.test/"))
            .unwrap();
        let b = registry
            .create_repository(&RepositoryConfig {
                retry_attempts: 7,
                ..RepositoryConfig::network("http://api.test")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_keys_return_distinct_instances() {
        let registry = registry();
        let a = registry
            .create_repository(&RepositoryConfig::local("one"))
            .unwrap();
        let b = registry
            .create_repository(&RepositoryConfig::local("two"))
            .unwrap();
        let c = registry
            .create_repository(&RepositoryConfig::network("http://a.test"))
            .unwrap();
        let d = registry
            .create_repository(&RepositoryConfig::network("http://b.test"))
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_unknown_backend_fails() {
        let registry = registry();
        let config = RepositoryConfig {
            backend: "cloud".into(),
            ..RepositoryConfig::default()
        };
        assert_eq!(
            registry.create_repository(&config).err(),
            Some(FactoryError::UnknownBackend("cloud".into()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_network_without_base_url_fails() {
        let registry = registry();
        let config = RepositoryConfig {
            backend: "network".into(),
            base_url: Some("  ".into()),
            ..RepositoryConfig::default()
        };
        assert_eq!(
            registry.create_repository(&config).err(),
            Some(FactoryError::MissingBaseUrl)
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RepositoryConfig =
            serde_json::from_str(r#"{"backend": "network", "base_url": "http://x"}"#).unwrap();
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(config.base_url.as_deref(), Some("http://x"));
    }

    #[tokio::test]
    async fn test_clear_repositories_closes_and_forgets() {
        let registry = registry();
        let config = RepositoryConfig::local("projects");
        let first = registry.create_repository(&config).unwrap();
        first.initialize().await.unwrap();
        assert!(first.is_ready());

        registry.clear_repositories().await;
        assert!(!first.is_ready());
        assert!(registry.is_empty());

        let second = registry.create_repository(&config).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
