//! Provider API keys.
//!
//! - [`CredentialPersistence`]: where keys live between runs
//! - [`InMemoryCredentialPersistence`]: process-local persistence, used by tests
//! - [`CredentialStore`]: the in-memory view the fetcher reads on every call

use std::collections::HashMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::normalize_provider_id;

/// Backing storage for provider API keys.
///
/// Keys are provider ids (upper-case, e.g. `FINNHUB`). `save_credentials`
/// upserts: entries not named in `updates` are left as they are.
pub trait CredentialPersistence: Send + Sync {
    fn load_credentials(&self) -> Result<HashMap<String, String>, MarketDataError>;

    fn save_credentials(&self, updates: &HashMap<String, String>) -> Result<(), MarketDataError>;
}

/// Credential persistence that lives and dies with the process.
#[derive(Default)]
pub struct InMemoryCredentialPersistence {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl CredentialPersistence for InMemoryCredentialPersistence {
    fn load_credentials(&self) -> Result<HashMap<String, String>, MarketDataError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| MarketDataError::Persistence("credential map poisoned".to_string()))?;
        Ok(entries.clone())
    }

    fn save_credentials(&self, updates: &HashMap<String, String>) -> Result<(), MarketDataError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| MarketDataError::Persistence("credential map poisoned".to_string()))?;
        entries.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

/// In-memory credential map backed by a [`CredentialPersistence`].
pub struct CredentialStore {
    keys: RwLock<HashMap<String, String>>,
    persistence: Box<dyn CredentialPersistence>,
}

impl CredentialStore {
    /// Load the stored keys. Blank stored values are ignored.
    pub fn load(persistence: Box<dyn CredentialPersistence>) -> Result<Self, MarketDataError> {
        let keys: HashMap<String, String> = persistence
            .load_credentials()?
            .into_iter()
            .filter_map(|(provider, key)| {
                let key = key.trim().to_string();
                (!key.is_empty()).then(|| (normalize_provider_id(&provider), key))
            })
            .collect();

        info!("Loaded credentials for {} providers", keys.len());

        Ok(Self {
            keys: RwLock::new(keys),
            persistence,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.keys.read().unwrap_or_else(|poisoned| {
            warn!("Credential store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.keys.write().unwrap_or_else(|poisoned| {
            warn!("Credential store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// API key for a provider, if configured.
    pub fn get(&self, provider: &str) -> Option<String> {
        self.read().get(&normalize_provider_id(provider)).cloned()
    }

    pub fn has(&self, provider: &str) -> bool {
        self.read().contains_key(&normalize_provider_id(provider))
    }

    /// Merge new keys.
    ///
    /// Blank values are dropped. The rest are persisted first and only then
    /// merged into memory, so a persistence failure changes nothing. Returns
    /// the number of keys applied.
    pub fn update(&self, updates: HashMap<String, String>) -> Result<usize, MarketDataError> {
        let updates: HashMap<String, String> = updates
            .into_iter()
            .filter_map(|(provider, key)| {
                let provider = normalize_provider_id(&provider);
                let key = key.trim().to_string();
                if provider.is_empty() || key.is_empty() {
                    debug!("Ignoring blank credential for '{}'", provider);
                    return None;
                }
                Some((provider, key))
            })
            .collect();

        if updates.is_empty() {
            return Ok(0);
        }

        let mut keys = self.write();
        self.persistence.save_credentials(&updates)?;

        let count = updates.len();
        for (provider, key) in updates {
            info!("Updated API key for {}", provider);
            keys.insert(provider, key);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingPersistence;

    impl CredentialPersistence for FailingPersistence {
        fn load_credentials(&self) -> Result<HashMap<String, String>, MarketDataError> {
            Ok(HashMap::from([("finnhub".to_string(), "old".to_string())]))
        }

        fn save_credentials(&self, _: &HashMap<String, String>) -> Result<(), MarketDataError> {
            Err(MarketDataError::Persistence("disk full".to_string()))
        }
    }

    fn store_with(entries: &[(&str, &str)]) -> CredentialStore {
        let entries = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CredentialStore::load(Box::new(InMemoryCredentialPersistence::with_entries(entries)))
            .unwrap()
    }

    #[test]
    fn test_load_normalizes_and_skips_blank() {
        let store = store_with(&[("finnhub", "abc"), ("twelve_data", "  ")]);
        assert_eq!(store.get("FINNHUB").as_deref(), Some("abc"));
        assert!(store.has("finnhub"));
        assert!(!store.has("TWELVE_DATA"));
    }

    #[test]
    fn test_blank_update_keeps_existing_key() {
        let store = store_with(&[("FINNHUB", "abc")]);

        let applied = store
            .update(HashMap::from([("finnhub".to_string(), "".to_string())]))
            .unwrap();

        assert_eq!(applied, 0);
        assert_eq!(store.get("FINNHUB").as_deref(), Some("abc"));
    }

    #[test]
    fn test_update_persists_and_merges() {
        let persistence = InMemoryCredentialPersistence::new();
        let store = CredentialStore::load(Box::new(persistence)).unwrap();

        let applied = store
            .update(HashMap::from([
                ("alpha_vantage".to_string(), " key-1 ".to_string()),
                ("newsapi".to_string(), "key-2".to_string()),
                ("finnhub".to_string(), "   ".to_string()),
            ]))
            .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(store.get("ALPHA_VANTAGE").as_deref(), Some("key-1"));
        assert_eq!(store.get("NEWSAPI").as_deref(), Some("key-2"));
        assert!(!store.has("FINNHUB"));

        let persisted = store.persistence.load_credentials().unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted.get("ALPHA_VANTAGE").map(String::as_str), Some("key-1"));
    }

    #[test]
    fn test_persistence_failure_leaves_memory_unchanged() {
        let store = CredentialStore::load(Box::new(FailingPersistence)).unwrap();

        let result = store.update(HashMap::from([("finnhub".to_string(), "new".to_string())]));

        assert!(matches!(result, Err(MarketDataError::Persistence(_))));
        assert_eq!(store.get("FINNHUB").as_deref(), Some("old"));
    }
}
