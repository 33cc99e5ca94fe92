//! Backend factory for the row store and SMS provider.
//!
//! ```text
//! BackendFactory
//!   ├── create_store() → Arc<dyn RemoteStore>      (memory | supabase)
//!   └── create_sms()   → Option<Arc<dyn SmsProvider>> (mock | twilio)
//! ```
//!
//! The SMS provider degrades to `None` when its credentials are missing so
//! the rest of the app keeps working; alerts then report "not configured".

use crate::config::{HavenConfig, StoreBackend};
use crate::messaging::{SmsProvider, provider_from_config};
use crate::storage::{MemoryStore, RemoteStore, SupabaseStore};
use crate::{Error, Result};
use std::sync::Arc;

/// Builds backends from configuration.
pub struct BackendFactory;

impl BackendFactory {
    /// Creates the configured row store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when Supabase is selected without a
    /// URL or anon key.
    pub fn create_store(config: &HavenConfig) -> Result<Arc<dyn RemoteStore>> {
        match config.store.backend {
            StoreBackend::Memory => {
                tracing::debug!("Using in-memory row store");
                Ok(Arc::new(MemoryStore::new()))
            },
            StoreBackend::Supabase => {
                let url = config
                    .store
                    .url
                    .clone()
                    .ok_or_else(|| Error::NotConfigured("store.url".to_string()))?;
                let key = config
                    .store
                    .anon_key
                    .clone()
                    .ok_or_else(|| Error::NotConfigured("store.anon_key".to_string()))?;
                let mut store = SupabaseStore::new(url.clone(), key);
                if let Some(token) = config.store.access_token.clone() {
                    store = store.with_access_token(token);
                }
                tracing::debug!(url = %url, "Using Supabase row store");
                Ok(Arc::new(store))
            },
        }
    }

    /// Creates the configured SMS provider, if usable.
    #[must_use]
    pub fn create_sms(config: &HavenConfig) -> Option<Arc<dyn SmsProvider>> {
        provider_from_config(&config.messaging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_by_default() {
        let store = BackendFactory::create_store(&HavenConfig::default()).expect("store");
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_supabase_requires_url() {
        let config = HavenConfig::default().with_store_backend(StoreBackend::Supabase);
        let result = BackendFactory::create_store(&config);
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }
}
