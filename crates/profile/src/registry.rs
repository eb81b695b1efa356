use crate::{ProfileError, ProfileStore, SimilarityProfile};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Lazily-loaded, concurrency-safe cache in front of a [`ProfileStore`].
///
/// The first lookup bulk-loads every persisted profile; afterwards reads
/// are served from memory while mutations write through to the store
/// before updating the cache, keeping the store authoritative for the next
/// process. A failed bulk load is retried on the next call rather than
/// poisoning the registry.
pub struct ProfileRegistry {
    store: Arc<dyn ProfileStore>,
    loaded: OnceCell<()>,
    profiles: RwLock<HashMap<String, SimilarityProfile>>,
}

impl ProfileRegistry {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            loaded: OnceCell::new(),
            profiles: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_loaded(&self) -> Result<(), ProfileError> {
        self.loaded
            .get_or_try_init(|| {
                let persisted = self.store.fetch_all()?;
                let mut guard = self
                    .profiles
                    .write()
                    .map_err(|_| ProfileError::store("poisoned lock"))?;
                guard.extend(persisted);
                Ok(())
            })
            .map(|_| ())
    }

    /// Looks up the profile registered for a canonical type.
    ///
    /// An absent type is not an error; the resolver falls back to its
    /// generic query strategy.
    pub fn get(&self, entity_type: &str) -> Result<Option<SimilarityProfile>, ProfileError> {
        self.ensure_loaded()?;
        let guard = self
            .profiles
            .read()
            .map_err(|_| ProfileError::store("poisoned lock"))?;
        Ok(guard.get(entity_type).cloned())
    }

    /// Registers or replaces the profile for a canonical type.
    pub fn put(&self, entity_type: &str, profile: SimilarityProfile) -> Result<(), ProfileError> {
        self.ensure_loaded()?;
        self.store.persist(entity_type, &profile)?;
        self.profiles
            .write()
            .map_err(|_| ProfileError::store("poisoned lock"))?
            .insert(entity_type.to_string(), profile);
        Ok(())
    }

    /// Unregisters the profile for a canonical type.
    pub fn remove(&self, entity_type: &str) -> Result<(), ProfileError> {
        self.ensure_loaded()?;
        self.store.remove(entity_type)?;
        self.profiles
            .write()
            .map_err(|_| ProfileError::store("poisoned lock"))?
            .remove(entity_type);
        Ok(())
    }

    /// Snapshot of every registered profile.
    pub fn all(&self) -> Result<HashMap<String, SimilarityProfile>, ProfileError> {
        self.ensure_loaded()?;
        let guard = self
            .profiles
            .read()
            .map_err(|_| ProfileError::store("poisoned lock"))?;
        Ok(guard.clone())
    }
}
