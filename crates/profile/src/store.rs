use crate::{ProfileError, SimilarityProfile};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

/// Persisted source of truth for similarity profiles, keyed by canonical
/// entity type.
///
/// The registry bulk-loads through [`fetch_all`](Self::fetch_all) once and
/// writes through on every mutation, so implementations only need simple
/// whole-map reads and per-key writes.
pub trait ProfileStore: Send + Sync {
    /// Load every persisted profile.
    fn fetch_all(&self) -> Result<HashMap<String, SimilarityProfile>, ProfileError>;
    /// Insert or replace the profile for a canonical type.
    fn persist(&self, entity_type: &str, profile: &SimilarityProfile) -> Result<(), ProfileError>;
    /// Remove the profile for a canonical type; absent keys are not an error.
    fn remove(&self, entity_type: &str) -> Result<(), ProfileError>;
}

/// An in-memory store using a `RwLock` around a `HashMap`.
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, SimilarityProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn fetch_all(&self) -> Result<HashMap<String, SimilarityProfile>, ProfileError> {
        let guard = self
            .profiles
            .read()
            .map_err(|_| ProfileError::store("poisoned lock"))?;
        Ok(guard.clone())
    }

    fn persist(&self, entity_type: &str, profile: &SimilarityProfile) -> Result<(), ProfileError> {
        self.profiles
            .write()
            .map_err(|_| ProfileError::store("poisoned lock"))?
            .insert(entity_type.to_string(), profile.clone());
        Ok(())
    }

    fn remove(&self, entity_type: &str) -> Result<(), ProfileError> {
        self.profiles
            .write()
            .map_err(|_| ProfileError::store("poisoned lock"))?
            .remove(entity_type);
        Ok(())
    }
}

/// A file-backed store keeping every profile in one JSON document.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous document intact. Concurrent writers
/// are serialized by an internal lock; the file itself is not locked
/// against other processes.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_guard: RwLock<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: RwLock::new(()),
        }
    }

    /// The path of the backing JSON document.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_document(&self) -> Result<HashMap<String, SimilarityProfile>, ProfileError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(ProfileError::store)
    }

    fn write_document(
        &self,
        profiles: &HashMap<String, SimilarityProfile>,
    ) -> Result<(), ProfileError> {
        let raw = serde_json::to_string_pretty(profiles).map_err(ProfileError::store)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ProfileStore for JsonFileStore {
    fn fetch_all(&self) -> Result<HashMap<String, SimilarityProfile>, ProfileError> {
        let _guard = self
            .write_guard
            .read()
            .map_err(|_| ProfileError::store("poisoned lock"))?;
        self.read_document()
    }

    fn persist(&self, entity_type: &str, profile: &SimilarityProfile) -> Result<(), ProfileError> {
        let _guard = self
            .write_guard
            .write()
            .map_err(|_| ProfileError::store("poisoned lock"))?;
        let mut profiles = self.read_document()?;
        profiles.insert(entity_type.to_string(), profile.clone());
        self.write_document(&profiles)
    }

    fn remove(&self, entity_type: &str) -> Result<(), ProfileError> {
        let _guard = self
            .write_guard
            .write()
            .map_err(|_| ProfileError::store("poisoned lock"))?;
        let mut profiles = self.read_document()?;
        if profiles.remove(entity_type).is_some() {
            self.write_document(&profiles)?;
        }
        Ok(())
    }
}
