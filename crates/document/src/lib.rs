//! # Doppel Document
//!
//! Flat property documents shared by every stage of the resolution
//! pipeline. A [`Document`] is an ordered map of property names to JSON
//! values, plus a small set of reserved properties that carry identity
//! and staging state:
//!
//! - [`PROP_ID`]: the caller-visible identity of the entity.
//! - [`PROP_ORIGINAL_ID`]: preserves the caller-supplied id while a
//!   surrogate id is in effect during temporary indexing.
//! - [`PROP_ENTITY_TYPE`]: binds the document to a similarity profile.
//! - [`PROP_BATCH_MARKER`]: tags documents that were indexed as part of
//!   a resolution batch and must be cleaned up afterwards.
//!
//! Reserved properties never participate in similarity scoring; they
//! exist so the pipeline can stage a document next to already-persisted
//! entities and later put its identity back the way the caller sent it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Caller-visible identity property.
pub const PROP_ID: &str = "id";
/// Holds the caller-supplied id while a surrogate id is in effect.
pub const PROP_ORIGINAL_ID: &str = "originalId";
/// Names the similarity profile the document resolves against.
pub const PROP_ENTITY_TYPE: &str = "entityType";
/// Batch tag carried only while a document is temporarily indexed.
pub const PROP_BATCH_MARKER: &str = "resolveBatch";

const RESERVED: [&str; 4] = [PROP_ID, PROP_ORIGINAL_ID, PROP_ENTITY_TYPE, PROP_BATCH_MARKER];

/// A flat entity document: property names mapped to JSON values.
///
/// Insertion order is preserved, so a document round-trips through
/// serialization without reshuffling its properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    properties: Map<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `name` is one of the reserved pipeline properties.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED.contains(&name)
    }

    /// Looks up a property value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Removes a property and returns its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Builder-style variant of [`set`](Self::set) for literal construction.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Number of properties, reserved ones included.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True when the document has no properties at all.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterates over every property in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter()
    }

    /// Iterates over the properties that participate in similarity
    /// scoring, skipping the reserved ones.
    pub fn scoring_properties(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties
            .iter()
            .filter(|(name, _)| !Self::is_reserved(name))
    }

    fn str_prop(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// The caller-visible id, if one is set.
    pub fn id(&self) -> Option<&str> {
        self.str_prop(PROP_ID)
    }

    /// Replaces the caller-visible id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set(PROP_ID, Value::String(id.into()));
    }

    /// The preserved caller-supplied id, present only while staged.
    pub fn original_id(&self) -> Option<&str> {
        self.str_prop(PROP_ORIGINAL_ID)
    }

    /// The entity type used to select a similarity profile.
    pub fn entity_type(&self) -> Option<&str> {
        self.str_prop(PROP_ENTITY_TYPE)
    }

    /// The batch tag, present only while the document is staged.
    pub fn batch_marker(&self) -> Option<&str> {
        self.str_prop(PROP_BATCH_MARKER)
    }

    /// Tags the document as belonging to a resolution batch.
    pub fn tag_batch(&mut self, token: impl Into<String>) {
        self.set(PROP_BATCH_MARKER, Value::String(token.into()));
    }

    /// Swaps the caller-supplied id out for a freshly generated
    /// surrogate id and returns the surrogate.
    ///
    /// The previous id moves into [`PROP_ORIGINAL_ID`]; a document that
    /// never had an id gets a synthesized one preserved there instead,
    /// so restoring always yields a stable identity.
    pub fn assign_surrogate(&mut self) -> String {
        let original = match self.id() {
            Some(id) => id.to_owned(),
            None => Uuid::new_v4().to_string(),
        };
        self.set(PROP_ORIGINAL_ID, Value::String(original));
        let surrogate = Uuid::new_v4().to_string();
        self.set_id(surrogate.clone());
        surrogate
    }

    /// Undoes staging: drops the batch tag and moves the preserved
    /// original id back into [`PROP_ID`].
    ///
    /// Safe to call on documents that were never staged.
    pub fn restore_identity(&mut self) {
        self.remove(PROP_BATCH_MARKER);
        if let Some(original) = self.remove(PROP_ORIGINAL_ID) {
            self.set(PROP_ID, original);
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(properties: Map<String, Value>) -> Self {
        Self { properties }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}
