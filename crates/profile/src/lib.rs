//! # Doppel Profile
//!
//! Similarity profiles describe, per canonical entity type, which document
//! properties matter when deciding whether two entities are the same and
//! how each property is compared. A [`SimilarityProfile`] is an ordered
//! list of [`FieldRule`]s plus an optional explicit target index.
//!
//! ## Core Features
//!
//! - **Closed rule taxonomy**: every rule carries one of six field kinds
//!   ([`FieldRuleKind`]); adding a kind means adding one variant and the
//!   match arms that consume it.
//! - **Serde-friendly**: profiles round-trip through camelCase JSON with an
//!   adjacent `type` tag, so a caller-supplied override string is one
//!   [`SimilarityProfile::from_json`] away.
//! - **Pluggable persistence**: the [`ProfileStore`] trait abstracts where
//!   profiles live; [`MemoryProfileStore`] backs tests and demos,
//!   [`JsonFileStore`] keeps a single JSON document on disk.
//! - **Lazy registry**: [`ProfileRegistry`] bulk-loads the store once on
//!   first use and then serves lookups from memory, writing through to the
//!   store on every mutation.

mod registry;
mod rule;
mod store;

pub use registry::ProfileRegistry;
pub use rule::{FieldRule, FieldRuleKind};
pub use store::{JsonFileStore, MemoryProfileStore, ProfileStore};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-type similarity configuration: an optional explicit target index
/// plus an ordered list of field rules.
///
/// Profiles are cheap to clone and serde-friendly so they can be stored,
/// shipped across process boundaries, or supplied ad hoc as overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityProfile {
    /// Index the profile resolves against; `None` falls back to the
    /// resolver's default index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<String>,
    /// Rules in declaration order, keyed by the property they score.
    #[serde(default)]
    rules: Vec<FieldRule>,
}

impl SimilarityProfile {
    /// Creates an empty profile bound to no particular index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a profile from raw JSON, e.g. a caller-supplied override.
    pub fn from_json(raw: &str) -> Result<Self, ProfileError> {
        serde_json::from_str(raw).map_err(|e| ProfileError::Malformed(e.to_string()))
    }

    /// Binds the profile to an explicit target index.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Appends a field rule.
    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The explicit target index, if one is configured.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Looks up the first rule covering the named property.
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.name() == name)
    }
}

/// Errors produced by the profile layer.
#[derive(Debug, Error, Clone)]
pub enum ProfileError {
    /// Raw profile text could not be parsed.
    #[error("malformed similarity profile: {0}")]
    Malformed(String),
    /// The persisted store failed to read or write.
    #[error("profile store error: {0}")]
    Store(String),
}

impl ProfileError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<std::io::Error> for ProfileError {
    fn from(e: std::io::Error) -> Self {
        ProfileError::Store(e.to_string())
    }
}
