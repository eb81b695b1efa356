//! # Doppel
//!
//! Similarity resolution over a full-text search backend: given a
//! document, find which already-indexed entities it most likely
//! duplicates, ranked by a score normalized against the document's own
//! best possible match.
//!
//! The umbrella crate re-exports the workspace layers and wires them
//! together from YAML configuration:
//!
//! - `document`: schemaless JSON documents with reserved identity
//!   properties.
//! - `profile`: per-type similarity profiles, their store, and the
//!   lazily-loaded registry.
//! - `search`: the weighted query model and pluggable search backends.
//! - `resolver`: the staging, querying, ranking, and cleanup engine.
//!
//! ## Example
//!
//! ```
//! use doppel::{Document, FieldRule, FieldRuleKind, ResolveOptions, SearchBackend, SimilarityProfile};
//!
//! let stack = doppel::memory_stack();
//! stack.registry.put(
//!     "Person",
//!     SimilarityProfile::new()
//!         .with_rule(FieldRule::new("firstName", FieldRuleKind::text()))
//!         .with_rule(FieldRule::new("lastName", FieldRuleKind::text()).with_boost(2.0)),
//! )?;
//! stack.backend.bulk_index(
//!     "entities",
//!     &[Document::new()
//!         .with("id", "p-1")
//!         .with("entityType", "Person")
//!         .with("firstName", "John")
//!         .with("lastName", "Smith")],
//! )?;
//!
//! let probe = Document::new()
//!     .with("id", "incoming")
//!     .with("entityType", "Person")
//!     .with("firstName", "Jon")
//!     .with("lastName", "Smith");
//! let resolution = stack.resolver.resolve(&probe, &ResolveOptions::new())?;
//! assert_eq!(resolution.hits[0].id, "p-1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;

pub use config::{ConfigLoadError, DoppelConfig};
pub use document::Document;
pub use profile::{
    FieldRule, FieldRuleKind, JsonFileStore, MemoryProfileStore, ProfileError, ProfileRegistry,
    ProfileStore, SimilarityProfile,
};
pub use resolver::{
    set_resolve_metrics, Resolution, ResolveError, ResolveMetrics, ResolveOptions, ResolvedHit,
    Resolver, ResolverConfig,
};
#[cfg(feature = "backend-http")]
pub use search::HttpBackend;
pub use search::{
    BackendConfig, Clause, FieldKind, Fuzziness, GeoPoint, MemoryBackend, Query, SearchBackend,
    SearchError, SearchHit,
};

use std::sync::Arc;

/// A fully wired resolution stack: the search backend, the profile
/// registry, and the resolver over both.
pub struct ResolutionStack {
    pub backend: Arc<dyn SearchBackend>,
    pub registry: Arc<ProfileRegistry>,
    pub resolver: Arc<Resolver>,
}

/// Builds an entirely in-process stack: in-memory search backend,
/// in-memory profile store, default resolver settings.
pub fn memory_stack() -> ResolutionStack {
    stack_with(
        Arc::new(MemoryBackend::new()),
        Arc::new(MemoryProfileStore::new()),
        ResolverConfig::new(),
    )
}

/// Builds a stack over the given backend, profile store, and resolver
/// settings.
pub fn stack_with(
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn ProfileStore>,
    config: ResolverConfig,
) -> ResolutionStack {
    let registry = Arc::new(ProfileRegistry::new(store));
    let resolver = Arc::new(Resolver::new(backend.clone(), registry.clone(), config));
    ResolutionStack {
        backend,
        registry,
        resolver,
    }
}
