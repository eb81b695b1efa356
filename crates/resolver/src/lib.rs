//! Similarity resolution over a search backend.
//!
//! The [`Resolver`] answers one question: which already-indexed entities
//! does a given document most resemble? It stages the inputs into the
//! live index under surrogate ids so the index itself scores them,
//! queries per input with profile-driven clauses, normalizes every
//! score against the input's own top hit, and cleans the staged
//! documents back out.
//!
//! ```
//! use document::Document;
//! use profile::{FieldRule, FieldRuleKind, MemoryProfileStore, ProfileRegistry, SimilarityProfile};
//! use resolver::{Resolver, ResolverConfig, ResolveOptions};
//! use search::{MemoryBackend, SearchBackend};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let registry = Arc::new(ProfileRegistry::new(Arc::new(MemoryProfileStore::new())));
//! registry.put(
//!     "person",
//!     SimilarityProfile::new().with_rule(FieldRule::new("name", FieldRuleKind::text())),
//! )?;
//!
//! backend.bulk_index(
//!     "entities",
//!     &[Document::new().with("id", "p-1").with("name", "Ada Lovelace")],
//! )?;
//!
//! let resolver = Resolver::new(backend, registry, ResolverConfig::new());
//! let candidate = Document::new()
//!     .with("id", "incoming")
//!     .with("entityType", "person")
//!     .with("name", "Ada Lovelace");
//! let resolution = resolver.resolve(&candidate, &ResolveOptions::new())?;
//! assert_eq!(resolution.hits[0].id, "p-1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod metrics;
pub mod types;

mod cleanup;
mod query_gen;
mod validate;

pub use engine::{Resolver, ResolverConfig};
pub use metrics::{set_resolve_metrics, ResolveMetrics};
pub use types::{Resolution, ResolveError, ResolveOptions, ResolvedHit};
