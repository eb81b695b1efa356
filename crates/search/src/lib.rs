//! # Doppel Search
//!
//! Backend-agnostic search layer for entity resolution. The resolver
//! stages candidate documents into an index, runs weighted similarity
//! queries, and cleans staged documents back out; this crate provides the
//! pieces it does that with:
//!
//! - **Pluggable backends** through the [`SearchBackend`] trait. Out of
//!   the box:
//!   - [`MemoryBackend`], an in-process index with scoring semantics
//!     faithful enough for tests and demos.
//!   - [`HttpBackend`] (behind the default `backend-http` feature),
//!     speaking the Elasticsearch-compatible REST API over
//!     `reqwest::blocking`.
//! - **A small query model** ([`Query`], [`Clause`]) covering exact
//!   terms, fuzzy text, and numeric/date/geo proximity, with additive OR
//!   combination and per-clause boosts. Queries render themselves into
//!   the engine's JSON query DSL.
//! - **Field mappings** ([`FieldKind`]) so callers can check a similarity
//!   configuration against what an index actually stores before using it.
//!
//! ## Example
//!
//! ```
//! use document::Document;
//! use search::{BackendConfig, Clause, Query};
//!
//! let backend = BackendConfig::memory().build().unwrap();
//! let ada = Document::new().with("id", "a").with("name", "Ada");
//! backend.bulk_index("people", &[ada]).unwrap();
//!
//! let query = Query::new().with_clause(Clause::term("name", "Ada".into(), 1.0));
//! let hits = backend.search("people", &query, 10).unwrap();
//! assert_eq!(hits[0].id, "a");
//! ```

mod backend;
mod query;
mod score;

#[cfg(feature = "backend-http")]
pub use backend::HttpBackend;
pub use backend::{MemoryBackend, SearchBackend};
pub use query::{Clause, Fuzziness, GeoPoint, Query};

use document::Document;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Field kind stored in an index mapping, named after the engine's types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Keyword,
    Boolean,
    Date,
    GeoPoint,
    Integer,
    Long,
    Float,
    Double,
}

impl FieldKind {
    /// True for the four numeric kinds.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKind::Integer | FieldKind::Long | FieldKind::Float | FieldKind::Double
        )
    }

    /// The engine-side type name, e.g. `geo_point`.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::GeoPoint => "geo_point",
            FieldKind::Integer => "integer",
            FieldKind::Long => "long",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
        }
    }
}

/// One ranked result from a search: backend id, raw relevance score, and
/// the stored source document.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub document: Document,
}

/// Configuration for selecting and building a backend.
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// Speak the Elasticsearch-compatible REST API at `url`.
    ///
    /// Requires the `backend-http` feature (enabled by default).
    Http { url: String, timeout_secs: u64 },
    /// Keep everything in process memory. This is useful for testing.
    #[default]
    Memory,
}

impl BackendConfig {
    /// Create an in-memory backend configuration.
    pub fn memory() -> Self {
        BackendConfig::Memory
    }

    /// Create an HTTP backend configuration with the default timeout.
    pub fn http<U: Into<String>>(url: U) -> Self {
        BackendConfig::Http {
            url: url.into(),
            timeout_secs: 30,
        }
    }

    /// Build the backend based on the configuration.
    pub fn build(&self) -> Result<Arc<dyn SearchBackend>, SearchError> {
        match self {
            BackendConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendConfig::Http { url, timeout_secs } => {
                #[cfg(feature = "backend-http")]
                {
                    Ok(Arc::new(HttpBackend::new(url, *timeout_secs)?))
                }
                #[cfg(not(feature = "backend-http"))]
                {
                    let _ = (url, timeout_secs);
                    Err(SearchError::backend("http backend disabled at compile time"))
                }
            }
        }
    }
}

/// Errors produced by the search layer.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// The named index does not exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),
    /// The backend rejected or failed an operation.
    #[error("backend error: {0}")]
    Backend(String),
    /// The backend answered with something unintelligible.
    #[error("malformed backend response: {0}")]
    Response(String),
}

impl SearchError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn response<E: std::fmt::Display>(err: E) -> Self {
        Self::Response(err.to_string())
    }
}
