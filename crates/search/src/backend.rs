use crate::{score, FieldKind, Query, SearchError, SearchHit};
use document::Document;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for the search engine the resolver stages into and queries.
/// This allows for different engine implementations (e.g., in-memory, HTTP).
///
/// Every operation is a synchronous blocking round-trip; implementations
/// must be safe to share across caller threads.
pub trait SearchBackend: Send + Sync {
    /// Write documents in one batch, visible to searches on return.
    /// Every document must carry an `id` property.
    fn bulk_index(&self, index: &str, docs: &[Document]) -> Result<(), SearchError>;
    /// Run a query and return up to `limit` hits, scored and sorted
    /// descending.
    fn search(&self, index: &str, query: &Query, limit: usize)
        -> Result<Vec<SearchHit>, SearchError>;
    /// Delete one document by id; an absent document is not an error.
    fn delete_by_id(&self, index: &str, id: &str) -> Result<(), SearchError>;
    /// Delete documents carrying the batch marker and return how many
    /// went away. `token` narrows to one batch, `None` sweeps every
    /// marked document; `max_docs` bounds the narrow form.
    fn delete_by_marker(
        &self,
        index: &str,
        token: Option<&str>,
        max_docs: Option<u64>,
    ) -> Result<u64, SearchError>;
    /// Field name to kind for a named index.
    fn mappings(&self, index: &str) -> Result<HashMap<String, FieldKind>, SearchError>;
}

#[derive(Default)]
struct MemoryIndex {
    docs: HashMap<String, Document>,
    mappings: HashMap<String, FieldKind>,
}

impl MemoryIndex {
    /// Dynamic mapping: unseen scalar fields get a kind inferred from
    /// their first value, like the engine does on write.
    fn learn_mappings(&mut self, doc: &Document) {
        for (name, value) in doc.iter() {
            if self.mappings.contains_key(name) {
                continue;
            }
            let kind = match value {
                Value::String(_) => Some(FieldKind::Text),
                Value::Bool(_) => Some(FieldKind::Boolean),
                Value::Number(n) => Some(if n.is_f64() {
                    FieldKind::Double
                } else {
                    FieldKind::Long
                }),
                _ => None,
            };
            if let Some(kind) = kind {
                self.mappings.insert(name.clone(), kind);
            }
        }
    }
}

/// An in-memory backend using a `RwLock` around per-index maps.
///
/// Scoring follows [`crate::score`]; it is not the real engine, but it
/// ranks the way the resolver expects: additive OR clauses, exact terms
/// at full boost, fuzzy and proximity clauses in proportion.
pub struct MemoryBackend {
    indices: RwLock<HashMap<String, MemoryIndex>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
        }
    }

    /// Creates (or re-maps) an index with explicit field mappings, the
    /// way date, geo-point, and keyword fields must be declared up front.
    pub fn create_index(
        &self,
        name: &str,
        mappings: HashMap<String, FieldKind>,
    ) -> Result<(), SearchError> {
        let mut guard = self
            .indices
            .write()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard.entry(name.to_string()).or_default();
        index.mappings.extend(mappings);
        Ok(())
    }

    /// Number of documents currently in an index.
    pub fn doc_count(&self, index: &str) -> Result<usize, SearchError> {
        let guard = self
            .indices
            .read()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;
        Ok(index.docs.len())
    }

    /// Snapshot of every document in an index, in unspecified order.
    pub fn documents(&self, index: &str) -> Result<Vec<Document>, SearchError> {
        let guard = self
            .indices
            .read()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;
        Ok(index.docs.values().cloned().collect())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchBackend for MemoryBackend {
    fn bulk_index(&self, index: &str, docs: &[Document]) -> Result<(), SearchError> {
        // A single write lock is held for the entire batch.
        let mut guard = self
            .indices
            .write()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard.entry(index.to_string()).or_default();
        for doc in docs {
            let id = doc
                .id()
                .ok_or_else(|| SearchError::backend("document missing id"))?;
            index.learn_mappings(doc);
            index.docs.insert(id.to_string(), doc.clone());
        }
        Ok(())
    }

    fn search(
        &self,
        index: &str,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let guard = self
            .indices
            .read()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;

        let mut hits: Vec<SearchHit> = index
            .docs
            .iter()
            .filter_map(|(id, doc)| {
                let score = score::score_document(query, doc);
                if score > 0.0 {
                    Some(SearchHit {
                        id: id.clone(),
                        score,
                        document: doc.clone(),
                    })
                } else {
                    None
                }
            })
            .collect();

        // Sort by score descending; ties break on id for determinism.
        hits.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn delete_by_id(&self, index: &str, id: &str) -> Result<(), SearchError> {
        let mut guard = self
            .indices
            .write()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard
            .get_mut(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;
        index.docs.remove(id);
        Ok(())
    }

    fn delete_by_marker(
        &self,
        index: &str,
        token: Option<&str>,
        max_docs: Option<u64>,
    ) -> Result<u64, SearchError> {
        let mut guard = self
            .indices
            .write()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard
            .get_mut(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;

        let mut ids: Vec<String> = index
            .docs
            .iter()
            .filter(|(_, doc)| match token {
                Some(token) => doc.batch_marker() == Some(token),
                None => doc.batch_marker().is_some(),
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        if let Some(max) = max_docs {
            ids.truncate(max as usize);
        }
        for id in &ids {
            index.docs.remove(id);
        }
        Ok(ids.len() as u64)
    }

    fn mappings(&self, index: &str) -> Result<HashMap<String, FieldKind>, SearchError> {
        let guard = self
            .indices
            .read()
            .map_err(|_| SearchError::backend("poisoned lock"))?;
        let index = guard
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;
        Ok(index.mappings.clone())
    }
}

/// The HTTP backend implementation.
///
/// Speaks the Elasticsearch-compatible REST API; the deployment target
/// the resolver was built for.
#[cfg(feature = "backend-http")]
pub mod http;

#[cfg(feature = "backend-http")]
pub use http::HttpBackend;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clause, Fuzziness};

    fn seeded_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        let docs = vec![
            Document::new()
                .with("id", "a")
                .with("name", "John Smith")
                .with("city", "Berlin"),
            Document::new()
                .with("id", "b")
                .with("name", "Jon Smith")
                .with("city", "Berlin"),
            Document::new()
                .with("id", "c")
                .with("name", "Maria Garcia")
                .with("city", "Madrid"),
        ];
        backend.bulk_index("people", &docs).unwrap();
        backend
    }

    #[test]
    fn search_ranks_exact_above_fuzzy_matches() {
        let backend = seeded_backend();
        let query =
            Query::new().with_clause(Clause::fuzzy("name", "John Smith", Fuzziness::Auto, 1.0));
        let hits = backend.search("people", &query, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn search_breaks_score_ties_on_id() {
        let backend = seeded_backend();
        let query = Query::new().with_clause(Clause::term("city", "Berlin".into(), 1.0));
        let hits = backend.search("people", &query, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn search_truncates_to_the_limit() {
        let backend = seeded_backend();
        let query = Query::new().with_clause(Clause::term("city", "Berlin".into(), 1.0));
        let hits = backend.search("people", &query, 1).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn search_on_a_missing_index_errors() {
        let backend = MemoryBackend::new();
        let query = Query::new().with_clause(Clause::term("x", 1.into(), 1.0));
        let err = backend.search("nowhere", &query, 1).unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(_)));
    }

    #[test]
    fn bulk_index_rejects_documents_without_ids() {
        let backend = MemoryBackend::new();
        let err = backend
            .bulk_index("people", &[Document::new().with("name", "nobody")])
            .unwrap_err();
        assert!(matches!(err, SearchError::Backend(_)));
    }

    #[test]
    fn bulk_index_upserts_by_id() {
        let backend = seeded_backend();
        let replacement = Document::new().with("id", "a").with("name", "Johnny Smith");
        backend.bulk_index("people", &[replacement]).unwrap();
        assert_eq!(backend.doc_count("people").unwrap(), 3);
    }

    #[test]
    fn mappings_are_learned_from_documents() {
        let backend = MemoryBackend::new();
        let doc = Document::new()
            .with("id", "a")
            .with("name", "Ada")
            .with("age", 36)
            .with("score", 1.5)
            .with("active", true);
        backend.bulk_index("people", &[doc]).unwrap();
        let mappings = backend.mappings("people").unwrap();
        assert_eq!(mappings["name"], FieldKind::Text);
        assert_eq!(mappings["age"], FieldKind::Long);
        assert_eq!(mappings["score"], FieldKind::Double);
        assert_eq!(mappings["active"], FieldKind::Boolean);
        // The id property is stored as text too; kinds never change after
        // the first value.
        assert_eq!(mappings["id"], FieldKind::Text);
    }

    #[test]
    fn explicit_mappings_win_over_inference() {
        let backend = MemoryBackend::new();
        backend
            .create_index("people", HashMap::from([("ssn".to_string(), FieldKind::Keyword)]))
            .unwrap();
        backend
            .bulk_index(
                "people",
                &[Document::new().with("id", "a").with("ssn", "123-45-6789")],
            )
            .unwrap();
        assert_eq!(backend.mappings("people").unwrap()["ssn"], FieldKind::Keyword);
    }

    fn marked(id: &str, batch: &str) -> Document {
        let mut doc = Document::new().with("id", id).with("name", "x");
        doc.tag_batch(batch);
        doc
    }

    #[test]
    fn narrow_marker_delete_respects_the_bound() {
        let backend = MemoryBackend::new();
        backend
            .bulk_index(
                "people",
                &[marked("s1", "batch-1"), marked("s2", "batch-1"), marked("s3", "batch-2")],
            )
            .unwrap();

        let deleted = backend
            .delete_by_marker("people", Some("batch-1"), Some(1))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(backend.doc_count("people").unwrap(), 2);
    }

    #[test]
    fn unrestricted_marker_delete_sweeps_every_batch() {
        let backend = MemoryBackend::new();
        backend
            .bulk_index(
                "people",
                &[
                    marked("s1", "batch-1"),
                    marked("s2", "batch-2"),
                    Document::new().with("id", "real").with("name", "kept"),
                ],
            )
            .unwrap();

        let deleted = backend.delete_by_marker("people", None, None).unwrap();
        assert_eq!(deleted, 2);
        let survivors = backend.documents("people").unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id(), Some("real"));
    }

    #[test]
    fn delete_by_id_ignores_absent_documents() {
        let backend = seeded_backend();
        backend.delete_by_id("people", "ghost").unwrap();
        backend.delete_by_id("people", "a").unwrap();
        assert_eq!(backend.doc_count("people").unwrap(), 2);
    }
}
