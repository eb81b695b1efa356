//! The resolution pipeline: stage, query, rank, clean up.

use std::sync::Arc;
use std::time::Instant;

use document::Document;
use profile::{ProfileRegistry, SimilarityProfile};
use search::{Fuzziness, Query, SearchBackend, SearchHit};
use tracing::{debug, warn, Level};
use uuid::Uuid;

use crate::cleanup::CleanupCounter;
use crate::metrics::metrics_recorder;
use crate::query_gen;
use crate::types::{Resolution, ResolveError, ResolveOptions, ResolvedHit};
use crate::validate::validate_profile;

#[cfg(test)]
mod tests;

/// Build-time settings for a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Index used when neither the override nor the registered profile
    /// binds one.
    pub default_index: String,
    /// Resolution calls between unrestricted cleanup sweeps.
    pub sweep_threshold: u32,
    /// Fuzziness of the generic query used for types without a profile.
    pub fallback_fuzziness: Fuzziness,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = index.into();
        self
    }

    pub fn with_sweep_threshold(mut self, sweep_threshold: u32) -> Self {
        self.sweep_threshold = sweep_threshold;
        self
    }

    pub fn with_fallback_fuzziness(mut self, fuzziness: Fuzziness) -> Self {
        self.fallback_fuzziness = fuzziness;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_index: "entities".to_string(),
            sweep_threshold: 20,
            fallback_fuzziness: Fuzziness::Auto,
        }
    }
}

/// A staged input: the surrogate id it lives under in the index, the id
/// it answers to outside, and the tagged copy that was written.
struct StagedDocument {
    surrogate_id: String,
    original_id: String,
    document: Document,
}

/// Resolves which already-indexed entities a document duplicates.
///
/// Inputs are staged into the live index under surrogate ids so the
/// backend scores them with the same statistics as the entities they
/// are compared against, then queried, ranked against their own top
/// score, and cleaned back out. Shareable across threads; each call
/// works under its own batch token.
pub struct Resolver {
    backend: Arc<dyn SearchBackend>,
    registry: Arc<ProfileRegistry>,
    config: ResolverConfig,
    cleanup: CleanupCounter,
}

impl Resolver {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        registry: Arc<ProfileRegistry>,
        config: ResolverConfig,
    ) -> Self {
        let cleanup = CleanupCounter::new(config.sweep_threshold);
        Self {
            backend,
            registry,
            config,
            cleanup,
        }
    }

    /// Resolves one document. See [`Resolver::resolve_all`].
    pub fn resolve(
        &self,
        document: &Document,
        options: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let mut resolutions = self.resolve_all(std::slice::from_ref(document), options)?;
        resolutions
            .pop()
            .ok_or_else(|| ResolveError::InvalidRequest("no document supplied".to_string()))
    }

    /// Resolves a batch of documents in one staging round-trip.
    ///
    /// Results come back in input order, each keyed by the input's
    /// preserved original id. An empty batch is a no-op.
    pub fn resolve_all(
        &self,
        documents: &[Document],
        options: &ResolveOptions,
    ) -> Result<Vec<Resolution>, ResolveError> {
        options.validate()?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let batch_token = Uuid::new_v4().to_string();
        let span = tracing::span!(
            Level::INFO,
            "resolver.resolve",
            batch = %batch_token,
            documents = documents.len(),
        );
        let _enter = span.enter();

        let override_profile = options.override_profile.as_ref();
        let target_index = self.target_index(override_profile, documents)?;
        if let Some(profile) = override_profile {
            let mappings = self.backend.mappings(&target_index)?;
            validate_profile(&mappings, profile)?;
        }

        let staged = self.stage(documents, &target_index, &batch_token)?;
        let outcome = self.resolve_staged(&staged, override_profile, &target_index, options);
        self.run_cleanup(&target_index, &batch_token);

        let elapsed_micros = started.elapsed().as_micros();
        match &outcome {
            Ok(resolutions) => {
                let hits: usize = resolutions.iter().map(|r| r.hits.len()).sum();
                debug!(elapsed_micros, hits, "resolve_success");
                if let Some(recorder) = metrics_recorder() {
                    let entity_type = documents.first().and_then(Document::entity_type);
                    recorder.record_resolve(entity_type, started.elapsed(), documents.len(), hits);
                }
            }
            Err(err) => {
                warn!(error = %err, elapsed_micros, "resolve_failure");
            }
        }
        outcome
    }

    /// Override's explicit index, else the index bound to the first
    /// document's canonical type, else the configured default.
    fn target_index(
        &self,
        override_profile: Option<&SimilarityProfile>,
        documents: &[Document],
    ) -> Result<String, ResolveError> {
        if let Some(index) = override_profile.and_then(SimilarityProfile::index) {
            return Ok(index.to_string());
        }
        if let Some(entity_type) = documents.first().and_then(Document::entity_type) {
            if let Some(profile) = self.registry.get(entity_type)? {
                if let Some(index) = profile.index() {
                    return Ok(index.to_string());
                }
            }
        }
        Ok(self.config.default_index.clone())
    }

    /// Copies every input into the index under a fresh surrogate id,
    /// original ids preserved, all tagged with this call's batch token.
    fn stage(
        &self,
        documents: &[Document],
        index: &str,
        batch_token: &str,
    ) -> Result<Vec<StagedDocument>, ResolveError> {
        let mut staged = Vec::with_capacity(documents.len());
        for original in documents {
            let mut document = original.clone();
            let surrogate_id = document.assign_surrogate();
            document.tag_batch(batch_token);
            let original_id = document.original_id().unwrap_or_default().to_string();
            staged.push(StagedDocument {
                surrogate_id,
                original_id,
                document,
            });
        }
        let copies: Vec<Document> = staged.iter().map(|s| s.document.clone()).collect();
        self.backend.bulk_index(index, &copies)?;
        Ok(staged)
    }

    fn resolve_staged(
        &self,
        staged: &[StagedDocument],
        override_profile: Option<&SimilarityProfile>,
        index: &str,
        options: &ResolveOptions,
    ) -> Result<Vec<Resolution>, ResolveError> {
        let mut resolutions = Vec::with_capacity(staged.len());
        for entry in staged {
            let query = self
                .query_for(&entry.document, override_profile)?
                .ok_or_else(|| ResolveError::NoQuery {
                    id: entry.original_id.clone(),
                })?;
            // One extra slot, since the input's own surrogate is a hit too.
            let hits = self.backend.search(index, &query, options.max_results + 1)?;
            let hits = self.rank_hits(entry, hits, options);
            resolutions.push(Resolution {
                id: entry.original_id.clone(),
                hits,
            });
        }
        Ok(resolutions)
    }

    /// Validated override, else the profile registered for the
    /// document's canonical type, else the generic fallback.
    fn query_for(
        &self,
        document: &Document,
        override_profile: Option<&SimilarityProfile>,
    ) -> Result<Option<Query>, ResolveError> {
        if let Some(profile) = override_profile {
            return Ok(query_gen::typed_query(document, profile));
        }
        if let Some(entity_type) = document.entity_type() {
            if let Some(profile) = self.registry.get(entity_type)? {
                return Ok(query_gen::typed_query(document, &profile));
            }
        }
        Ok(query_gen::fallback_query(
            document,
            self.config.fallback_fuzziness,
        ))
    }

    /// Self-relative ranking: the input's surrogate is expected on top
    /// and anchors the scale; every other hit is emitted with its score
    /// divided by that top score, staging state stripped.
    fn rank_hits(
        &self,
        entry: &StagedDocument,
        hits: Vec<SearchHit>,
        options: &ResolveOptions,
    ) -> Vec<ResolvedHit> {
        let Some(top) = hits.first() else {
            debug!(id = %entry.original_id, "no_hits");
            return Vec::new();
        };
        if top.id != entry.surrogate_id {
            // A tied candidate can outrank the surrogate; its normalized
            // score is then 1.0, which is still correct.
            warn!(id = %entry.original_id, top_id = %top.id, "surrogate_not_top");
        }
        let top_score = top.score;
        if top_score <= 0.0 {
            debug!(id = %entry.original_id, top_score, "top_score_not_positive");
            return Vec::new();
        }

        let batch_token = entry.document.batch_marker();
        let mut ranked = Vec::new();
        for hit in &hits {
            if hit.id == entry.surrogate_id {
                continue;
            }
            let same_batch = batch_token.is_some() && hit.document.batch_marker() == batch_token;
            if same_batch && !options.within_input {
                continue;
            }
            let score = hit.score / top_score;
            if score < options.min_score {
                break;
            }
            let mut snapshot = hit.document.clone();
            snapshot.restore_identity();
            let id = snapshot.id().unwrap_or(hit.id.as_str()).to_string();
            ranked.push(ResolvedHit {
                id,
                score,
                document: snapshot,
            });
            if ranked.len() == options.max_results {
                break;
            }
        }
        ranked
    }

    /// Amortized cleanup: each call deletes at most one of its own
    /// staged documents, and every sweep-threshold calls one call
    /// deletes everything still carrying a batch marker. A failed
    /// delete forces the next call to sweep.
    fn run_cleanup(&self, index: &str, batch_token: &str) {
        let sweep = self.cleanup.note_call();
        let outcome = if sweep {
            self.backend.delete_by_marker(index, None, None)
        } else {
            self.backend.delete_by_marker(index, Some(batch_token), Some(1))
        };
        match outcome {
            Ok(deleted) => {
                debug!(deleted, sweep, "cleanup_complete");
                if let Some(recorder) = metrics_recorder() {
                    recorder.record_cleanup(sweep, deleted);
                }
            }
            Err(err) => {
                warn!(error = %err, sweep, "cleanup_failure");
                self.cleanup.force_sweep();
            }
        }
    }
}
