use document::Document;
use profile::{ProfileError, SimilarityProfile};
use search::SearchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-call knobs for [`Resolver::resolve`](crate::Resolver::resolve).
///
/// All fields have serde defaults, so an empty JSON object deserializes
/// into the same options as [`ResolveOptions::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Upper bound on returned hits per input document.
    #[serde(default = "ResolveOptions::default_max_results")]
    pub max_results: usize,
    /// Hits below this normalized score are dropped, along with
    /// everything ranked after them.
    #[serde(default)]
    pub min_score: f32,
    /// Lets documents of the same call match each other.
    #[serde(default)]
    pub within_input: bool,
    /// Ad-hoc profile replacing the registered one for every input.
    /// Validated against the target index mapping before anything is
    /// staged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_profile: Option<SimilarityProfile>,
}

impl ResolveOptions {
    pub(crate) fn default_max_results() -> usize {
        10
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_within_input(mut self, within_input: bool) -> Self {
        self.within_input = within_input;
        self
    }

    pub fn with_override(mut self, profile: SimilarityProfile) -> Self {
        self.override_profile = Some(profile);
        self
    }

    /// Parses a JSON profile document into the override slot.
    pub fn with_override_json(mut self, raw: &str) -> Result<Self, ResolveError> {
        let profile = SimilarityProfile::from_json(raw)
            .map_err(|err| ResolveError::MalformedOverride(err.to_string()))?;
        self.override_profile = Some(profile);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.max_results == 0 {
            return Err(ResolveError::InvalidRequest(
                "max_results must be at least 1".to_string(),
            ));
        }
        if self.min_score.is_nan() || self.min_score < 0.0 {
            return Err(ResolveError::InvalidRequest(format!(
                "min_score must be a non-negative number, got {}",
                self.min_score
            )));
        }
        Ok(())
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_results: Self::default_max_results(),
            min_score: 0.0,
            within_input: false,
            override_profile: None,
        }
    }
}

/// One entity the resolver considers similar to an input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHit {
    /// Stored id of the matched entity. For a sibling from the same call
    /// this is the sibling's preserved original id.
    pub id: String,
    /// Score normalized against the input's own top hit, in `(0, 1]`.
    pub score: f32,
    /// Snapshot of the matched document with any staging state removed.
    pub document: Document,
}

/// Similar entities for one input document, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// The input document's preserved original id.
    pub id: String,
    pub hits: Vec<ResolvedHit>,
}

/// Failure modes of a resolution call.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Request options that fail validation.
    #[error("invalid resolve request: {0}")]
    InvalidRequest(String),
    /// An override rule naming a field the target index does not map
    /// compatibly. Reported before any document is staged.
    #[error("override rule `{field}` does not fit the target index: expected a {expected} field")]
    InvalidOverride { field: String, expected: String },
    /// Override text that does not parse as a similarity profile.
    #[error("malformed override profile: {0}")]
    MalformedOverride(String),
    /// The selected profile produced no clauses for a document.
    #[error("no similarity query could be built for document `{id}`")]
    NoQuery { id: String },
    /// Profile registry or store failure.
    #[error(transparent)]
    Profile(#[from] ProfileError),
    /// Search backend failure while staging, querying, or cleaning up.
    #[error(transparent)]
    Backend(#[from] SearchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_default_to_ten_results_and_no_floor() {
        let options = ResolveOptions::new();
        assert_eq!(options.max_results, 10);
        assert_eq!(options.min_score, 0.0);
        assert!(!options.within_input);
        assert!(options.override_profile.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let options: ResolveOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options, ResolveOptions::new());
    }

    #[test]
    fn validate_rejects_zero_results_and_bad_floors() {
        let err = ResolveOptions::new().with_max_results(0).validate();
        assert!(matches!(err, Err(ResolveError::InvalidRequest(_))));

        let err = ResolveOptions::new().with_min_score(-0.5).validate();
        assert!(matches!(err, Err(ResolveError::InvalidRequest(_))));

        let err = ResolveOptions::new().with_min_score(f32::NAN).validate();
        assert!(matches!(err, Err(ResolveError::InvalidRequest(_))));
    }

    #[test]
    fn override_json_is_parsed_or_reported() {
        let options = ResolveOptions::new()
            .with_override_json(r#"{ "rules": [{ "name": "lastName", "type": "text" }] }"#)
            .unwrap();
        let profile = options.override_profile.unwrap();
        assert_eq!(profile.rules().len(), 1);
        assert_eq!(profile.rules()[0].name(), "lastName");

        let err = ResolveOptions::new().with_override_json("{ not json");
        assert!(matches!(err, Err(ResolveError::MalformedOverride(_))));
    }

    #[test]
    fn camel_case_wire_names() {
        let options = ResolveOptions::new()
            .with_max_results(3)
            .with_min_score(0.5)
            .with_within_input(true);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(
            value,
            json!({ "maxResults": 3, "minScore": 0.5, "withinInput": true })
        );
    }
}
