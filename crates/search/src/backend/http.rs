use crate::{FieldKind, Query, SearchBackend, SearchError, SearchHit};
use document::{Document, PROP_BATCH_MARKER};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Blocking client for an Elasticsearch-compatible REST API.
///
/// Uses `_bulk?refresh=true` so staged documents are searchable on
/// return, `_search` with the rendered query DSL, `_delete_by_query` for
/// marker cleanup, and `_mapping` for validation. All requests share one
/// client with a request timeout; there is no retry layer.
pub struct HttpBackend {
    base: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    /// Builds a backend for the cluster at `url`.
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, SearchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(SearchError::backend)?;
        Ok(Self {
            base: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn check(
        index: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SearchError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SearchError::IndexNotFound(index.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SearchError::Backend(format!("status {status}: {body}")));
        }
        Ok(response)
    }

    /// Newline-delimited `_bulk` payload: one action line and one source
    /// line per document.
    fn bulk_body(index: &str, docs: &[Document]) -> Result<String, SearchError> {
        let mut body = String::new();
        for doc in docs {
            let id = doc
                .id()
                .ok_or_else(|| SearchError::backend("document missing id"))?;
            let action = json!({ "index": { "_index": index, "_id": id } });
            body.push_str(&action.to_string());
            body.push('\n');
            let source = serde_json::to_string(doc).map_err(SearchError::response)?;
            body.push_str(&source);
            body.push('\n');
        }
        Ok(body)
    }

    /// Delete-by-query body for one batch token, or for every marked
    /// document when `token` is `None`.
    ///
    /// The narrow form matches on the marker's keyword subfield so the
    /// full token compares exactly even under the default text mapping.
    fn marker_query(token: Option<&str>) -> Value {
        match token {
            Some(token) => {
                let marker_field = format!("{PROP_BATCH_MARKER}.keyword");
                json!({ "query": { "term": { marker_field: token } } })
            }
            None => json!({ "query": { "exists": { "field": PROP_BATCH_MARKER } } }),
        }
    }

    fn parse_hits(payload: &Value) -> Result<Vec<SearchHit>, SearchError> {
        let hits = payload["hits"]["hits"]
            .as_array()
            .ok_or_else(|| SearchError::response("search answer without hits"))?;
        hits.iter()
            .map(|hit| {
                let id = hit["_id"]
                    .as_str()
                    .ok_or_else(|| SearchError::response("hit without _id"))?
                    .to_string();
                let score = hit["_score"].as_f64().unwrap_or(0.0) as f32;
                let document: Document =
                    serde_json::from_value(hit["_source"].clone()).map_err(SearchError::response)?;
                Ok(SearchHit {
                    id,
                    score,
                    document,
                })
            })
            .collect()
    }

    fn parse_mappings(payload: &Value) -> HashMap<String, FieldKind> {
        let properties = payload
            .as_object()
            .and_then(|entries| entries.values().next())
            .and_then(|entry| entry.get("mappings"))
            .and_then(|mappings| mappings.get("properties"))
            .and_then(Value::as_object);

        let mut mappings = HashMap::new();
        if let Some(properties) = properties {
            for (name, spec) in properties {
                let kind = spec
                    .get("type")
                    .and_then(|t| serde_json::from_value::<FieldKind>(t.clone()).ok());
                // Unknown engine types stay out of the map; the validator
                // treats them as unmapped.
                if let Some(kind) = kind {
                    mappings.insert(name.clone(), kind);
                }
            }
        }
        mappings
    }
}

impl SearchBackend for HttpBackend {
    fn bulk_index(&self, index: &str, docs: &[Document]) -> Result<(), SearchError> {
        if docs.is_empty() {
            return Ok(());
        }
        let body = Self::bulk_body(index, docs)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.base))
            .query(&[("refresh", "true")])
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .map_err(SearchError::backend)?;
        let payload: Value = Self::check(index, response)?
            .json()
            .map_err(SearchError::response)?;

        if payload["errors"].as_bool().unwrap_or(false) {
            let reason = payload["items"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|item| item["index"]["error"]["reason"].as_str())
                .next()
                .unwrap_or("bulk indexing reported errors")
                .to_string();
            return Err(SearchError::Backend(reason));
        }
        Ok(())
    }

    fn search(
        &self,
        index: &str,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let body = json!({ "size": limit, "query": query.to_query_dsl() });
        let response = self
            .client
            .post(format!("{}/{}/_search", self.base, index))
            .json(&body)
            .send()
            .map_err(SearchError::backend)?;
        let payload: Value = Self::check(index, response)?
            .json()
            .map_err(SearchError::response)?;
        Self::parse_hits(&payload)
    }

    fn delete_by_id(&self, index: &str, id: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(format!("{}/{}/_doc/{}", self.base, index, id))
            .query(&[("refresh", "true")])
            .send()
            .map_err(SearchError::backend)?;
        // Deleting an already-gone document answers 404; that is fine.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(index, response)?;
        Ok(())
    }

    fn delete_by_marker(
        &self,
        index: &str,
        token: Option<&str>,
        max_docs: Option<u64>,
    ) -> Result<u64, SearchError> {
        let mut request = self
            .client
            .post(format!("{}/{}/_delete_by_query", self.base, index))
            .query(&[("refresh", "true")])
            .json(&Self::marker_query(token));
        if let Some(max) = max_docs {
            request = request.query(&[("max_docs", max.to_string())]);
        }
        let response = request.send().map_err(SearchError::backend)?;
        let payload: Value = Self::check(index, response)?
            .json()
            .map_err(SearchError::response)?;
        payload["deleted"]
            .as_u64()
            .ok_or_else(|| SearchError::response("delete answer without count"))
    }

    fn mappings(&self, index: &str) -> Result<HashMap<String, FieldKind>, SearchError> {
        let response = self
            .client
            .get(format!("{}/{}/_mapping", self.base, index))
            .send()
            .map_err(SearchError::backend)?;
        let payload: Value = Self::check(index, response)?
            .json()
            .map_err(SearchError::response)?;
        Ok(Self::parse_mappings(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_body_pairs_action_and_source_lines() {
        let docs = vec![
            Document::new().with("id", "a").with("name", "Ada"),
            Document::new().with("id", "b").with("name", "Grace"),
        ];
        let body = HttpBackend::bulk_body("people", &docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "people");
        assert_eq!(action["index"]["_id"], "a");
        let source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["name"], "Ada");
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn bulk_body_requires_ids() {
        let err = HttpBackend::bulk_body("people", &[Document::new()]).unwrap_err();
        assert!(matches!(err, SearchError::Backend(_)));
    }

    #[test]
    fn marker_query_narrows_or_sweeps() {
        let narrow = HttpBackend::marker_query(Some("batch-1"));
        assert_eq!(
            narrow["query"]["term"][format!("{PROP_BATCH_MARKER}.keyword")],
            "batch-1"
        );
        let sweep = HttpBackend::marker_query(None);
        assert_eq!(sweep["query"]["exists"]["field"], PROP_BATCH_MARKER);
    }

    #[test]
    fn hits_parse_ids_scores_and_sources() {
        let payload = json!({
            "hits": { "hits": [
                { "_id": "a", "_score": 2.5, "_source": { "id": "a", "name": "Ada" } },
                { "_id": "b", "_score": null, "_source": { "id": "b" } },
            ]}
        });
        let hits = HttpBackend::parse_hits(&payload).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].score, 2.5);
        assert_eq!(hits[0].document.get("name"), Some(&json!("Ada")));
        assert_eq!(hits[1].score, 0.0);

        let err = HttpBackend::parse_hits(&json!({ "took": 3 })).unwrap_err();
        assert!(matches!(err, SearchError::Response(_)));
    }

    #[test]
    fn mappings_parse_known_kinds_and_skip_the_rest() {
        let payload = json!({
            "people-000001": { "mappings": { "properties": {
                "name": { "type": "text" },
                "ssn": { "type": "keyword" },
                "home": { "type": "geo_point" },
                "age": { "type": "integer" },
                "blob": { "type": "nested" },
                "group": { "properties": {} },
            }}}
        });
        let mappings = HttpBackend::parse_mappings(&payload);
        assert_eq!(mappings.len(), 4);
        assert_eq!(mappings["home"], FieldKind::GeoPoint);
        assert!(!mappings.contains_key("blob"));
        assert!(!mappings.contains_key("group"));
    }
}
