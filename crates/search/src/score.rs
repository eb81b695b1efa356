//! In-process scoring for [`MemoryBackend`](crate::MemoryBackend).
//!
//! Mirrors the engine semantics the resolver relies on: clause scores are
//! additive, a term clause is worth its boost, a fuzzy clause averages
//! per-token edit similarity, and the proximity clauses decay with
//! distance from the origin (half score at one pivot away).

use crate::query::{Clause, Fuzziness, GeoPoint, Query};
use chrono::{DateTime, NaiveDate};
use document::Document;
use serde_json::Value;

/// Total additive score of `doc` against every clause in `query`.
pub(crate) fn score_document(query: &Query, doc: &Document) -> f32 {
    query
        .clauses()
        .iter()
        .map(|clause| clause_score(clause, doc))
        .sum()
}

fn property<'a>(doc: &'a Document, field: &str) -> Option<&'a Value> {
    doc.get(field).filter(|v| !v.is_null())
}

fn clause_score(clause: &Clause, doc: &Document) -> f32 {
    match clause {
        Clause::Term { field, value, boost } => {
            let matched = property(doc, field).is_some_and(|v| values_equal(v, value));
            if matched {
                *boost
            } else {
                0.0
            }
        }
        Clause::Fuzzy {
            field,
            text,
            fuzziness,
            boost,
        } => property(doc, field)
            .map(|v| fuzzy_text_score(text, &text_of(v), *fuzziness) * boost)
            .unwrap_or(0.0),
        Clause::NumberDecay {
            field,
            origin,
            scale,
            offset,
            decay,
            boost,
        } => property(doc, field)
            .and_then(Value::as_f64)
            .map(|v| decay_score((v - origin).abs(), *scale, *offset, *decay) as f32 * boost)
            .unwrap_or(0.0),
        Clause::DateProximity {
            field,
            origin,
            pivot,
            boost,
        } => {
            let score = property(doc, field)
                .map(text_of)
                .and_then(|raw| parse_datetime_ms(&raw))
                .zip(parse_datetime_ms(origin))
                .zip(parse_duration_ms(pivot))
                .map(|((candidate, origin), pivot)| {
                    decay_score((candidate - origin).abs(), pivot, 0.0, 0.5)
                });
            score.map(|s| s as f32 * boost).unwrap_or(0.0)
        }
        Clause::GeoProximity {
            field,
            origin,
            pivot,
            boost,
        } => {
            let score = property(doc, field)
                .and_then(GeoPoint::from_value)
                .zip(parse_distance_meters(pivot))
                .map(|(candidate, pivot)| {
                    decay_score(haversine_meters(*origin, candidate), pivot, 0.0, 0.5)
                });
            score.map(|s| s as f32 * boost).unwrap_or(0.0)
        }
    }
}

/// Scalar equality with numeric coercion, so `42` matches `42.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Average per-token similarity of `query` against `candidate`.
///
/// Each query token takes the best similarity over the candidate tokens,
/// where similarity is `1 - edits/len` when the edit distance fits the
/// fuzziness budget and zero otherwise. Identical texts score 1.0.
pub(crate) fn fuzzy_text_score(query: &str, candidate: &str, fuzziness: Fuzziness) -> f32 {
    let query_tokens = tokenize(query);
    let candidate_tokens = tokenize(candidate);
    if query_tokens.is_empty() || candidate_tokens.is_empty() {
        return 0.0;
    }

    let mut total = 0.0f32;
    for q in &query_tokens {
        let budget = fuzziness.allowed_edits(q.chars().count());
        let mut best = 0.0f32;
        for c in &candidate_tokens {
            let edits = levenshtein(q, c);
            if edits as u32 <= budget {
                let len = q.chars().count().max(c.chars().count()).max(1);
                best = best.max(1.0 - edits as f32 / len as f32);
            }
        }
        total += best;
    }
    total / query_tokens.len() as f32
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Classic two-row edit distance over characters.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Decay over distance: 1.0 within `offset` of the origin, `decay` of
/// full score at `offset + scale`, exponential in between and beyond.
pub(crate) fn decay_score(distance: f64, scale: f64, offset: f64, decay: f64) -> f64 {
    let effective = (distance - offset).max(0.0);
    if effective == 0.0 {
        return 1.0;
    }
    if scale <= 0.0 || !(0.0..1.0).contains(&decay) {
        return 0.0;
    }
    decay.powf(effective / scale)
}

/// Epoch milliseconds from an RFC 3339 timestamp or a plain `YYYY-MM-DD`.
pub(crate) fn parse_datetime_ms(raw: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis() as f64);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(midnight.and_utc().timestamp_millis() as f64)
}

/// Milliseconds from a duration such as `30d`, `12h`, or `500ms`.
pub(crate) fn parse_duration_ms(raw: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 6] = [
        ("ms", 1.0),
        ("s", 1_000.0),
        ("m", 60_000.0),
        ("h", 3_600_000.0),
        ("d", 86_400_000.0),
        ("w", 604_800_000.0),
    ];
    let raw = raw.trim();
    for (suffix, factor) in UNITS {
        if let Some(number) = raw.strip_suffix(suffix) {
            return number
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| *n > 0.0)
                .map(|n| n * factor);
        }
    }
    None
}

/// Meters from a distance such as `2km`, `500m`, or `1mi`; a bare number
/// is taken as meters.
pub(crate) fn parse_distance_meters(raw: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 3] = [("km", 1_000.0), ("mi", 1_609.344), ("m", 1.0)];
    let raw = raw.trim();
    for (suffix, factor) in UNITS {
        if let Some(number) = raw.strip_suffix(suffix) {
            return number
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| *n > 0.0)
                .map(|n| n * factor);
        }
    }
    raw.parse::<f64>().ok().filter(|n| *n > 0.0)
}

/// Great-circle distance in meters.
pub(crate) fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let half = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * half.sqrt().asin()
}
