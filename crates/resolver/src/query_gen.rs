//! Turns a document plus its similarity profile into a weighted query.

use document::Document;
use profile::{FieldRule, FieldRuleKind, SimilarityProfile};
use search::{Clause, Fuzziness, Query};
use serde_json::Value;

/// Builds the profile-driven query for one document.
///
/// Every scoring property with an active rule contributes one clause;
/// properties without a rule and rules without a property are skipped.
/// `None` means the profile covers nothing the document carries, which
/// the pipeline treats as a hard error rather than guessing.
pub(crate) fn typed_query(document: &Document, profile: &SimilarityProfile) -> Option<Query> {
    let mut query = Query::new();
    for (name, value) in document.scoring_properties() {
        let Some(rule) = profile.rule(name) else {
            continue;
        };
        if !rule.required() {
            continue;
        }
        if let Some(clause) = clause_for_rule(rule, value) {
            query = query.with_clause(clause);
        }
    }
    if query.is_empty() {
        None
    } else {
        Some(query)
    }
}

/// Builds the generic query for documents with no registered profile:
/// one fuzzy text clause per scoring property at unit boost.
pub(crate) fn fallback_query(document: &Document, fuzziness: Fuzziness) -> Option<Query> {
    let mut query = Query::new();
    for (name, value) in document.scoring_properties() {
        if value.is_null() {
            continue;
        }
        query = query.with_clause(Clause::fuzzy(name, text_of(value), fuzziness, 1.0));
    }
    if query.is_empty() {
        None
    } else {
        Some(query)
    }
}

fn clause_for_rule(rule: &FieldRule, value: &Value) -> Option<Clause> {
    if value.is_null() {
        return None;
    }
    if rule.exact_match() {
        return Some(Clause::term(rule.name(), value.clone(), rule.boost()));
    }
    let clause = match rule.kind() {
        FieldRuleKind::Keyword | FieldRuleKind::Boolean => {
            Clause::term(rule.name(), value.clone(), rule.boost())
        }
        FieldRuleKind::Text {
            min_fuzziness,
            max_fuzziness,
        } => {
            let fuzziness = match (min_fuzziness, max_fuzziness) {
                (Some(min), Some(max)) => Fuzziness::Bounded {
                    min: *min,
                    max: *max,
                },
                _ => Fuzziness::Auto,
            };
            Clause::fuzzy(rule.name(), text_of(value), fuzziness, rule.boost())
        }
        FieldRuleKind::Number {
            scale,
            offset,
            decay,
        } => match scale.zip(value.as_f64()) {
            Some((scale, origin)) => Clause::number_decay(
                rule.name(),
                origin,
                scale,
                offset.unwrap_or(0.0),
                decay.unwrap_or(0.5),
                rule.boost(),
            ),
            None => Clause::term(rule.name(), value.clone(), rule.boost()),
        },
        FieldRuleKind::Date { pivot } => {
            let origin = text_of(value);
            match pivot
                .as_deref()
                .and_then(|pivot| Clause::date_proximity(rule.name(), &origin, pivot, rule.boost()))
            {
                Some(clause) => clause,
                // Unreadable dates and missing pivots fall back to text.
                None => Clause::fuzzy(rule.name(), origin, Fuzziness::Auto, rule.boost()),
            }
        }
        FieldRuleKind::Location { pivot } => match pivot
            .as_deref()
            .and_then(|pivot| Clause::geo_proximity(rule.name(), value, pivot, rule.boost()))
        {
            Some(clause) => clause,
            None => Clause::term(rule.name(), value.clone(), rule.boost()),
        },
    };
    Some(clause)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
