//! Checks an override profile against the live index mapping.

use profile::{FieldRuleKind, SimilarityProfile};
use search::FieldKind;
use std::collections::HashMap;

use crate::types::ResolveError;

/// Mapping kinds a rule kind may legally target.
fn compatible_kinds(kind: &FieldRuleKind) -> &'static [FieldKind] {
    match kind {
        FieldRuleKind::Keyword => &[FieldKind::Keyword],
        FieldRuleKind::Text { .. } => &[FieldKind::Text],
        FieldRuleKind::Boolean => &[FieldKind::Boolean],
        FieldRuleKind::Date { .. } => &[FieldKind::Date],
        FieldRuleKind::Location { .. } => &[FieldKind::GeoPoint],
        FieldRuleKind::Number { .. } => &[
            FieldKind::Integer,
            FieldKind::Long,
            FieldKind::Float,
            FieldKind::Double,
        ],
    }
}

fn expected_label(kind: &FieldRuleKind) -> String {
    match kind {
        FieldRuleKind::Number { .. } => "numeric (integer, long, float or double)".to_string(),
        FieldRuleKind::Location { .. } => FieldKind::GeoPoint.label().to_string(),
        other => other.label().to_string(),
    }
}

/// Rejects the profile unless every rule names a mapped field of a
/// compatible kind. Runs before any staging write so a bad override
/// leaves the index untouched.
pub(crate) fn validate_profile(
    mappings: &HashMap<String, FieldKind>,
    profile: &SimilarityProfile,
) -> Result<(), ResolveError> {
    for rule in profile.rules() {
        let compatible = mappings
            .get(rule.name())
            .is_some_and(|actual| compatible_kinds(rule.kind()).contains(actual));
        if !compatible {
            return Err(ResolveError::InvalidOverride {
                field: rule.name().to_string(),
                expected: expected_label(rule.kind()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile::FieldRule;

    fn person_mappings() -> HashMap<String, FieldKind> {
        HashMap::from([
            ("firstName".to_string(), FieldKind::Text),
            ("ssn".to_string(), FieldKind::Keyword),
            ("age".to_string(), FieldKind::Integer),
            ("balance".to_string(), FieldKind::Double),
            ("dob".to_string(), FieldKind::Date),
            ("home".to_string(), FieldKind::GeoPoint),
            ("active".to_string(), FieldKind::Boolean),
        ])
    }

    #[test]
    fn compatible_rules_pass() {
        let profile = SimilarityProfile::new()
            .with_rule(FieldRule::new("firstName", FieldRuleKind::text()))
            .with_rule(FieldRule::new("ssn", FieldRuleKind::Keyword))
            .with_rule(FieldRule::new("age", FieldRuleKind::number()))
            .with_rule(FieldRule::new("balance", FieldRuleKind::number()))
            .with_rule(FieldRule::new("dob", FieldRuleKind::date_proximity("30d")))
            .with_rule(FieldRule::new("home", FieldRuleKind::location()))
            .with_rule(FieldRule::new("active", FieldRuleKind::Boolean));
        assert!(validate_profile(&person_mappings(), &profile).is_ok());
    }

    #[test]
    fn unmapped_fields_are_rejected() {
        let profile =
            SimilarityProfile::new().with_rule(FieldRule::new("nickname", FieldRuleKind::text()));
        let err = validate_profile(&person_mappings(), &profile).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidOverride { field, expected }
                if field == "nickname" && expected == "text"
        ));
    }

    #[test]
    fn kind_mismatches_are_rejected() {
        // `ssn` is mapped keyword, not text.
        let profile =
            SimilarityProfile::new().with_rule(FieldRule::new("ssn", FieldRuleKind::text()));
        let err = validate_profile(&person_mappings(), &profile).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidOverride { field, .. } if field == "ssn"));

        // A number rule on a text field names all the numeric kinds.
        let profile =
            SimilarityProfile::new().with_rule(FieldRule::new("firstName", FieldRuleKind::number()));
        let err = validate_profile(&person_mappings(), &profile).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidOverride { expected, .. }
                if expected.starts_with("numeric")
        ));
    }

    #[test]
    fn location_mismatch_names_geo_point() {
        let profile =
            SimilarityProfile::new().with_rule(FieldRule::new("firstName", FieldRuleKind::location()));
        let err = validate_profile(&person_mappings(), &profile).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidOverride { expected, .. } if expected == "geo_point"
        ));
    }

    #[test]
    fn first_offending_rule_is_reported() {
        let profile = SimilarityProfile::new()
            .with_rule(FieldRule::new("firstName", FieldRuleKind::text()))
            .with_rule(FieldRule::new("ghost", FieldRuleKind::Keyword))
            .with_rule(FieldRule::new("also-missing", FieldRuleKind::Boolean));
        let err = validate_profile(&person_mappings(), &profile).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidOverride { field, .. } if field == "ghost"));
    }
}
