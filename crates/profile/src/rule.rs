use serde::{Deserialize, Serialize};

/// How a single document property participates in similarity scoring.
///
/// One rule covers one property. The kind decides which query clause the
/// resolver builds; `boost` weighs the clause against its siblings;
/// `required=false` switches the rule off without deleting it; and
/// `exact_match` forces a plain equality clause regardless of kind.
///
/// `name`, the kind, and `boost` are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRule {
    name: String,
    #[serde(flatten)]
    kind: FieldRuleKind,
    #[serde(default = "FieldRule::default_boost")]
    boost: f32,
    #[serde(default = "FieldRule::default_required")]
    required: bool,
    #[serde(default)]
    exact_match: bool,
}

impl FieldRule {
    pub(crate) fn default_boost() -> f32 {
        1.0
    }

    pub(crate) fn default_required() -> bool {
        true
    }

    /// Creates an active rule for `name` with the given kind at boost 1.0.
    pub fn new(name: impl Into<String>, kind: FieldRuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            boost: Self::default_boost(),
            required: Self::default_required(),
            exact_match: false,
        }
    }

    /// Sets the clause weight.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Switches the rule on or off; inactive rules build no clause.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Forces a plain equality clause regardless of the rule kind.
    pub fn with_exact_match(mut self, exact_match: bool) -> Self {
        self.exact_match = exact_match;
        self
    }

    /// The property this rule scores.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field kind and its kind-specific tuning.
    pub fn kind(&self) -> &FieldRuleKind {
        &self.kind
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn exact_match(&self) -> bool {
        self.exact_match
    }
}

/// Closed taxonomy of similarity field kinds.
///
/// Serialized with an adjacent camelCase `type` tag, so a text rule reads
/// `{ "name": "lastName", "type": "text", "minFuzziness": 3, ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldRuleKind {
    /// Exact-valued string field.
    Keyword,
    /// Analyzed text field scored with fuzzy matching.
    ///
    /// `min_fuzziness`/`max_fuzziness` are term-length pivots: terms
    /// shorter than `min` tolerate no edits, terms from `min` up to `max`
    /// tolerate one, longer terms tolerate two. Leaving either unset
    /// selects the engine's automatic pivots.
    #[serde(rename_all = "camelCase")]
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_fuzziness: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_fuzziness: Option<u32>,
    },
    /// Numeric field, optionally scored by distance decay.
    ///
    /// With `scale` set the clause decays from the document's own value:
    /// full score within `offset` of it, multiplied down to `decay` at
    /// `scale` beyond that. Without `scale` the clause is plain equality.
    #[serde(rename_all = "camelCase")]
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decay: Option<f64>,
    },
    /// Date field, optionally scored by temporal proximity.
    ///
    /// `pivot` is a duration such as `"30d"`: a candidate that far from
    /// the document's value scores half. Without it the value's textual
    /// form is fuzzy-matched.
    #[serde(rename_all = "camelCase")]
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pivot: Option<String>,
    },
    /// Geo-point field, optionally scored by spatial proximity.
    ///
    /// `pivot` is a distance such as `"2km"`: a candidate that far away
    /// scores half. Without it the clause is plain equality.
    #[serde(rename_all = "camelCase")]
    Location {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pivot: Option<String>,
    },
    /// Boolean flag field.
    Boolean,
}

impl FieldRuleKind {
    /// Text with automatic fuzziness pivots.
    pub fn text() -> Self {
        FieldRuleKind::Text {
            min_fuzziness: None,
            max_fuzziness: None,
        }
    }

    /// Text with explicit fuzziness pivots.
    pub fn text_bounded(min: u32, max: u32) -> Self {
        FieldRuleKind::Text {
            min_fuzziness: Some(min),
            max_fuzziness: Some(max),
        }
    }

    /// Number compared by plain equality.
    pub fn number() -> Self {
        FieldRuleKind::Number {
            scale: None,
            offset: None,
            decay: None,
        }
    }

    /// Number scored by decay over the distance from the document value.
    pub fn number_decay(scale: f64, offset: f64, decay: f64) -> Self {
        FieldRuleKind::Number {
            scale: Some(scale),
            offset: Some(offset),
            decay: Some(decay),
        }
    }

    /// Date matched on its textual form.
    pub fn date() -> Self {
        FieldRuleKind::Date { pivot: None }
    }

    /// Date scored by proximity; half score at `pivot` away.
    pub fn date_proximity(pivot: impl Into<String>) -> Self {
        FieldRuleKind::Date {
            pivot: Some(pivot.into()),
        }
    }

    /// Location compared by plain equality.
    pub fn location() -> Self {
        FieldRuleKind::Location { pivot: None }
    }

    /// Location scored by proximity; half score at `pivot` away.
    pub fn location_proximity(pivot: impl Into<String>) -> Self {
        FieldRuleKind::Location {
            pivot: Some(pivot.into()),
        }
    }

    /// Human-readable tag, matching the serialized `type` value.
    pub fn label(&self) -> &'static str {
        match self {
            FieldRuleKind::Keyword => "keyword",
            FieldRuleKind::Text { .. } => "text",
            FieldRuleKind::Number { .. } => "number",
            FieldRuleKind::Date { .. } => "date",
            FieldRuleKind::Location { .. } => "location",
            FieldRuleKind::Boolean => "boolean",
        }
    }
}
