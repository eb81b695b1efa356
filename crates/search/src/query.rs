use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::score;

/// Edit tolerance for fuzzy text clauses.
///
/// The variants mirror the engine's fuzziness parameter: [`Auto`]
/// tolerates more edits for longer terms using the engine's built-in
/// pivots, [`Bounded`] supplies explicit term-length pivots. A term
/// shorter than `min` characters tolerates no edits, one shorter than
/// `max` tolerates a single edit, anything longer tolerates two.
///
/// [`Auto`]: Fuzziness::Auto
/// [`Bounded`]: Fuzziness::Bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fuzziness {
    #[default]
    Auto,
    Bounded { min: u32, max: u32 },
}

impl Fuzziness {
    /// Engine default pivots for [`Fuzziness::Auto`].
    const AUTO_MIN: usize = 3;
    const AUTO_MAX: usize = 6;

    /// Parses the textual forms `"auto"` and `"min,max"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("auto") {
            return Some(Fuzziness::Auto);
        }
        let (min, max) = raw.split_once(',')?;
        let min = min.trim().parse().ok()?;
        let max = max.trim().parse().ok()?;
        if min > max {
            return None;
        }
        Some(Fuzziness::Bounded { min, max })
    }

    /// Maximum tolerated edits for a term of `len` characters.
    pub fn allowed_edits(&self, len: usize) -> u32 {
        let (min, max) = match self {
            Fuzziness::Auto => (Self::AUTO_MIN, Self::AUTO_MAX),
            Fuzziness::Bounded { min, max } => (*min as usize, *max as usize),
        };
        if len < min {
            0
        } else if len < max {
            1
        } else {
            2
        }
    }

    /// The engine's wire spelling, e.g. `AUTO` or `AUTO:3,6`.
    fn wire_format(&self) -> String {
        match self {
            Fuzziness::Auto => "AUTO".to_string(),
            Fuzziness::Bounded { min, max } => format!("AUTO:{min},{max}"),
        }
    }
}

impl fmt::Display for Fuzziness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fuzziness::Auto => write!(f, "AUTO"),
            Fuzziness::Bounded { min, max } => write!(f, "{min},{max}"),
        }
    }
}

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Reads a point from any of the engine's stored shapes: a
    /// `"lat,lon"` string, a `{ "lat": .., "lon": .. }` object, or a
    /// `[lon, lat]` array.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let (lat, lon) = s.split_once(',')?;
                Some(Self {
                    lat: lat.trim().parse().ok()?,
                    lon: lon.trim().parse().ok()?,
                })
            }
            Value::Object(map) => Some(Self {
                lat: map.get("lat")?.as_f64()?,
                lon: map.get("lon")?.as_f64()?,
            }),
            Value::Array(items) => match items.as_slice() {
                [lon, lat] => Some(Self {
                    lat: lat.as_f64()?,
                    lon: lon.as_f64()?,
                }),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One weighted scoring clause.
///
/// Clauses combine with OR semantics inside a [`Query`]: each matching
/// clause adds its weighted score, so a candidate missing one property
/// can still rank on the others.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Exact equality on a stored value.
    Term { field: String, value: Value, boost: f32 },
    /// Fuzzy full-text match.
    Fuzzy {
        field: String,
        text: String,
        fuzziness: Fuzziness,
        boost: f32,
    },
    /// Distance decay from a numeric origin: full score within `offset`
    /// of it, `decay` of the score at `scale` beyond that.
    NumberDecay {
        field: String,
        origin: f64,
        scale: f64,
        offset: f64,
        decay: f64,
        boost: f32,
    },
    /// Temporal proximity: half score at `pivot` away from `origin`.
    DateProximity {
        field: String,
        origin: String,
        pivot: String,
        boost: f32,
    },
    /// Spatial proximity: half score at `pivot` away from `origin`.
    GeoProximity {
        field: String,
        origin: GeoPoint,
        pivot: String,
        boost: f32,
    },
}

impl Clause {
    /// Exact term clause.
    pub fn term(field: impl Into<String>, value: Value, boost: f32) -> Self {
        Clause::Term {
            field: field.into(),
            value,
            boost,
        }
    }

    /// Fuzzy text clause.
    pub fn fuzzy(
        field: impl Into<String>,
        text: impl Into<String>,
        fuzziness: Fuzziness,
        boost: f32,
    ) -> Self {
        Clause::Fuzzy {
            field: field.into(),
            text: text.into(),
            fuzziness,
            boost,
        }
    }

    /// Numeric decay clause centered on `origin`.
    pub fn number_decay(
        field: impl Into<String>,
        origin: f64,
        scale: f64,
        offset: f64,
        decay: f64,
        boost: f32,
    ) -> Self {
        Clause::NumberDecay {
            field: field.into(),
            origin,
            scale,
            offset,
            decay,
            boost,
        }
    }

    /// Date proximity clause, or `None` when `origin` is not a date the
    /// engine understands or `pivot` is not a duration.
    pub fn date_proximity(
        field: impl Into<String>,
        origin: &str,
        pivot: &str,
        boost: f32,
    ) -> Option<Self> {
        score::parse_datetime_ms(origin)?;
        score::parse_duration_ms(pivot)?;
        Some(Clause::DateProximity {
            field: field.into(),
            origin: origin.to_string(),
            pivot: pivot.to_string(),
            boost,
        })
    }

    /// Geo proximity clause, or `None` when `origin` holds no readable
    /// point or `pivot` is not a distance.
    pub fn geo_proximity(
        field: impl Into<String>,
        origin: &Value,
        pivot: &str,
        boost: f32,
    ) -> Option<Self> {
        let origin = GeoPoint::from_value(origin)?;
        score::parse_distance_meters(pivot)?;
        Some(Clause::GeoProximity {
            field: field.into(),
            origin,
            pivot: pivot.to_string(),
            boost,
        })
    }

    /// The field this clause scores.
    pub fn field(&self) -> &str {
        match self {
            Clause::Term { field, .. }
            | Clause::Fuzzy { field, .. }
            | Clause::NumberDecay { field, .. }
            | Clause::DateProximity { field, .. }
            | Clause::GeoProximity { field, .. } => field,
        }
    }

    /// The clause weight.
    pub fn boost(&self) -> f32 {
        match self {
            Clause::Term { boost, .. }
            | Clause::Fuzzy { boost, .. }
            | Clause::NumberDecay { boost, .. }
            | Clause::DateProximity { boost, .. }
            | Clause::GeoProximity { boost, .. } => *boost,
        }
    }

    /// Renders the clause into the engine's JSON query DSL.
    pub fn to_query_dsl(&self) -> Value {
        match self {
            Clause::Term { field, value, boost } => json!({
                "term": { field: { "value": value, "boost": boost } }
            }),
            Clause::Fuzzy {
                field,
                text,
                fuzziness,
                boost,
            } => json!({
                "match": {
                    field: {
                        "query": text,
                        "fuzziness": fuzziness.wire_format(),
                        "boost": boost,
                    }
                }
            }),
            Clause::NumberDecay {
                field,
                origin,
                scale,
                offset,
                decay,
                boost,
            } => json!({
                "function_score": {
                    "query": { "exists": { "field": field } },
                    "functions": [{
                        "exp": {
                            field: {
                                "origin": origin,
                                "scale": scale,
                                "offset": offset,
                                "decay": decay,
                            }
                        }
                    }],
                    "boost": boost,
                    "boost_mode": "replace",
                }
            }),
            Clause::DateProximity {
                field,
                origin,
                pivot,
                boost,
            } => json!({
                "function_score": {
                    "query": { "exists": { "field": field } },
                    "functions": [{
                        "exp": { field: { "origin": origin, "scale": pivot } }
                    }],
                    "boost": boost,
                    "boost_mode": "replace",
                }
            }),
            Clause::GeoProximity {
                field,
                origin,
                pivot,
                boost,
            } => json!({
                "function_score": {
                    "query": { "exists": { "field": field } },
                    "functions": [{
                        "exp": {
                            field: {
                                "origin": { "lat": origin.lat, "lon": origin.lon },
                                "scale": pivot,
                            }
                        }
                    }],
                    "boost": boost,
                    "boost_mode": "replace",
                }
            }),
        }
    }
}

/// A weighted OR query: candidates match any clause and their clause
/// scores add up.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    should: Vec<Clause>,
}

impl Query {
    /// Creates a query with no clauses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause.
    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.should.push(clause);
        self
    }

    /// The clauses in insertion order.
    pub fn clauses(&self) -> &[Clause] {
        &self.should
    }

    pub fn is_empty(&self) -> bool {
        self.should.is_empty()
    }

    /// Renders the whole query into the engine's JSON query DSL.
    pub fn to_query_dsl(&self) -> Value {
        let should: Vec<Value> = self.should.iter().map(Clause::to_query_dsl).collect();
        json!({ "bool": { "should": should } })
    }
}
