//! Core data model types for qtiscore.
//!
//! Values are kept in their external textual form and parsed when an operator
//! needs a number. Every number the engine writes back is rendered through
//! [`format_number`], so the textual form is consistent across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::node::Node;

/// Primitive kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Boolean,
    DirectedPair,
    Duration,
    File,
    #[default]
    Float,
    Identifier,
    Integer,
    IntOrIdentifier,
    Pair,
    Point,
    String,
    Uri,
}

impl BaseType {
    /// The QTI attribute spelling of this base type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Boolean => "boolean",
            BaseType::DirectedPair => "directedPair",
            BaseType::Duration => "duration",
            BaseType::File => "file",
            BaseType::Float => "float",
            BaseType::Identifier => "identifier",
            BaseType::Integer => "integer",
            BaseType::IntOrIdentifier => "intOrIdentifier",
            BaseType::Pair => "pair",
            BaseType::Point => "point",
            BaseType::String => "string",
            BaseType::Uri => "uri",
        }
    }

    /// Whether values of this type compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Float | BaseType::Integer)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boolean" => Ok(BaseType::Boolean),
            "directedpair" => Ok(BaseType::DirectedPair),
            "duration" => Ok(BaseType::Duration),
            "file" => Ok(BaseType::File),
            "float" => Ok(BaseType::Float),
            "identifier" => Ok(BaseType::Identifier),
            "integer" => Ok(BaseType::Integer),
            "intoridentifier" => Ok(BaseType::IntOrIdentifier),
            "pair" => Ok(BaseType::Pair),
            "point" => Ok(BaseType::Point),
            "string" => Ok(BaseType::String),
            "uri" => Ok(BaseType::Uri),
            other => Err(format!("unknown base type: {other}")),
        }
    }
}

/// Shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    #[default]
    Single,
    Multiple,
    Ordered,
    Record,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
            Cardinality::Record => "record",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Cardinality::Single),
            "multiple" => Ok(Cardinality::Multiple),
            "ordered" => Ok(Cardinality::Ordered),
            "record" => Ok(Cardinality::Record),
            other => Err(format!("unknown cardinality: {other}")),
        }
    }
}

/// Render a computed number in the textual form used by result documents.
///
/// Uses the shortest representation that round-trips (`1`, `0.5`, `2.25`).
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // also folds -0 into 0
        return "0".to_string();
    }
    value.to_string()
}

/// Parse the textual form of a number. Non-finite values are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// An immutable literal, either written in a rule tree or derived from a
/// variable while resolving one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseValue {
    /// Identifier of the variable this value was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Textual values. Empty means NULL.
    #[serde(default)]
    pub values: Vec<String>,
}

impl BaseValue {
    /// A single-cardinality value.
    pub fn single(base_type: BaseType, value: impl Into<String>) -> Self {
        Self {
            identifier: None,
            base_type,
            cardinality: Cardinality::Single,
            values: vec![value.into()],
        }
    }

    /// A computed float value.
    pub fn float(value: f64) -> Self {
        Self::single(BaseType::Float, format_number(value))
    }

    /// A computed boolean value.
    pub fn boolean(value: bool) -> Self {
        Self::single(BaseType::Boolean, value.to_string())
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// The first textual value.
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// NULL in the QTI sense: no values, or only empty ones.
    pub fn is_null(&self) -> bool {
        self.values.iter().all(|value| value.trim().is_empty())
    }

    /// The first value parsed as a number.
    pub fn as_number(&self) -> Option<f64> {
        self.first().and_then(parse_number)
    }

    /// The first value read as a boolean (`true`/`false`, `1`/`0`).
    pub fn as_bool(&self) -> Option<bool> {
        let text = self.first()?.trim();
        if text.eq_ignore_ascii_case("true") {
            Some(true)
        } else if text.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            parse_number(text).map(|n| n != 0.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Static metadata of an outcome variable, owned by an item or test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDeclaration {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_value: Vec<String>,
    /// Set when the outcome is supplied by an external scorer (`human`,
    /// `externalMachine`) instead of being calculated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_scored: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_minimum: Option<f64>,
}

impl OutcomeDeclaration {
    /// A float/single declaration with the given default.
    pub fn float(identifier: impl Into<String>, default_value: f64) -> Self {
        Self {
            identifier: identifier.into(),
            base_type: BaseType::Float,
            cardinality: Cardinality::Single,
            default_value: vec![format_number(default_value)],
            external_scored: None,
            normal_maximum: None,
            normal_minimum: None,
        }
    }

    /// Whether the processing rules are responsible for this outcome.
    pub fn is_calculated(&self) -> bool {
        self.external_scored.is_none()
    }

    /// The values a calculated outcome is reset to before processing.
    ///
    /// Numeric outcomes are zeroed. Other base types have no zero, so they
    /// go back to their declared default (empty, i.e. NULL, when none is
    /// declared) instead of a literal `"0"`.
    pub fn reset_values(&self) -> Vec<String> {
        if self.base_type.is_numeric() {
            vec!["0".to_string()]
        } else {
            self.default_value.clone()
        }
    }

    /// A fresh variable holding the declared default.
    pub fn to_variable(&self) -> OutcomeVariable {
        OutcomeVariable {
            identifier: self.identifier.clone(),
            base_type: self.base_type,
            cardinality: self.cardinality,
            values: self.default_value.clone(),
        }
    }
}

/// Static metadata of a response variable, owned by an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDeclaration {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correct_response: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Mapping>,
}

impl ResponseDeclaration {
    /// The correct response as a value, if one is declared.
    pub fn correct_value(&self) -> Option<BaseValue> {
        if self.correct_response.iter().all(|v| v.trim().is_empty()) {
            return None;
        }
        Some(BaseValue {
            identifier: Some(self.identifier.clone()),
            base_type: self.base_type,
            cardinality: self.cardinality,
            values: self.correct_response.clone(),
        })
    }
}

/// Maps response values onto scores (QTI `mapping`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    #[serde(default)]
    pub default_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub entries: Vec<MapEntry>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub map_key: String,
    pub mapped_value: f64,
}

impl Mapping {
    /// Sum the mapped value of every distinct response value, then clamp.
    pub fn map_values(&self, values: &[String]) -> f64 {
        let mut seen: Vec<&str> = Vec::new();
        let mut total = 0.0;
        for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            let repeated = seen.iter().any(|s| {
                if self.case_sensitive {
                    *s == value
                } else {
                    s.eq_ignore_ascii_case(value)
                }
            });
            if repeated {
                continue;
            }
            seen.push(value);
            total += self
                .entries
                .iter()
                .find(|entry| {
                    if self.case_sensitive {
                        entry.map_key == value
                    } else {
                        entry.map_key.eq_ignore_ascii_case(value)
                    }
                })
                .map(|entry| entry.mapped_value)
                .unwrap_or(self.default_value);
        }
        if let Some(lower) = self.lower_bound {
            total = total.max(lower);
        }
        if let Some(upper) = self.upper_bound {
            total = total.min(upper);
        }
        total
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Per-result instance of a declared outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeVariable {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub values: Vec<String>,
}

impl OutcomeVariable {
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn to_base_value(&self) -> BaseValue {
        BaseValue {
            identifier: Some(self.identifier.clone()),
            base_type: self.base_type,
            cardinality: self.cardinality,
            values: self.values.clone(),
        }
    }
}

/// Per-result instance of a declared response, holding the candidate's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseVariable {
    pub identifier: String,
    #[serde(default)]
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub values: Vec<String>,
}

impl ResponseVariable {
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn to_base_value(&self) -> BaseValue {
        BaseValue {
            identifier: Some(self.identifier.clone()),
            base_type: self.base_type,
            cardinality: self.cardinality,
            values: self.values.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Item and test definitions
// ---------------------------------------------------------------------------

/// A parsed item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItem {
    pub identifier: String,
    #[serde(default)]
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    #[serde(default)]
    pub response_declarations: Vec<ResponseDeclaration>,
    /// Top-level rules of `responseProcessing`. `None` when the item has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_processing: Option<Vec<Node>>,
}

impl AssessmentItem {
    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }

    pub fn response_declaration(&self, identifier: &str) -> Option<&ResponseDeclaration> {
        self.response_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }

    /// Identifiers of the outcomes response processing (re)calculates.
    pub fn calculated_outcomes(&self) -> impl Iterator<Item = &OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .filter(|d| d.is_calculated())
    }
}

/// A named multiplier on an item reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weight {
    pub identifier: String,
    pub value: f64,
}

/// A test's reference to one of its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItemRef {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub weights: Vec<Weight>,
}

impl AssessmentItemRef {
    pub fn weight(&self, identifier: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.identifier == identifier)
            .map(|w| w.value)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// A parsed test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentTest {
    pub identifier: String,
    #[serde(default)]
    pub item_refs: Vec<AssessmentItemRef>,
    #[serde(default)]
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    /// Top-level rules of `outcomeProcessing`. `None` when the test has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_processing: Option<Vec<Node>>,
}

impl AssessmentTest {
    pub fn item_ref(&self, identifier: &str) -> Option<&AssessmentItemRef> {
        self.item_refs.iter().find(|r| r.identifier == identifier)
    }

    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }

    /// Every category used by an item reference, in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for category in self.item_refs.iter().flat_map(|r| r.categories.iter()) {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }
}
