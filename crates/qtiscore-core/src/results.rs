//! Result documents: the per-candidate state that scoring reads and mutates.
//!
//! Variables are held in ordered maps keyed by identifier and serialized as
//! plain lists, so the JSON form reads like a QTI `assessmentResult`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{BaseType, Cardinality, OutcomeVariable, ResponseVariable};

/// Serializes a `BTreeMap<String, T>` as a list of `T`, re-keying on load.
/// A repeated identifier in the list is a deserialization error.
mod keyed {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub trait Keyed {
        fn key(&self) -> &str;
    }

    pub fn serialize<S, T>(map: &BTreeMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Keyed,
    {
        let list = Vec::<T>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for entry in list {
            let key = entry.key().to_string();
            if map.contains_key(&key) {
                return Err(D::Error::custom(format!("duplicate identifier: {key}")));
            }
            map.insert(key, entry);
        }
        Ok(map)
    }
}

use keyed::Keyed;

impl Keyed for OutcomeVariable {
    fn key(&self) -> &str {
        &self.identifier
    }
}

impl Keyed for ResponseVariable {
    fn key(&self) -> &str {
        &self.identifier
    }
}

impl Keyed for ItemResult {
    fn key(&self) -> &str {
        &self.identifier
    }
}

impl Keyed for TestResult {
    fn key(&self) -> &str {
        &self.identifier
    }
}

/// Variables recorded for one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub identifier: String,
    #[serde(default, with = "keyed")]
    pub response_variables: BTreeMap<String, ResponseVariable>,
    #[serde(default, with = "keyed")]
    pub outcome_variables: BTreeMap<String, OutcomeVariable>,
}

impl ItemResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn with_response(mut self, variable: ResponseVariable) -> Self {
        self.response_variables
            .insert(variable.identifier.clone(), variable);
        self
    }

    pub fn with_outcome(mut self, variable: OutcomeVariable) -> Self {
        self.outcome_variables
            .insert(variable.identifier.clone(), variable);
        self
    }
}

/// Test-level outcome variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub identifier: String,
    #[serde(default, with = "keyed")]
    pub outcome_variables: BTreeMap<String, OutcomeVariable>,
}

impl TestResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }
}

/// One candidate's result document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    /// Candidate (session) identifier, used in log records and reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(default, with = "keyed")]
    pub test_results: BTreeMap<String, TestResult>,
    #[serde(default, with = "keyed")]
    pub item_results: BTreeMap<String, ItemResult>,
}

impl AssessmentResult {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: Some(candidate.into()),
            ..Default::default()
        }
    }

    pub fn with_item_result(mut self, item_result: ItemResult) -> Self {
        self.item_results
            .insert(item_result.identifier.clone(), item_result);
        self
    }

    pub fn item_result(&self, item: &str) -> Option<&ItemResult> {
        self.item_results.get(item)
    }

    pub fn test_result(&self, test: &str) -> Option<&TestResult> {
        self.test_results.get(test)
    }

    /// The first value of an item-level outcome.
    pub fn outcome_value(&self, item: &str, outcome: &str) -> Option<&str> {
        self.item_results
            .get(item)?
            .outcome_variables
            .get(outcome)?
            .value()
    }

    /// The first value of a test-level outcome.
    pub fn test_outcome_value(&self, test: &str, outcome: &str) -> Option<&str> {
        self.test_results
            .get(test)?
            .outcome_variables
            .get(outcome)?
            .value()
    }

    /// Record a candidate response, creating the item result when needed.
    ///
    /// An existing variable keeps its declared type; a new one is an
    /// identifier variable whose cardinality follows the number of values.
    pub fn set_response(&mut self, item: &str, response: &str, values: Vec<String>) {
        let item_result = self
            .item_results
            .entry(item.to_string())
            .or_insert_with(|| ItemResult::new(item));
        match item_result.response_variables.get_mut(response) {
            Some(variable) => variable.values = values,
            None => {
                let cardinality = if values.len() > 1 {
                    Cardinality::Multiple
                } else {
                    Cardinality::Single
                };
                item_result.response_variables.insert(
                    response.to_string(),
                    ResponseVariable {
                        identifier: response.to_string(),
                        base_type: BaseType::Identifier,
                        cardinality,
                        values,
                    },
                );
            }
        }
    }

    /// Display label: the candidate identifier or a positional fallback.
    pub fn label(&self, index: usize) -> String {
        self.candidate
            .clone()
            .unwrap_or_else(|| format!("result-{}", index + 1))
    }
}
