//! JSON document loader.
//!
//! Loads items, tests and results from files and directories, and validates
//! item and test definitions.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::model::{AssessmentItem, AssessmentTest};
use crate::node::Node;
use crate::registry::OperatorRegistry;
use crate::results::AssessmentResult;

fn parse_json_str<T: DeserializeOwned>(content: &str, source_path: &Path, what: &str) -> Result<T> {
    serde_json::from_str(content)
        .with_context(|| format!("failed to parse {what}: {}", source_path.display()))
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file: {}", path.display()))?;
    parse_json_str(&content, path, what)
}

/// Recursively load every `.json` file below `dir`, sorted by path.
/// Files that fail to parse are skipped with a warning.
fn load_json_directory<T: DeserializeOwned>(dir: &Path, what: &str) -> Result<Vec<(PathBuf, T)>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    collect_json_files(dir, &mut paths)?;
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match load_json(&path, what) {
            Ok(document) => documents.push((path, document)),
            Err(e) => {
                tracing::warn!("skipping {}: {:#}", path.display(), e);
            }
        }
    }
    Ok(documents)
}

fn collect_json_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_json_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    Ok(())
}

/// Parse an item definition from a JSON string.
pub fn parse_item_str(content: &str, source_path: &Path) -> Result<AssessmentItem> {
    parse_json_str(content, source_path, "assessment item")
}

pub fn load_item(path: &Path) -> Result<AssessmentItem> {
    load_json(path, "assessment item")
}

/// Load one item file, or every item below a directory.
pub fn load_items(path: &Path) -> Result<Vec<AssessmentItem>> {
    if path.is_dir() {
        Ok(load_json_directory(path, "assessment item")?
            .into_iter()
            .map(|(_, item)| item)
            .collect())
    } else {
        Ok(vec![load_item(path)?])
    }
}

/// Parse a test definition from a JSON string.
pub fn parse_test_str(content: &str, source_path: &Path) -> Result<AssessmentTest> {
    parse_json_str(content, source_path, "assessment test")
}

pub fn load_test(path: &Path) -> Result<AssessmentTest> {
    load_json(path, "assessment test")
}

/// Parse a result document from a JSON string.
pub fn parse_result_str(content: &str, source_path: &Path) -> Result<AssessmentResult> {
    parse_json_str(content, source_path, "assessment result")
}

pub fn load_result(path: &Path) -> Result<AssessmentResult> {
    load_json(path, "assessment result")
}

/// Load one result file, or every result below a directory, keeping the
/// source path of each.
pub fn load_results(path: &Path) -> Result<Vec<(PathBuf, AssessmentResult)>> {
    if path.is_dir() {
        load_json_directory(path, "assessment result")
    } else {
        Ok(vec![(path.to_path_buf(), load_result(path)?)])
    }
}

/// A warning from item or test validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Identifier of the item or test the warning is about.
    pub subject: String,
    /// Warning message.
    pub message: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

fn duplicates<'a>(identifiers: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    identifiers.filter(|id| !seen.insert(*id)).collect()
}

fn rule_nodes(rules: &Option<Vec<Node>>) -> impl Iterator<Item = &Node> {
    rules.iter().flatten().flat_map(Node::descendants)
}

/// Checks shared by items and tests: unknown tags and undeclared assignments.
fn validate_rules(
    rules: &Option<Vec<Node>>,
    registry: &OperatorRegistry,
    is_declared: impl Fn(&str) -> bool,
    warn: &mut impl FnMut(String),
) {
    for node in rule_nodes(rules) {
        if let Node::Operator { name, .. } = node {
            if !registry.is_known(name) {
                warn(format!("unknown operator: {name}"));
            }
            if name == "setOutcomeValue" {
                match node.identifier() {
                    Some(id) if !is_declared(id) => {
                        warn(format!("setOutcomeValue targets undeclared outcome: {id}"))
                    }
                    None => warn("setOutcomeValue without identifier".into()),
                    _ => {}
                }
            }
        }
    }
}

/// Validate an item definition for common issues.
pub fn validate_item(item: &AssessmentItem, registry: &OperatorRegistry) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |message: String| {
        warnings.push(ValidationWarning {
            subject: item.identifier.clone(),
            message,
        })
    };

    let declared = item
        .outcome_declarations
        .iter()
        .map(|d| d.identifier.as_str())
        .chain(item.response_declarations.iter().map(|d| d.identifier.as_str()));
    for id in duplicates(declared) {
        warn(format!("duplicate declaration: {id}"));
    }

    if item.response_processing.is_none() {
        warn("no responseProcessing".into());
    }

    validate_rules(
        &item.response_processing,
        registry,
        |id| item.outcome_declaration(id).is_some(),
        &mut warn,
    );

    for node in rule_nodes(&item.response_processing) {
        match node {
            Node::Variable { identifier, .. }
                if item.outcome_declaration(identifier).is_none()
                    && item.response_declaration(identifier).is_none() =>
            {
                warn(format!("variable references undeclared identifier: {identifier}"));
            }
            Node::Correct { identifier } => match item.response_declaration(identifier) {
                None => warn(format!(
                    "correct references undeclared response: {identifier}"
                )),
                Some(declaration) if declaration.correct_value().is_none() => warn(format!(
                    "correct references response without correctResponse: {identifier}"
                )),
                Some(_) => {}
            },
            Node::TestVariables {
                variable_identifier,
                ..
            } => warn(format!(
                "testVariables ({variable_identifier}) is only evaluated in outcome processing"
            )),
            Node::Operator { name, .. } if name == "mapResponse" => {
                let mapped = node
                    .identifier()
                    .and_then(|id| item.response_declaration(id))
                    .is_some_and(|d| d.mapping.is_some());
                if !mapped {
                    warn("mapResponse references a response without mapping".into());
                }
            }
            _ => {}
        }
    }

    warnings
}

/// Validate a test definition for common issues.
pub fn validate_test(test: &AssessmentTest, registry: &OperatorRegistry) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |message: String| {
        warnings.push(ValidationWarning {
            subject: test.identifier.clone(),
            message,
        })
    };

    for id in duplicates(test.item_refs.iter().map(|r| r.identifier.as_str())) {
        warn(format!("duplicate item reference: {id}"));
    }
    for id in duplicates(test.outcome_declarations.iter().map(|d| d.identifier.as_str())) {
        warn(format!("duplicate declaration: {id}"));
    }

    validate_rules(
        &test.outcome_processing,
        registry,
        |id| test.outcome_declaration(id).is_some(),
        &mut warn,
    );

    let declared_weight =
        |weight: &str| test.item_refs.iter().any(|r| r.weight(weight).is_some());

    for node in rule_nodes(&test.outcome_processing) {
        match node {
            Node::Variable {
                identifier,
                weight_identifier,
            } => {
                let resolvable = match identifier.split_once('.') {
                    Some((item, _)) => test.item_ref(item).is_some(),
                    None => test.outcome_declaration(identifier).is_some(),
                };
                if !resolvable {
                    warn(format!("variable references unknown identifier: {identifier}"));
                }
                if let Some(weight) = weight_identifier {
                    if !declared_weight(weight.as_str()) {
                        warn(format!("weight {weight} is not declared by any item reference"));
                    }
                }
            }
            Node::TestVariables {
                weight_identifier: Some(weight),
                ..
            } if !declared_weight(weight.as_str()) => {
                warn(format!("weight {weight} is not declared by any item reference"));
            }
            Node::Correct { identifier } => warn(format!(
                "correct ({identifier}) is only evaluated in response processing"
            )),
            _ => {}
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CHOICE_ITEM: &str = r#"{
        "identifier": "ITM-1",
        "outcomeDeclarations": [
            {"identifier": "SCORE", "baseType": "float", "defaultValue": ["0"]}
        ],
        "responseDeclarations": [
            {"identifier": "RESPONSE", "baseType": "identifier", "correctResponse": ["B"]}
        ],
        "responseProcessing": [
            {"type": "operator", "name": "responseCondition", "children": [
                {"type": "operator", "name": "responseIf", "children": [
                    {"type": "operator", "name": "match", "children": [
                        {"type": "variable", "identifier": "RESPONSE"},
                        {"type": "correct", "identifier": "RESPONSE"}
                    ]},
                    {"type": "operator", "name": "setOutcomeValue",
                     "attributes": {"identifier": "SCORE"},
                     "children": [{"type": "baseValue", "baseType": "float", "value": "1"}]}
                ]}
            ]}
        ]
    }"#;

    #[test]
    fn parse_item() {
        let item = parse_item_str(CHOICE_ITEM, Path::new("item.json")).unwrap();
        assert_eq!(item.identifier, "ITM-1");
        assert_eq!(item.outcome_declarations[0].identifier, "SCORE");
        assert_eq!(item.response_processing.as_ref().map(Vec::len), Some(1));
        assert!(validate_item(&item, &OperatorRegistry::standard()).is_empty());
    }

    #[test]
    fn parse_malformed_json() {
        let err = parse_item_str("{ not json", Path::new("bad.json")).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn validate_item_reports_problems() {
        let item: AssessmentItem = serde_json::from_value(json!({
            "identifier": "ITM-2",
            "outcomeDeclarations": [
                {"identifier": "SCORE"},
                {"identifier": "SCORE"}
            ],
            "responseDeclarations": [{"identifier": "RESPONSE"}],
            "responseProcessing": [
                {"type": "operator", "name": "setOutcomeValue",
                 "attributes": {"identifier": "MISSING"},
                 "children": [{"type": "operator", "name": "fancyOp", "children": [
                     {"type": "variable", "identifier": "NOPE"},
                     {"type": "correct", "identifier": "RESPONSE"}
                 ]}]}
            ]
        }))
        .unwrap();
        let warnings = validate_item(&item, &OperatorRegistry::standard());
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.contains(&"duplicate declaration: SCORE"));
        assert!(messages.contains(&"unknown operator: fancyOp"));
        assert!(messages.contains(&"setOutcomeValue targets undeclared outcome: MISSING"));
        assert!(messages.contains(&"variable references undeclared identifier: NOPE"));
        assert!(messages
            .contains(&"correct references response without correctResponse: RESPONSE"));
        assert!(warnings.iter().all(|w| w.subject == "ITM-2"));
    }

    #[test]
    fn validate_test_reports_problems() {
        let test: AssessmentTest = serde_json::from_value(json!({
            "identifier": "TEST",
            "itemRefs": [
                {"identifier": "I1", "weights": [{"identifier": "WEIGHT", "value": 2.0}]},
                {"identifier": "I1"}
            ],
            "outcomeDeclarations": [{"identifier": "SCORE_TOTAL"}],
            "outcomeProcessing": [
                {"type": "operator", "name": "setOutcomeValue",
                 "attributes": {"identifier": "SCORE_TOTAL"},
                 "children": [{"type": "operator", "name": "sum", "children": [
                     {"type": "testVariables", "variableIdentifier": "SCORE", "weightIdentifier": "W2"},
                     {"type": "variable", "identifier": "I9.SCORE"}
                 ]}]}
            ]
        }))
        .unwrap();
        let warnings = validate_test(&test, &OperatorRegistry::standard());
        let messages: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
        assert!(messages.contains(&"TEST: duplicate item reference: I1".to_string()));
        assert!(messages
            .contains(&"TEST: weight W2 is not declared by any item reference".to_string()));
        assert!(messages
            .contains(&"TEST: variable references unknown identifier: I9.SCORE".to_string()));
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), CHOICE_ITEM).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested").join("a.json"),
            CHOICE_ITEM.replace("ITM-1", "ITM-0"),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let items = load_items(dir.path()).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["ITM-1", "ITM-0"]);
    }

    #[test]
    fn load_results_keeps_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cand.json");
        std::fs::write(&path, r#"{"candidate": "cand-1", "itemResults": []}"#).unwrap();
        let results = load_results(&path).unwrap();
        assert_eq!(results[0].0, path);
        assert_eq!(results[0].1.candidate.as_deref(), Some("cand-1"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_json_directory::<AssessmentItem>(Path::new("/nonexistent/dir"), "item")
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
