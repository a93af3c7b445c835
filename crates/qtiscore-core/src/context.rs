//! Per-invocation processing state.
//!
//! A context is created for one item of one result (response processing) or
//! for one result against the test (outcome processing). Operators read
//! variables and write outcomes exclusively through [`ProcessingContext`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::logging::{LogLevel, LogRecord, ScoreLogger};
use crate::model::{
    format_number, AssessmentItem, AssessmentTest, BaseValue, OutcomeDeclaration,
    OutcomeVariable, ResponseDeclaration,
};
use crate::registry::OperatorRegistry;
use crate::results::{ItemResult, TestResult};
use crate::traits::CustomOperator;

/// What operators can see and do while a rule tree runs.
pub trait ProcessingContext {
    fn registry(&self) -> &OperatorRegistry;

    fn logger(&self) -> &dyn ScoreLogger;

    /// Attach the candidate, item or test this context works on.
    fn annotate(&self, record: LogRecord) -> LogRecord;

    /// Value of a variable, optionally weighted. Logs and returns `None`
    /// when the identifier cannot be resolved.
    fn lookup_variable(&self, identifier: &str, weight: Option<&str>) -> Option<BaseValue>;

    /// The declared correct response of a response variable.
    fn correct_response(&self, identifier: &str) -> Option<BaseValue>;

    /// Sum of an item outcome across the test's item references.
    fn test_variables(
        &self,
        variable: &str,
        weight: Option<&str>,
        include: &[String],
        exclude: &[String],
    ) -> Option<BaseValue>;

    fn custom_operator(&self, definition: &str) -> Option<Arc<dyn CustomOperator>>;

    fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration>;

    fn response_declaration(&self, identifier: &str) -> Option<&ResponseDeclaration>;

    /// Write an outcome. Later reads in the same pass see the new value.
    fn set_outcome_value(&mut self, identifier: &str, value: BaseValue);

    fn log(&self, level: LogLevel, message: String) {
        self.logger()
            .log(self.annotate(LogRecord::new(level, message)));
    }

    fn log_error(&self, message: String) {
        self.log(LogLevel::Error, message);
    }

    fn log_warning(&self, message: String) {
        self.log(LogLevel::Warn, message);
    }

    fn log_info(&self, message: String) {
        self.log(LogLevel::Info, message);
    }
}

/// Store `value` into `variables[identifier]`, creating the variable from its
/// declaration or, failing that, from the value itself.
fn write_outcome(
    variables: &mut BTreeMap<String, OutcomeVariable>,
    declaration: Option<&OutcomeDeclaration>,
    identifier: &str,
    value: BaseValue,
) {
    match variables.get_mut(identifier) {
        Some(variable) => variable.values = value.values,
        None => {
            let variable = match declaration {
                Some(declaration) => OutcomeVariable {
                    values: value.values,
                    ..declaration.to_variable()
                },
                None => OutcomeVariable {
                    identifier: identifier.to_string(),
                    base_type: value.base_type,
                    cardinality: value.cardinality,
                    values: value.values,
                },
            };
            variables.insert(identifier.to_string(), variable);
        }
    }
}

/// Reset calculated outcomes that already exist.
fn reset_outcomes<'d>(
    variables: &mut BTreeMap<String, OutcomeVariable>,
    declarations: impl Iterator<Item = &'d OutcomeDeclaration>,
) {
    for declaration in declarations.filter(|d| d.is_calculated()) {
        if let Some(variable) = variables.get_mut(&declaration.identifier) {
            variable.values = declaration.reset_values();
        }
    }
}

/// Materialize calculated outcomes that were never written.
fn persist_outcomes<'d>(
    variables: &mut BTreeMap<String, OutcomeVariable>,
    declarations: impl Iterator<Item = &'d OutcomeDeclaration>,
) {
    for declaration in declarations.filter(|d| d.is_calculated()) {
        variables
            .entry(declaration.identifier.clone())
            .or_insert_with(|| OutcomeVariable {
                values: declaration.reset_values(),
                ..declaration.to_variable()
            });
    }
}

// ---------------------------------------------------------------------------
// Response processing
// ---------------------------------------------------------------------------

/// Context for scoring one item of one result.
pub struct ResponseProcessorContext<'a> {
    registry: &'a OperatorRegistry,
    logger: &'a dyn ScoreLogger,
    custom_operators: &'a [Arc<dyn CustomOperator>],
    item: &'a AssessmentItem,
    item_result: &'a mut ItemResult,
    candidate: Option<&'a str>,
}

impl<'a> ResponseProcessorContext<'a> {
    pub fn new(
        registry: &'a OperatorRegistry,
        logger: &'a dyn ScoreLogger,
        custom_operators: &'a [Arc<dyn CustomOperator>],
        item: &'a AssessmentItem,
        item_result: &'a mut ItemResult,
        candidate: Option<&'a str>,
    ) -> Self {
        Self {
            registry,
            logger,
            custom_operators,
            item,
            item_result,
            candidate,
        }
    }

    pub fn item(&self) -> &AssessmentItem {
        self.item
    }

    pub fn item_result(&self) -> &ItemResult {
        self.item_result
    }

    pub fn reset(&mut self) {
        reset_outcomes(
            &mut self.item_result.outcome_variables,
            self.item.outcome_declarations.iter(),
        );
    }

    pub fn persist(&mut self) {
        persist_outcomes(
            &mut self.item_result.outcome_variables,
            self.item.outcome_declarations.iter(),
        );
    }
}

impl ProcessingContext for ResponseProcessorContext<'_> {
    fn registry(&self) -> &OperatorRegistry {
        self.registry
    }

    fn logger(&self) -> &dyn ScoreLogger {
        self.logger
    }

    fn annotate(&self, record: LogRecord) -> LogRecord {
        record
            .with_candidate(self.candidate)
            .with_item(&self.item.identifier)
    }

    fn lookup_variable(&self, identifier: &str, _weight: Option<&str>) -> Option<BaseValue> {
        if let Some(outcome) = self.item_result.outcome_variables.get(identifier) {
            return Some(outcome.to_base_value());
        }
        if let Some(response) = self.item_result.response_variables.get(identifier) {
            return Some(response.to_base_value());
        }
        if let Some(declaration) = self.item.outcome_declaration(identifier) {
            return Some(declaration.to_variable().to_base_value());
        }
        self.log_error(format!("Cannot find variable: {identifier}"));
        None
    }

    fn correct_response(&self, identifier: &str) -> Option<BaseValue> {
        let Some(declaration) = self.item.response_declaration(identifier) else {
            self.log_error(format!(
                "Cannot find response declaration for correct: {identifier}"
            ));
            return None;
        };
        let value = declaration.correct_value();
        if value.is_none() {
            self.log_error(format!(
                "Correct: {identifier} references a response without correctResponse"
            ));
        }
        value
    }

    fn test_variables(
        &self,
        variable: &str,
        _weight: Option<&str>,
        _include: &[String],
        _exclude: &[String],
    ) -> Option<BaseValue> {
        self.log_error(format!(
            "testVariables ({variable}) can only be used in outcome processing"
        ));
        None
    }

    fn custom_operator(&self, definition: &str) -> Option<Arc<dyn CustomOperator>> {
        self.custom_operators
            .iter()
            .find(|op| op.definition() == definition)
            .cloned()
    }

    fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.item.outcome_declaration(identifier)
    }

    fn response_declaration(&self, identifier: &str) -> Option<&ResponseDeclaration> {
        self.item.response_declaration(identifier)
    }

    fn set_outcome_value(&mut self, identifier: &str, value: BaseValue) {
        let declaration = self.item.outcome_declaration(identifier);
        if declaration.is_none() && !self.item_result.outcome_variables.contains_key(identifier) {
            self.log_warning(format!(
                "Cannot find outcomeDeclaration: {identifier}, creating variable"
            ));
        }
        write_outcome(
            &mut self.item_result.outcome_variables,
            declaration,
            identifier,
            value,
        );
    }
}

// ---------------------------------------------------------------------------
// Outcome processing
// ---------------------------------------------------------------------------

/// Context for aggregating one result against the test.
pub struct OutcomeProcessorContext<'a> {
    registry: &'a OperatorRegistry,
    logger: &'a dyn ScoreLogger,
    test: &'a AssessmentTest,
    test_result: &'a mut TestResult,
    candidate: Option<&'a str>,
    /// Item outcomes keyed `item.outcome`, with the owning item identifier.
    item_outcomes: HashMap<String, (&'a str, BaseValue)>,
}

impl<'a> OutcomeProcessorContext<'a> {
    pub fn new(
        registry: &'a OperatorRegistry,
        logger: &'a dyn ScoreLogger,
        test: &'a AssessmentTest,
        item_results: &'a BTreeMap<String, ItemResult>,
        test_result: &'a mut TestResult,
        candidate: Option<&'a str>,
    ) -> Self {
        let item_outcomes = item_results
            .values()
            .flat_map(|item_result| {
                item_result.outcome_variables.values().map(move |outcome| {
                    (
                        format!("{}.{}", item_result.identifier, outcome.identifier),
                        (item_result.identifier.as_str(), outcome.to_base_value()),
                    )
                })
            })
            .collect();
        Self {
            registry,
            logger,
            test,
            test_result,
            candidate,
            item_outcomes,
        }
    }

    pub fn test_result(&self) -> &TestResult {
        self.test_result
    }

    pub fn reset(&mut self) {
        reset_outcomes(
            &mut self.test_result.outcome_variables,
            self.test.outcome_declarations.iter(),
        );
    }

    pub fn persist(&mut self) {
        persist_outcomes(
            &mut self.test_result.outcome_variables,
            self.test.outcome_declarations.iter(),
        );
    }

    /// Multiplier for `weight` on the given item reference; 1 when missing.
    fn weight_factor(&self, item: &str, weight: &str) -> f64 {
        match self.test.item_ref(item).and_then(|r| r.weight(weight)) {
            Some(factor) => factor,
            None => {
                self.log_warning(format!(
                    "Cannot find weight with identifier: {weight} for item: {item}"
                ));
                1.0
            }
        }
    }

    fn weighted_number(&self, item: &str, value: &BaseValue, weight: Option<&str>) -> Option<f64> {
        let Some(number) = value.as_number() else {
            self.log_error(format!(
                "Cannot cast value {:?} of {item}.{} to a float",
                value.first().unwrap_or_default(),
                value.identifier.as_deref().unwrap_or_default()
            ));
            return None;
        };
        Some(match weight {
            Some(weight) => number * self.weight_factor(item, weight),
            None => number,
        })
    }
}

impl ProcessingContext for OutcomeProcessorContext<'_> {
    fn registry(&self) -> &OperatorRegistry {
        self.registry
    }

    fn logger(&self) -> &dyn ScoreLogger {
        self.logger
    }

    fn annotate(&self, record: LogRecord) -> LogRecord {
        record
            .with_candidate(self.candidate)
            .with_test(&self.test.identifier)
    }

    fn lookup_variable(&self, identifier: &str, weight: Option<&str>) -> Option<BaseValue> {
        if let Some((item, value)) = self.item_outcomes.get(identifier) {
            let Some(weight) = weight else {
                return Some(value.clone());
            };
            return match self.weighted_number(item, value, Some(weight)) {
                Some(number) => Some(BaseValue {
                    values: vec![format_number(number)],
                    ..value.clone()
                }),
                None => Some(value.clone()),
            };
        }
        if let Some(outcome) = self.test_result.outcome_variables.get(identifier) {
            return Some(outcome.to_base_value());
        }
        if let Some(declaration) = self.test.outcome_declaration(identifier) {
            return Some(declaration.to_variable().to_base_value());
        }
        self.log_error(format!("Cannot find variable: {identifier}"));
        None
    }

    fn correct_response(&self, identifier: &str) -> Option<BaseValue> {
        self.log_error(format!(
            "correct ({identifier}) can only be used in response processing"
        ));
        None
    }

    fn test_variables(
        &self,
        variable: &str,
        weight: Option<&str>,
        include: &[String],
        exclude: &[String],
    ) -> Option<BaseValue> {
        let mut total = 0.0;
        for item_ref in &self.test.item_refs {
            if exclude.iter().any(|c| item_ref.has_category(c)) {
                continue;
            }
            if !include.is_empty() && !include.iter().any(|c| item_ref.has_category(c)) {
                continue;
            }
            let key = format!("{}.{variable}", item_ref.identifier);
            let Some((item, value)) = self.item_outcomes.get(&key) else {
                self.log_error(format!(
                    "Cannot find assessmentItemRef outcomeVariable: {key}"
                ));
                continue;
            };
            if let Some(number) = self.weighted_number(item, value, weight) {
                total += number;
            }
        }
        Some(BaseValue::float(total).with_identifier(variable))
    }

    fn custom_operator(&self, _definition: &str) -> Option<Arc<dyn CustomOperator>> {
        None
    }

    fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.test.outcome_declaration(identifier)
    }

    fn response_declaration(&self, _identifier: &str) -> Option<&ResponseDeclaration> {
        None
    }

    fn set_outcome_value(&mut self, identifier: &str, value: BaseValue) {
        let declaration = self.test.outcome_declaration(identifier);
        if declaration.is_none() && !self.test_result.outcome_variables.contains_key(identifier) {
            self.log_warning(format!(
                "Cannot find outcomeDeclaration: {identifier}, creating variable"
            ));
        }
        write_outcome(
            &mut self.test_result.outcome_variables,
            declaration,
            identifier,
            value,
        );
    }
}
