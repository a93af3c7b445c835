//! Per-test outcome processing.
//!
//! Aggregates item outcomes into test outcomes. Must run after every item of
//! the result has been response-processed.

use crate::context::{OutcomeProcessorContext, ProcessingContext};
use crate::logging::ScoreLogger;
use crate::model::AssessmentTest;
use crate::operators::execute_node;
use crate::registry::OperatorRegistry;
use crate::results::{AssessmentResult, TestResult};

/// Runs `outcomeProcessing` of a test against a result document.
pub struct OutcomeProcessor<'a> {
    registry: &'a OperatorRegistry,
    logger: &'a dyn ScoreLogger,
}

impl<'a> OutcomeProcessor<'a> {
    pub fn new(registry: &'a OperatorRegistry, logger: &'a dyn ScoreLogger) -> Self {
        Self { registry, logger }
    }

    /// Score `test` within `result`, creating its test result when needed.
    pub fn process(&self, test: &AssessmentTest, result: &mut AssessmentResult) {
        let AssessmentResult {
            candidate,
            test_results,
            item_results,
        } = result;

        let test_result = test_results
            .entry(test.identifier.clone())
            .or_insert_with(|| TestResult::new(&test.identifier));

        let mut ctx = OutcomeProcessorContext::new(
            self.registry,
            self.logger,
            test,
            item_results,
            test_result,
            candidate.as_deref(),
        );
        ctx.reset();

        let Some(rules) = &test.outcome_processing else {
            ctx.log_info("No outcomeProcessing found".to_string());
            return;
        };

        for rule in rules {
            if execute_node(rule, &mut ctx).is_none() {
                ctx.log_error(format!(
                    "Cannot find executor for tag-name: {}, skipping",
                    rule.tag()
                ));
            }
        }
        ctx.persist();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::model::{AssessmentItemRef, BaseType, Cardinality, OutcomeDeclaration, OutcomeVariable, Weight};
    use crate::node::Node;
    use crate::results::ItemResult;

    fn total_rule(weight: Option<&str>) -> Node {
        let test_variables = match weight {
            Some(weight) => Node::TestVariables {
                variable_identifier: "SCORE".into(),
                weight_identifier: Some(weight.into()),
                include_category: vec![],
                exclude_category: vec![],
            },
            None => Node::test_variables("SCORE"),
        };
        Node::operator(
            "setOutcomeValue",
            vec![Node::operator("sum", vec![test_variables])],
        )
        .with_attribute("identifier", "SCORE_TOTAL")
    }

    fn test(weights: Vec<Weight>, rules: Vec<Node>) -> AssessmentTest {
        AssessmentTest {
            identifier: "TEST".into(),
            item_refs: vec![AssessmentItemRef {
                identifier: "ITM-1".into(),
                href: None,
                categories: vec![],
                weights,
            }],
            outcome_declarations: vec![OutcomeDeclaration::float("SCORE_TOTAL", 0.0)],
            outcome_processing: Some(rules),
        }
    }

    fn scored_result(score: &str) -> AssessmentResult {
        AssessmentResult::new("cand-1").with_item_result(ItemResult::new("ITM-1").with_outcome(
            OutcomeVariable {
                identifier: "SCORE".into(),
                base_type: BaseType::Float,
                cardinality: Cardinality::Single,
                values: vec![score.into()],
            },
        ))
    }

    #[test]
    fn weighted_total() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let test = test(
            vec![Weight {
                identifier: "W".into(),
                value: 0.5,
            }],
            vec![total_rule(Some("W"))],
        );
        let mut result = scored_result("2");
        OutcomeProcessor::new(&registry, &logger).process(&test, &mut result);
        assert_eq!(result.test_outcome_value("TEST", "SCORE_TOTAL"), Some("1"));
        assert!(logger.records().is_empty());
    }

    #[test]
    fn undeclared_weight_falls_back_with_warning() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let test = test(vec![], vec![total_rule(Some("W"))]);
        let mut result = scored_result("2");
        OutcomeProcessor::new(&registry, &logger).process(&test, &mut result);
        assert_eq!(result.test_outcome_value("TEST", "SCORE_TOTAL"), Some("2"));
        assert!(logger.contains(LogLevel::Warn, "Cannot find weight with identifier: W"));
    }

    #[test]
    fn unknown_rule_logs_error_and_continues() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let test = test(
            vec![],
            vec![Node::operator("exitTest", vec![]), total_rule(None)],
        );
        let mut result = scored_result("3");
        OutcomeProcessor::new(&registry, &logger).process(&test, &mut result);
        assert!(logger.contains(LogLevel::Error, "exitTest"));
        assert_eq!(result.test_outcome_value("TEST", "SCORE_TOTAL"), Some("3"));
    }

    #[test]
    fn absent_rules_still_create_test_result() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let mut test = test(vec![], vec![]);
        test.outcome_processing = None;
        let mut result = scored_result("3");
        OutcomeProcessor::new(&registry, &logger).process(&test, &mut result);
        assert!(result.test_result("TEST").is_some());
        assert!(logger.contains(LogLevel::Info, "No outcomeProcessing found"));
    }

    #[test]
    fn rerun_resets_before_executing() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let accumulate = Node::operator(
            "setOutcomeValue",
            vec![Node::operator(
                "sum",
                vec![Node::variable("SCORE_TOTAL"), Node::test_variables("SCORE")],
            )],
        )
        .with_attribute("identifier", "SCORE_TOTAL");
        let test = test(vec![], vec![accumulate]);
        let mut result = scored_result("2");
        let processor = OutcomeProcessor::new(&registry, &logger);
        processor.process(&test, &mut result);
        processor.process(&test, &mut result);
        assert_eq!(result.test_outcome_value("TEST", "SCORE_TOTAL"), Some("2"));
    }
}
