//! Per-item response processing.
//!
//! For one item and one result: skip when the result has no entry for the
//! item, reset calculated outcomes, run the item's rules in document order,
//! then make sure every calculated outcome exists in the item result.

use std::sync::Arc;

use crate::context::{ProcessingContext, ResponseProcessorContext};
use crate::logging::{LogLevel, LogRecord, ScoreLogger};
use crate::model::AssessmentItem;
use crate::operators::execute_node;
use crate::registry::OperatorRegistry;
use crate::results::AssessmentResult;
use crate::traits::CustomOperator;

/// Runs `responseProcessing` of an item against a result document.
pub struct ResponseProcessor<'a> {
    registry: &'a OperatorRegistry,
    logger: &'a dyn ScoreLogger,
    custom_operators: &'a [Arc<dyn CustomOperator>],
}

impl<'a> ResponseProcessor<'a> {
    pub fn new(registry: &'a OperatorRegistry, logger: &'a dyn ScoreLogger) -> Self {
        Self {
            registry,
            logger,
            custom_operators: &[],
        }
    }

    pub fn with_custom_operators(mut self, custom_operators: &'a [Arc<dyn CustomOperator>]) -> Self {
        self.custom_operators = custom_operators;
        self
    }

    /// Score `item` within `result`. The result is mutated in place.
    pub fn process(&self, item: &AssessmentItem, result: &mut AssessmentResult) {
        let AssessmentResult {
            candidate,
            item_results,
            ..
        } = result;
        let candidate = candidate.as_deref();

        let Some(item_result) = item_results.get_mut(&item.identifier) else {
            self.logger.log(
                LogRecord::new(
                    LogLevel::Warn,
                    "Item result not found. Skipping ResponseProcessing",
                )
                .with_candidate(candidate)
                .with_item(&item.identifier),
            );
            return;
        };

        let mut ctx = ResponseProcessorContext::new(
            self.registry,
            self.logger,
            self.custom_operators,
            item,
            item_result,
            candidate,
        );
        ctx.reset();

        let Some(rules) = &item.response_processing else {
            ctx.log_info("No responseProcessing found".to_string());
            return;
        };

        for rule in rules {
            if execute_node(rule, &mut ctx).is_none() {
                ctx.log_warning(format!(
                    "Cannot find executor for tag-name: {}, skipping",
                    rule.tag()
                ));
            }
        }
        ctx.persist();
    }
}
