//! Turning rule-tree nodes into values.
//!
//! Resolution never fails: anything that cannot be resolved is logged through
//! the context and simply contributes no value.

use crate::context::ProcessingContext;
use crate::model::{BaseValue, Cardinality};
use crate::node::Node;

/// Tag of the extension element dispatched on its `definition` attribute.
pub const CUSTOM_OPERATOR: &str = "customOperator";

/// Container tags that group their children into one operand.
pub const CONTAINERS: [&str; 2] = ["multiple", "ordered"];

/// Remove `<![CDATA[` / `]]>` markers left over from the source document.
pub fn strip_cdata(text: &str) -> String {
    if text.contains("<![CDATA[") {
        text.replace("<![CDATA[", "").replace("]]>", "")
    } else {
        text.to_string()
    }
}

/// All values `node` produces, flattened in document order.
pub fn resolve_node(node: &Node, ctx: &dyn ProcessingContext) -> Vec<BaseValue> {
    match node {
        Node::BaseValue { base_type, value } => {
            vec![BaseValue::single(*base_type, strip_cdata(value))]
        }
        Node::Variable {
            identifier,
            weight_identifier,
        } => ctx
            .lookup_variable(identifier, weight_identifier.as_deref())
            .into_iter()
            .collect(),
        Node::Correct { identifier } => ctx.correct_response(identifier).into_iter().collect(),
        Node::TestVariables {
            variable_identifier,
            weight_identifier,
            include_category,
            exclude_category,
        } => ctx
            .test_variables(
                variable_identifier,
                weight_identifier.as_deref(),
                include_category,
                exclude_category,
            )
            .into_iter()
            .collect(),
        Node::Operator { name, .. } if name == CUSTOM_OPERATOR => resolve_custom(node, ctx),
        Node::Operator { name, .. } => match ctx.registry().calculator(name) {
            Some(calculator) => {
                tracing::debug!("processing {name}");
                vec![BaseValue::float(calculator.calculate(node, ctx))]
            }
            None => resolve_children(node, ctx),
        },
    }
}

/// Values of every child of `node`, flattened in document order.
pub fn resolve_children(node: &Node, ctx: &dyn ProcessingContext) -> Vec<BaseValue> {
    node.children()
        .iter()
        .flat_map(|child| resolve_node(child, ctx))
        .collect()
}

/// Resolve `node` into a single operand, merging multiple values.
///
/// `multiple` and `ordered` containers set the cardinality of the merged
/// value. Returns `None` when nothing resolved.
pub fn resolve_operand(node: &Node, ctx: &dyn ProcessingContext) -> Option<BaseValue> {
    let mut values = resolve_node(node, ctx).into_iter();
    let mut operand = values.next()?;
    for value in values {
        operand.values.extend(value.values);
        operand.cardinality = Cardinality::Multiple;
        operand.identifier = None;
    }
    match node.tag() {
        "multiple" => operand.cardinality = Cardinality::Multiple,
        "ordered" => operand.cardinality = Cardinality::Ordered,
        _ => {}
    }
    Some(operand)
}

fn resolve_custom(node: &Node, ctx: &dyn ProcessingContext) -> Vec<BaseValue> {
    let values = resolve_children(node, ctx);
    let definition = node.attribute("definition").unwrap_or_default();
    match ctx.custom_operator(definition) {
        Some(operator) => {
            tracing::debug!("processing customOperator {definition}");
            values.into_iter().map(|v| operator.apply(v)).collect()
        }
        None => {
            ctx.log_warning(format!(
                "Cannot find customOperator with definition: {definition}"
            ));
            values
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ResponseProcessorContext;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::model::{AssessmentItem, BaseType, OutcomeDeclaration};
    use crate::operators::custom::standard_custom_operators;
    use crate::registry::OperatorRegistry;
    use crate::results::ItemResult;

    fn item() -> AssessmentItem {
        AssessmentItem {
            identifier: "ITM-1".into(),
            outcome_declarations: vec![OutcomeDeclaration::float("SCORE", 2.0)],
            response_declarations: vec![],
            response_processing: None,
        }
    }

    #[test]
    fn strips_cdata_markers() {
        assert_eq!(strip_cdata("<![CDATA[1,5]]>"), "1,5");
        assert_eq!(strip_cdata("plain"), "plain");
    }

    #[test]
    fn resolves_literals_variables_and_calculators() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let item = item();
        let mut item_result = ItemResult::new("ITM-1");
        let ctx =
            ResponseProcessorContext::new(&registry, &logger, &[], &item, &mut item_result, None);

        let node = Node::operator(
            "anything",
            vec![
                Node::base_value(BaseType::Float, "<![CDATA[1]]>"),
                Node::variable("SCORE"),
                Node::operator(
                    "sum",
                    vec![
                        Node::base_value(BaseType::Integer, "1"),
                        Node::base_value(BaseType::Integer, "2"),
                    ],
                ),
            ],
        );
        let values: Vec<String> = resolve_node(&node, &ctx)
            .into_iter()
            .filter_map(|v| v.first().map(str::to_string))
            .collect();
        assert_eq!(values, vec!["1", "2", "3"]);
        assert!(logger.records().is_empty());
    }

    #[test]
    fn custom_operator_transforms_values() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let item = item();
        let mut item_result = ItemResult::new("ITM-1");
        let custom = standard_custom_operators();
        let ctx = ResponseProcessorContext::new(
            &registry,
            &logger,
            &custom,
            &item,
            &mut item_result,
            None,
        );

        let node = Node::operator(
            CUSTOM_OPERATOR,
            vec![Node::base_value(BaseType::String, "1,5")],
        )
        .with_attribute("definition", "depcp:ParseCommaDecimal");
        assert_eq!(resolve_node(&node, &ctx)[0].first(), Some("1.5"));

        let unknown = Node::operator(
            CUSTOM_OPERATOR,
            vec![Node::base_value(BaseType::String, "1,5")],
        )
        .with_attribute("definition", "acme:Unknown");
        assert_eq!(resolve_node(&unknown, &ctx)[0].first(), Some("1,5"));
        assert!(logger.contains(LogLevel::Warn, "acme:Unknown"));
    }

    #[test]
    fn operand_merges_container_children() {
        let registry = OperatorRegistry::standard();
        let logger = MemoryLogger::new();
        let item = item();
        let mut item_result = ItemResult::new("ITM-1");
        let no_custom: Vec<Arc<dyn crate::traits::CustomOperator>> = Vec::new();
        let ctx = ResponseProcessorContext::new(
            &registry,
            &logger,
            &no_custom,
            &item,
            &mut item_result,
            None,
        );

        let ordered = Node::operator(
            "ordered",
            vec![
                Node::base_value(BaseType::Identifier, "B"),
                Node::base_value(BaseType::Identifier, "A"),
            ],
        );
        let operand = resolve_operand(&ordered, &ctx).unwrap();
        assert_eq!(operand.cardinality, Cardinality::Ordered);
        assert_eq!(operand.values, vec!["B", "A"]);

        let single = Node::operator("multiple", vec![Node::base_value(BaseType::Identifier, "A")]);
        assert_eq!(
            resolve_operand(&single, &ctx).unwrap().cardinality,
            Cardinality::Multiple
        );

        assert!(resolve_operand(&Node::variable("MISSING"), &ctx).is_none());
    }
}
