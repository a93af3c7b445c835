//! The standard operator vocabulary and the dispatch helpers operators use
//! to evaluate their children.

pub mod calculators;
pub mod comparisons;
pub mod conditions;
pub mod custom;
pub mod statements;

use crate::context::ProcessingContext;
use crate::node::Node;
use crate::registry::OperatorRegistry;
use crate::resolve::resolve_operand;

use calculators::{Divide, MapResponse, Max, Min, Product, Subtract, Sum};
use comparisons::{Comparison, IsNull, Match, Member, NumericComparison, StringMatch};
use conditions::{And, Not, Or};
use statements::{Condition, ConditionalBranch, ElseBranch, SetOutcomeValue};

/// Register every standard executor and calculator.
pub fn register_standard(registry: &mut OperatorRegistry) {
    registry
        .register_executor(And)
        .register_executor(Or)
        .register_executor(Not)
        .register_executor(Match)
        .register_executor(NumericComparison::new(Comparison::Equal))
        .register_executor(NumericComparison::new(Comparison::Gt))
        .register_executor(NumericComparison::new(Comparison::Gte))
        .register_executor(NumericComparison::new(Comparison::Lt))
        .register_executor(NumericComparison::new(Comparison::Lte))
        .register_executor(StringMatch)
        .register_executor(Member)
        .register_executor(IsNull)
        .register_executor(SetOutcomeValue);

    for (condition, branches, fallback) in [
        (
            "responseCondition",
            ["responseIf", "responseElseIf"],
            "responseElse",
        ),
        ("outcomeCondition", ["outcomeIf", "outcomeElseIf"], "outcomeElse"),
    ] {
        registry
            .register_executor(Condition::new(condition))
            .register_executor(ConditionalBranch::new(branches[0]))
            .register_executor(ConditionalBranch::new(branches[1]))
            .register_executor(ElseBranch::new(fallback));
    }

    registry
        .register_calculator(Sum)
        .register_calculator(Product)
        .register_calculator(Subtract)
        .register_calculator(Divide)
        .register_calculator(Max)
        .register_calculator(Min)
        .register_calculator(MapResponse);
}

/// Run `node` through its registered executor.
///
/// Returns `None` when no executor handles the tag.
pub fn execute_node(node: &Node, ctx: &mut dyn ProcessingContext) -> Option<bool> {
    let executor = ctx.registry().executor(node.tag())?;
    tracing::debug!("processing {}", node.tag());
    Some(executor.execute(node, ctx))
}

/// Run a statement; unknown tags are logged and skipped.
pub fn execute_statement(node: &Node, ctx: &mut dyn ProcessingContext) {
    if execute_node(node, ctx).is_none() {
        ctx.log_error(format!(
            "Cannot find executor for tag-name: {}",
            node.tag()
        ));
    }
}

/// Evaluate a guard expression.
///
/// Executors decide directly. Value nodes (a boolean variable, a literal)
/// are read as booleans. Anything else is logged and counts as false.
pub fn evaluate_condition(node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
    if let Some(result) = execute_node(node, ctx) {
        return result;
    }
    if !ctx.registry().is_known(node.tag()) {
        ctx.log_error(format!(
            "Cannot find executor for tag-name: {}",
            node.tag()
        ));
        return false;
    }
    resolve_operand(node, &*ctx)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}
