//! Statements: conditional blocks and outcome assignment.
//!
//! The same executors serve response and outcome processing; only the tag
//! names differ (`responseIf` vs `outcomeIf`).

use crate::context::ProcessingContext;
use crate::model::BaseValue;
use crate::node::Node;
use crate::resolve::resolve_operand;
use crate::traits::Executor;

use super::{evaluate_condition, execute_node, execute_statement};

/// `responseCondition` / `outcomeCondition`: runs the first branch that fires.
pub struct Condition {
    name: &'static str,
}

impl Condition {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Executor for Condition {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        for branch in node.children() {
            match execute_node(branch, ctx) {
                Some(true) => return true,
                Some(false) => {}
                None => ctx.log_error(format!(
                    "Cannot find executor for tag-name: {} in {}",
                    branch.tag(),
                    self.name
                )),
            }
        }
        false
    }
}

/// `responseIf`, `responseElseIf` and their outcome counterparts.
///
/// The first child is the guard, the rest is the body. Returns whether the
/// branch fired.
pub struct ConditionalBranch {
    name: &'static str,
}

impl ConditionalBranch {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Executor for ConditionalBranch {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        let Some((guard, body)) = node.children().split_first() else {
            ctx.log_error(format!("{} without a condition", self.name));
            return false;
        };
        if !evaluate_condition(guard, ctx) {
            return false;
        }
        for statement in body {
            execute_statement(statement, ctx);
        }
        true
    }
}

/// `responseElse` / `outcomeElse`: always fires.
pub struct ElseBranch {
    name: &'static str,
}

impl ElseBranch {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Executor for ElseBranch {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        for statement in node.children() {
            execute_statement(statement, ctx);
        }
        true
    }
}

/// `setOutcomeValue`: writes its evaluated child to the named outcome.
pub struct SetOutcomeValue;

impl SetOutcomeValue {
    /// Executors yield booleans; everything else goes through resolution.
    fn evaluate(child: &Node, ctx: &mut dyn ProcessingContext) -> Option<BaseValue> {
        if let Some(result) = execute_node(child, ctx) {
            return Some(BaseValue::boolean(result));
        }
        resolve_operand(child, &*ctx)
    }
}

impl Executor for SetOutcomeValue {
    fn name(&self) -> &str {
        "setOutcomeValue"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        let Some(identifier) = node.identifier() else {
            ctx.log_error("setOutcomeValue without identifier".to_string());
            return false;
        };
        let Some(child) = node.children().first() else {
            ctx.log_error(format!("setOutcomeValue {identifier} has no expression"));
            return false;
        };
        match Self::evaluate(child, ctx) {
            Some(value) => {
                ctx.set_outcome_value(identifier, value);
                true
            }
            None => {
                ctx.log_error(format!(
                    "setOutcomeValue {identifier}: expression produced no value"
                ));
                false
            }
        }
    }
}
