//! Boolean connectives.

use crate::context::ProcessingContext;
use crate::node::Node;
use crate::traits::Executor;

use super::evaluate_condition;

/// True when every child is true. Stops at the first false child.
pub struct And;

impl Executor for And {
    fn name(&self) -> &str {
        "and"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        for child in node.children() {
            if !evaluate_condition(child, ctx) {
                return false;
            }
        }
        true
    }
}

/// True when any child is true. Stops at the first true child.
pub struct Or;

impl Executor for Or {
    fn name(&self) -> &str {
        "or"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        for child in node.children() {
            if evaluate_condition(child, ctx) {
                return true;
            }
        }
        false
    }
}

pub struct Not;

impl Executor for Not {
    fn name(&self) -> &str {
        "not"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        match node.children() {
            [child] => !evaluate_condition(child, ctx),
            children => {
                ctx.log_error(format!(
                    "not expects exactly one child, found {}",
                    children.len()
                ));
                false
            }
        }
    }
}
