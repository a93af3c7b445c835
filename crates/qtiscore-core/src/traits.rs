//! Operator traits.
//!
//! Executors and calculators are registered in the
//! [`OperatorRegistry`](crate::registry::OperatorRegistry) under the QTI tag
//! they handle. Custom operators are selected by their `definition` attribute.

use crate::context::ProcessingContext;
use crate::model::BaseValue;
use crate::node::Node;

// ---------------------------------------------------------------------------
// Executor trait
// ---------------------------------------------------------------------------

/// A boolean-valued rule node or a statement.
pub trait Executor: Send + Sync {
    /// Tag name this executor handles (e.g. "responseCondition").
    fn name(&self) -> &str;

    /// Evaluate `node`. Statements may write outcomes through `ctx`.
    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool;
}

// ---------------------------------------------------------------------------
// Calculator trait
// ---------------------------------------------------------------------------

/// A numeric operator. Calculators never write to the context.
pub trait Calculator: Send + Sync {
    /// Tag name this calculator handles (e.g. "sum").
    fn name(&self) -> &str;

    /// Compute the value of `node`.
    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64;
}

// ---------------------------------------------------------------------------
// Custom operator trait
// ---------------------------------------------------------------------------

/// Transforms values produced under a `customOperator` node.
pub trait CustomOperator: Send + Sync {
    /// Value of the `definition` attribute this operator answers to.
    fn definition(&self) -> &str;

    fn apply(&self, value: BaseValue) -> BaseValue;
}
