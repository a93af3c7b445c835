//! Numeric calculators.
//!
//! Every calculator follows the same steps: resolve the children, coerce each
//! value to a number (what does not parse is logged and counts as 0), reduce.

use crate::context::ProcessingContext;
use crate::model::parse_number;
use crate::node::Node;
use crate::resolve::resolve_children;
use crate::traits::Calculator;

/// Numbers produced by the children of `node`, in document order.
fn numbers(node: &Node, ctx: &dyn ProcessingContext, op: &str) -> Vec<f64> {
    let mut numbers = Vec::new();
    for value in resolve_children(node, ctx) {
        for text in &value.values {
            match parse_number(text) {
                Some(number) => numbers.push(number),
                None => {
                    ctx.log_error(format!(
                        "Cannot cast value: {text:?} of baseType: {} to a float to {op}",
                        value.base_type
                    ));
                    numbers.push(0.0);
                }
            }
        }
    }
    numbers
}

pub struct Sum;

impl Calculator for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        numbers(node, ctx, "sum").into_iter().sum()
    }
}

pub struct Product;

impl Calculator for Product {
    fn name(&self) -> &str {
        "product"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        let numbers = numbers(node, ctx, "product");
        if numbers.is_empty() {
            return 0.0;
        }
        numbers.into_iter().product()
    }
}

/// First value minus every following value.
pub struct Subtract;

impl Calculator for Subtract {
    fn name(&self) -> &str {
        "subtract"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        let numbers = numbers(node, ctx, "subtract");
        match numbers.split_first() {
            Some((first, rest)) => rest.iter().fold(*first, |acc, n| acc - n),
            None => 0.0,
        }
    }
}

/// First value divided by every following value. Division by zero yields 0.
pub struct Divide;

impl Calculator for Divide {
    fn name(&self) -> &str {
        "divide"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        let numbers = numbers(node, ctx, "divide");
        let Some((first, rest)) = numbers.split_first() else {
            return 0.0;
        };
        let mut result = *first;
        for divisor in rest {
            if *divisor == 0.0 {
                ctx.log_error("Cannot divide by zero".to_string());
                return 0.0;
            }
            result /= divisor;
        }
        result
    }
}

pub struct Max;

impl Calculator for Max {
    fn name(&self) -> &str {
        "max"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        numbers(node, ctx, "max")
            .into_iter()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }
}

pub struct Min;

impl Calculator for Min {
    fn name(&self) -> &str {
        "min"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        numbers(node, ctx, "min")
            .into_iter()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

/// `mapResponse`: the referenced response mapped through its declaration.
pub struct MapResponse;

impl Calculator for MapResponse {
    fn name(&self) -> &str {
        "mapResponse"
    }

    fn calculate(&self, node: &Node, ctx: &dyn ProcessingContext) -> f64 {
        let Some(identifier) = node.identifier() else {
            ctx.log_error("mapResponse without identifier".to_string());
            return 0.0;
        };
        let Some(mapping) = ctx
            .response_declaration(identifier)
            .and_then(|d| d.mapping.as_ref())
        else {
            ctx.log_error(format!("Cannot find mapping for response: {identifier}"));
            return 0.0;
        };
        match ctx.lookup_variable(identifier, None) {
            Some(value) => mapping.map_values(&value.values),
            None => 0.0,
        }
    }
}
