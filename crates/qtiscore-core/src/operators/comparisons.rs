//! Comparison executors.
//!
//! Operands are resolved through [`resolve_operand`] and compared according
//! to the base type of the first operand: numerically for `float` and
//! `integer`, by exact text otherwise.

use crate::context::ProcessingContext;
use crate::model::{BaseValue, Cardinality};
use crate::node::Node;
use crate::resolve::resolve_operand;
use crate::traits::Executor;

/// Resolve the two operands of a binary comparison.
fn operands(node: &Node, ctx: &dyn ProcessingContext) -> Option<(BaseValue, BaseValue)> {
    let [left, right] = node.children() else {
        ctx.log_error(format!(
            "{} expects two operands, found {}",
            node.tag(),
            node.children().len()
        ));
        return None;
    };
    Some((resolve_operand(left, ctx)?, resolve_operand(right, ctx)?))
}

/// Numbers compare by value, everything else by exact text.
fn scalar_eq(numeric: bool, left: &str, right: &str) -> bool {
    if numeric {
        if let (Some(l), Some(r)) = (
            crate::model::parse_number(left),
            crate::model::parse_number(right),
        ) {
            return l == r;
        }
    }
    left == right
}

/// Unordered comparison: every value pairs with exactly one value on the other side.
fn multiset_eq(numeric: bool, left: &[String], right: &[String]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut used = vec![false; right.len()];
    left.iter().all(|l| {
        let found = right
            .iter()
            .enumerate()
            .find(|(i, r)| !used[*i] && scalar_eq(numeric, l, r))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Whether two values match under QTI `match` semantics.
pub fn values_match(left: &BaseValue, right: &BaseValue) -> bool {
    let numeric = left.base_type.is_numeric();
    let container = |c: Cardinality| matches!(c, Cardinality::Multiple | Cardinality::Ordered);
    if left.cardinality == Cardinality::Ordered || right.cardinality == Cardinality::Ordered {
        left.values.len() == right.values.len()
            && left
                .values
                .iter()
                .zip(&right.values)
                .all(|(l, r)| scalar_eq(numeric, l, r))
    } else if container(left.cardinality) || container(right.cardinality) {
        multiset_eq(numeric, &left.values, &right.values)
    } else {
        match (left.first(), right.first()) {
            (Some(l), Some(r)) => scalar_eq(numeric, l, r),
            _ => false,
        }
    }
}

/// `match`: equality by base type and cardinality. NULL never matches.
pub struct Match;

impl Executor for Match {
    fn name(&self) -> &str {
        "match"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        let Some((left, right)) = operands(node, &*ctx) else {
            return false;
        };
        if left.is_null() || right.is_null() {
            return false;
        }
        values_match(&left, &right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn tag(&self) -> &'static str {
        match self {
            Comparison::Equal => "equal",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
        }
    }

    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Equal => left == right,
            Comparison::Gt => left > right,
            Comparison::Gte => left >= right,
            Comparison::Lt => left < right,
            Comparison::Lte => left <= right,
        }
    }
}

/// `equal`, `gt`, `gte`, `lt` and `lte` on numeric operands.
pub struct NumericComparison {
    comparison: Comparison,
}

impl NumericComparison {
    pub fn new(comparison: Comparison) -> Self {
        Self { comparison }
    }
}

impl Executor for NumericComparison {
    fn name(&self) -> &str {
        self.comparison.tag()
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        let Some((left, right)) = operands(node, &*ctx) else {
            return false;
        };
        match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => self.comparison.holds(l, r),
            _ => {
                ctx.log_error(format!(
                    "Cannot compare {:?} and {:?} in {}: not numeric",
                    left.first().unwrap_or_default(),
                    right.first().unwrap_or_default(),
                    self.comparison.tag()
                ));
                false
            }
        }
    }
}

/// `stringMatch`, honouring the `caseSensitive` and `substring` attributes.
pub struct StringMatch;

impl Executor for StringMatch {
    fn name(&self) -> &str {
        "stringMatch"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        let Some((left, right)) = operands(node, &*ctx) else {
            return false;
        };
        let (Some(l), Some(r)) = (left.first(), right.first()) else {
            return false;
        };
        let flag = |name: &str, default: bool| {
            node.attribute(name)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        let (l, r) = if flag("caseSensitive", true) {
            (l.to_string(), r.to_string())
        } else {
            (l.to_lowercase(), r.to_lowercase())
        };
        if flag("substring", false) {
            l.contains(&r)
        } else {
            l == r
        }
    }
}

/// `member`: the first operand's value occurs among the second's values.
pub struct Member;

impl Executor for Member {
    fn name(&self) -> &str {
        "member"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        let Some((needle, haystack)) = operands(node, &*ctx) else {
            return false;
        };
        let Some(needle_value) = needle.first().filter(|_| !needle.is_null()) else {
            return false;
        };
        let numeric = needle.base_type.is_numeric();
        haystack
            .values
            .iter()
            .any(|value| scalar_eq(numeric, needle_value, value))
    }
}

/// `isNull`: the operand has no values or only empty ones.
pub struct IsNull;

impl Executor for IsNull {
    fn name(&self) -> &str {
        "isNull"
    }

    fn execute(&self, node: &Node, ctx: &mut dyn ProcessingContext) -> bool {
        match node.children().first() {
            Some(child) => resolve_operand(child, &*ctx)
                .map(|value| value.is_null())
                .unwrap_or(true),
            None => true,
        }
    }
}
