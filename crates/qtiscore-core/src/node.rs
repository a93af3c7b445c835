//! The rule tree.
//!
//! A `responseProcessing` or `outcomeProcessing` block is a list of [`Node`]s.
//! Leaf nodes that produce values have their own variants; everything else is
//! an [`Node::Operator`] named by its QTI tag and dispatched through the
//! [`OperatorRegistry`](crate::registry::OperatorRegistry).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::BaseType;

/// A node of a processing rule tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// Literal value (`<baseValue>`).
    #[serde(rename_all = "camelCase")]
    BaseValue {
        #[serde(default)]
        base_type: BaseType,
        value: String,
    },
    /// Reference to a variable (`<variable>`).
    #[serde(rename_all = "camelCase")]
    Variable {
        identifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_identifier: Option<String>,
    },
    /// Correct response of a response declaration (`<correct>`).
    #[serde(rename_all = "camelCase")]
    Correct { identifier: String },
    /// Aggregate of an outcome across the test's items (`<testVariables>`).
    #[serde(rename_all = "camelCase")]
    TestVariables {
        variable_identifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_identifier: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        include_category: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        exclude_category: Vec<String>,
    },
    /// Any other element, identified by its tag name.
    #[serde(rename_all = "camelCase")]
    Operator {
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Node>,
    },
}

impl Node {
    pub fn base_value(base_type: BaseType, value: impl Into<String>) -> Self {
        Node::BaseValue {
            base_type,
            value: value.into(),
        }
    }

    pub fn variable(identifier: impl Into<String>) -> Self {
        Node::Variable {
            identifier: identifier.into(),
            weight_identifier: None,
        }
    }

    pub fn weighted_variable(identifier: impl Into<String>, weight: impl Into<String>) -> Self {
        Node::Variable {
            identifier: identifier.into(),
            weight_identifier: Some(weight.into()),
        }
    }

    pub fn correct(identifier: impl Into<String>) -> Self {
        Node::Correct {
            identifier: identifier.into(),
        }
    }

    pub fn test_variables(variable_identifier: impl Into<String>) -> Self {
        Node::TestVariables {
            variable_identifier: variable_identifier.into(),
            weight_identifier: None,
            include_category: Vec::new(),
            exclude_category: Vec::new(),
        }
    }

    pub fn operator(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Operator {
            name: name.into(),
            attributes: BTreeMap::new(),
            children,
        }
    }

    /// Add an attribute. No-op on non-operator nodes.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Node::Operator { attributes, .. } = &mut self {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    /// The QTI tag name of this node.
    pub fn tag(&self) -> &str {
        match self {
            Node::BaseValue { .. } => "baseValue",
            Node::Variable { .. } => "variable",
            Node::Correct { .. } => "correct",
            Node::TestVariables { .. } => "testVariables",
            Node::Operator { name, .. } => name,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Operator { children, .. } => children,
            _ => &[],
        }
    }

    /// Look up an attribute, ignoring case of the key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            Node::Operator { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// The identifier this node refers to or writes.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Node::Variable { identifier, .. } | Node::Correct { identifier } => Some(identifier),
            Node::TestVariables {
                variable_identifier,
                ..
            } => Some(variable_identifier),
            Node::Operator { .. } => self.attribute("identifier"),
            Node::BaseValue { .. } => None,
        }
    }

    /// Pre-order walk over this node and everything below it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Iterator returned by [`Node::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}
