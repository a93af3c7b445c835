//! Custom operators shipped with qtiscore.

use std::sync::Arc;

use crate::model::BaseValue;
use crate::traits::CustomOperator;

/// Definitions under which [`ParseCommaDecimal`] is registered.
pub const PARSE_COMMA_DECIMAL_DEFINITIONS: [&str; 2] =
    ["depcp:ParseCommaDecimal", "questify:ParseCommaDecimal"];

/// Rewrites a decimal comma to a decimal point (`"1,5"` becomes `"1.5"`).
pub struct ParseCommaDecimal {
    definition: String,
}

impl ParseCommaDecimal {
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
        }
    }
}

impl CustomOperator for ParseCommaDecimal {
    fn definition(&self) -> &str {
        &self.definition
    }

    fn apply(&self, value: BaseValue) -> BaseValue {
        BaseValue {
            values: value.values.iter().map(|v| v.replace(',', ".")).collect(),
            ..value
        }
    }
}

/// The custom operators available to every scoring run.
pub fn standard_custom_operators() -> Vec<Arc<dyn CustomOperator>> {
    PARSE_COMMA_DECIMAL_DEFINITIONS
        .iter()
        .map(|definition| Arc::new(ParseCommaDecimal::new(*definition)) as Arc<dyn CustomOperator>)
        .collect()
}

/// Look up a shipped custom operator by its definition.
pub fn custom_operator_by_definition(definition: &str) -> Option<Arc<dyn CustomOperator>> {
    standard_custom_operators()
        .into_iter()
        .find(|op| op.definition() == definition)
}

/// Overlay `extra` on `base`; an operator with the same definition replaces
/// the one in `base`.
pub fn merge(
    base: Vec<Arc<dyn CustomOperator>>,
    extra: &[Arc<dyn CustomOperator>],
) -> Vec<Arc<dyn CustomOperator>> {
    let mut merged: Vec<Arc<dyn CustomOperator>> = base
        .into_iter()
        .filter(|op| !extra.iter().any(|e| e.definition() == op.definition()))
        .collect();
    merged.extend(extra.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BaseType;

    struct Upper;

    impl CustomOperator for Upper {
        fn definition(&self) -> &str {
            "depcp:ParseCommaDecimal"
        }

        fn apply(&self, value: BaseValue) -> BaseValue {
            BaseValue {
                values: value.values.iter().map(|v| v.to_uppercase()).collect(),
                ..value
            }
        }
    }

    #[test]
    fn parse_comma_decimal_rewrites_every_value() {
        let operator = ParseCommaDecimal::new("questify:ParseCommaDecimal");
        let value = BaseValue::single(BaseType::String, "3,25").with_identifier("RESPONSE");
        let parsed = operator.apply(value);
        assert_eq!(parsed.first(), Some("3.25"));
        assert_eq!(parsed.identifier.as_deref(), Some("RESPONSE"));
        assert_eq!(parsed.as_number(), Some(3.25));
    }

    #[test]
    fn both_definitions_are_shipped() {
        for definition in PARSE_COMMA_DECIMAL_DEFINITIONS {
            assert!(custom_operator_by_definition(definition).is_some());
        }
        assert!(custom_operator_by_definition("acme:Other").is_none());
    }

    #[test]
    fn merge_replaces_same_definition() {
        let upper: Arc<dyn CustomOperator> = Arc::new(Upper);
        let merged = merge(standard_custom_operators(), &[upper]);
        assert_eq!(merged.len(), 2);
        let replaced = merged
            .iter()
            .find(|op| op.definition() == "depcp:ParseCommaDecimal")
            .unwrap();
        let value = replaced.apply(BaseValue::single(BaseType::String, "abc"));
        assert_eq!(value.first(), Some("ABC"));
    }
}
