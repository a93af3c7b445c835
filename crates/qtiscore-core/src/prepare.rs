//! Test preparation: generated total and per-category score outcomes.

use crate::model::{AssessmentTest, OutcomeDeclaration};
use crate::node::Node;

pub const SCORE: &str = "SCORE";
pub const SCORE_TOTAL: &str = "SCORE_TOTAL";
pub const SCORE_TOTAL_WEIGHTED: &str = "SCORE_TOTAL_WEIGHTED";
pub const WEIGHT: &str = "WEIGHT";

impl AssessmentTest {
    /// Add `SCORE_TOTAL`, `SCORE_TOTAL_WEIGHTED` and their per-category
    /// variants. Outcomes that already have a `setOutcomeValue` are left alone.
    ///
    /// Returns the identifiers that were added.
    pub fn add_total_and_category_scores(&mut self) -> Vec<String> {
        let mut outcomes = vec![
            (SCORE_TOTAL.to_string(), None, Vec::new()),
            (SCORE_TOTAL_WEIGHTED.to_string(), Some(WEIGHT), Vec::new()),
        ];
        for category in self.categories() {
            outcomes.push((format!("{SCORE_TOTAL}_{category}"), None, vec![category.clone()]));
            outcomes.push((
                format!("{SCORE_TOTAL_WEIGHTED}_{category}"),
                Some(WEIGHT),
                vec![category],
            ));
        }

        let mut added = Vec::new();
        for (identifier, weight, include) in outcomes {
            if self.add_test_outcome(&identifier, weight, include) {
                added.push(identifier);
            }
        }
        if !added.is_empty() {
            tracing::debug!(test = %self.identifier, added = added.len(), "added total score outcomes");
        }
        added
    }

    /// Add one outcome summing item `SCORE`s, optionally weighted and
    /// restricted to categories.
    ///
    /// Returns `false` when a `setOutcomeValue` for `identifier` already exists.
    pub fn add_test_outcome(
        &mut self,
        identifier: &str,
        weight_identifier: Option<&str>,
        include_categories: Vec<String>,
    ) -> bool {
        if self.sets_outcome(identifier) {
            return false;
        }
        if self.outcome_declaration(identifier).is_none() {
            self.outcome_declarations
                .push(OutcomeDeclaration::float(identifier, 0.0));
        }
        let rule = Node::operator(
            "setOutcomeValue",
            vec![Node::operator(
                "sum",
                vec![Node::TestVariables {
                    variable_identifier: SCORE.to_string(),
                    weight_identifier: weight_identifier.map(str::to_string),
                    include_category: include_categories,
                    exclude_category: Vec::new(),
                }],
            )],
        )
        .with_attribute("identifier", identifier);
        self.outcome_processing.get_or_insert_with(Vec::new).push(rule);
        true
    }

    /// Whether outcome processing already assigns `identifier` somewhere.
    fn sets_outcome(&self, identifier: &str) -> bool {
        self.outcome_processing
            .iter()
            .flatten()
            .flat_map(Node::descendants)
            .any(|node| node.tag() == "setOutcomeValue" && node.identifier() == Some(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssessmentItemRef;

    fn test() -> AssessmentTest {
        AssessmentTest {
            identifier: "TEST".into(),
            item_refs: vec![
                AssessmentItemRef {
                    identifier: "I1".into(),
                    href: None,
                    categories: vec!["MATH".into()],
                    weights: vec![],
                },
                AssessmentItemRef {
                    identifier: "I2".into(),
                    href: None,
                    categories: vec!["MATH".into(), "GEO".into()],
                    weights: vec![],
                },
            ],
            outcome_declarations: vec![],
            outcome_processing: None,
        }
    }

    #[test]
    fn adds_totals_and_categories() {
        let mut test = test();
        let added = test.add_total_and_category_scores();
        assert_eq!(
            added,
            vec![
                "SCORE_TOTAL",
                "SCORE_TOTAL_WEIGHTED",
                "SCORE_TOTAL_MATH",
                "SCORE_TOTAL_WEIGHTED_MATH",
                "SCORE_TOTAL_GEO",
                "SCORE_TOTAL_WEIGHTED_GEO",
            ]
        );
        assert_eq!(test.outcome_declarations.len(), 6);
        assert_eq!(test.outcome_processing.as_ref().map(Vec::len), Some(6));
    }

    #[test]
    fn weighted_rule_names_the_weight() {
        let mut test = test();
        test.add_total_and_category_scores();
        let rules = test.outcome_processing.unwrap();
        let weighted = rules
            .iter()
            .find(|r| r.identifier() == Some("SCORE_TOTAL_WEIGHTED_GEO"))
            .unwrap();
        match weighted.descendants().last() {
            Some(Node::TestVariables {
                weight_identifier,
                include_category,
                ..
            }) => {
                assert_eq!(weight_identifier.as_deref(), Some("WEIGHT"));
                assert_eq!(include_category, &vec!["GEO".to_string()]);
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn existing_rules_are_kept() {
        let mut test = test();
        test.outcome_processing = Some(vec![Node::operator(
            "outcomeCondition",
            vec![Node::operator(
                "outcomeElse",
                vec![Node::operator("setOutcomeValue", vec![])
                    .with_attribute("identifier", "SCORE_TOTAL")],
            )],
        )]);
        assert!(!test.add_test_outcome("SCORE_TOTAL", None, vec![]));
        let added = test.add_total_and_category_scores();
        assert!(!added.contains(&"SCORE_TOTAL".to_string()));

        // second pass adds nothing
        assert!(test.add_total_and_category_scores().is_empty());
    }
}
