//! QTI 2.2 `assessmentResult` XML output.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use qtiscore_core::model::{BaseType, Cardinality};
use qtiscore_core::results::AssessmentResult;

pub const RESULT_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imsqti_result_v2p2";

/// Escape a string for safe XML text and attribute insertion.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn variable_open(tag: &str, identifier: &str, cardinality: Cardinality, base_type: BaseType) -> String {
    format!(
        "<{tag} identifier=\"{}\" cardinality=\"{}\" baseType=\"{}\">",
        xml_escape(identifier),
        cardinality.as_str(),
        base_type.as_str()
    )
}

fn push_values(xml: &mut String, indent: &str, values: &[String]) {
    for value in values {
        xml.push_str(&format!("{indent}<value>{}</value>\n", xml_escape(value)));
    }
}

/// Render a result document as QTI `assessmentResult` XML.
///
/// Every response and outcome variable in `result` appears in the output, in
/// identifier order. `datestamp` is stamped on each test and item result.
pub fn render_assessment_result(result: &AssessmentResult, datestamp: DateTime<Utc>) -> String {
    let stamp = datestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<assessmentResult xmlns=\"{RESULT_NAMESPACE}\">\n"));

    match &result.candidate {
        Some(candidate) => xml.push_str(&format!(
            "  <context sourcedId=\"{}\"/>\n",
            xml_escape(candidate)
        )),
        None => xml.push_str("  <context/>\n"),
    }

    for test_result in result.test_results.values() {
        xml.push_str(&format!(
            "  <testResult identifier=\"{}\" datestamp=\"{stamp}\">\n",
            xml_escape(&test_result.identifier)
        ));
        for outcome in test_result.outcome_variables.values() {
            xml.push_str("    ");
            xml.push_str(&variable_open(
                "outcomeVariable",
                &outcome.identifier,
                outcome.cardinality,
                outcome.base_type,
            ));
            xml.push('\n');
            push_values(&mut xml, "      ", &outcome.values);
            xml.push_str("    </outcomeVariable>\n");
        }
        xml.push_str("  </testResult>\n");
    }

    for item_result in result.item_results.values() {
        xml.push_str(&format!(
            "  <itemResult identifier=\"{}\" datestamp=\"{stamp}\" sessionStatus=\"final\">\n",
            xml_escape(&item_result.identifier)
        ));
        for response in item_result.response_variables.values() {
            xml.push_str("    ");
            xml.push_str(&variable_open(
                "responseVariable",
                &response.identifier,
                response.cardinality,
                response.base_type,
            ));
            xml.push_str("\n      <candidateResponse>\n");
            push_values(&mut xml, "        ", &response.values);
            xml.push_str("      </candidateResponse>\n    </responseVariable>\n");
        }
        for outcome in item_result.outcome_variables.values() {
            xml.push_str("    ");
            xml.push_str(&variable_open(
                "outcomeVariable",
                &outcome.identifier,
                outcome.cardinality,
                outcome.base_type,
            ));
            xml.push('\n');
            push_values(&mut xml, "      ", &outcome.values);
            xml.push_str("    </outcomeVariable>\n");
        }
        xml.push_str("  </itemResult>\n");
    }

    xml.push_str("</assessmentResult>\n");
    xml
}

/// Write a result document as QTI XML.
pub fn write_xml_result(result: &AssessmentResult, path: &Path) -> Result<()> {
    let xml = render_assessment_result(result, Utc::now());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, xml)
        .with_context(|| format!("failed to write result XML to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use qtiscore_core::model::{OutcomeVariable, ResponseVariable};
    use qtiscore_core::results::ItemResult;

    fn scored() -> AssessmentResult {
        AssessmentResult::new("anna & co").with_item_result(
            ItemResult::new("ITM-1")
                .with_response(ResponseVariable {
                    identifier: "RESPONSE".into(),
                    base_type: BaseType::Identifier,
                    cardinality: Cardinality::Multiple,
                    values: vec!["A".into(), "<B>".into()],
                })
                .with_outcome(OutcomeVariable {
                    identifier: "SCORE".into(),
                    base_type: BaseType::Float,
                    cardinality: Cardinality::Single,
                    values: vec!["1".into()],
                }),
        )
    }

    #[test]
    fn renders_variables_with_attributes() {
        let stamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let xml = render_assessment_result(&scored(), stamp);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<context sourcedId=\"anna &amp; co\"/>"));
        assert!(xml.contains(
            "<itemResult identifier=\"ITM-1\" datestamp=\"2024-03-01T12:00:00Z\" sessionStatus=\"final\">"
        ));
        assert!(xml.contains(
            "<responseVariable identifier=\"RESPONSE\" cardinality=\"multiple\" baseType=\"identifier\">"
        ));
        assert!(xml.contains("<value>&lt;B&gt;</value>"));
        assert!(xml.contains(
            "<outcomeVariable identifier=\"SCORE\" cardinality=\"single\" baseType=\"float\">"
        ));
        assert!(xml.trim_end().ends_with("</assessmentResult>"));
    }

    #[test]
    fn anonymous_result_has_empty_context() {
        let mut result = scored();
        result.candidate = None;
        let xml = render_assessment_result(&result, Utc::now());
        assert!(xml.contains("<context/>"));
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("anna.xml");
        write_xml_result(&scored(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(RESULT_NAMESPACE));
    }
}
