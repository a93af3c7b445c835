//! Scoring run summary with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logging::{LogLevel, LogRecord};
use crate::prepare::SCORE;
use crate::results::AssessmentResult;

/// Summary of one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Identifier of the test that was outcome-processed, if any.
    pub test: Option<String>,
    /// Number of item definitions used.
    pub item_count: usize,
    /// One entry per scored result document, in input order.
    pub candidates: Vec<CandidateSummary>,
    /// Diagnostics collected while scoring.
    #[serde(default)]
    pub diagnostics: Vec<LogRecord>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Scores of a single result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub candidate: String,
    /// Item identifier to its `SCORE` value.
    pub item_scores: BTreeMap<String, String>,
    /// Test outcome identifier to its first value.
    pub test_outcomes: BTreeMap<String, String>,
}

impl CandidateSummary {
    fn from_result(result: &AssessmentResult, index: usize, test: Option<&str>) -> Self {
        let item_scores = result
            .item_results
            .iter()
            .filter_map(|(id, item)| {
                let score = item.outcome_variables.get(SCORE)?.value()?;
                Some((id.clone(), score.to_string()))
            })
            .collect();
        let test_outcomes = test
            .and_then(|test| result.test_result(test))
            .map(|test_result| {
                test_result
                    .outcome_variables
                    .iter()
                    .filter_map(|(id, var)| Some((id.clone(), var.value()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            candidate: result.label(index),
            item_scores,
            test_outcomes,
        }
    }
}

impl ScoringReport {
    /// Summarize scored results.
    pub fn from_results(
        test: Option<&str>,
        item_count: usize,
        results: &[AssessmentResult],
        diagnostics: Vec<LogRecord>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            test: test.map(str::to_string),
            item_count,
            candidates: results
                .iter()
                .enumerate()
                .map(|(index, result)| CandidateSummary::from_result(result, index, test))
                .collect(),
            diagnostics,
            duration_ms,
        }
    }

    /// Number of diagnostics at `level`.
    pub fn diagnostic_count(&self, level: LogLevel) -> usize {
        self.diagnostics.iter().filter(|r| r.level == level).count()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}
