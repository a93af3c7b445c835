//! Batch orchestrator.
//!
//! Runs response processing for every item of every result, then outcome
//! processing for every result, either sequentially or with bounded
//! parallelism across results.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::error::ScoringError;
use crate::logging::{NullLogger, ScoreLogger};
use crate::model::{AssessmentItem, AssessmentTest};
use crate::operators::custom::{merge, standard_custom_operators};
use crate::outcome::OutcomeProcessor;
use crate::registry::OperatorRegistry;
use crate::response::ResponseProcessor;
use crate::results::AssessmentResult;
use crate::traits::CustomOperator;

/// Configuration for the scoring engine.
#[derive(Debug, Clone)]
pub struct ScoringEngineConfig {
    /// Maximum results processed concurrently when parallel processing is on.
    pub parallelism: usize,
}

impl Default for ScoringEngineConfig {
    fn default() -> Self {
        Self { parallelism: 4 }
    }
}

/// Inputs and results of one scoring call.
///
/// `assessment_results` are mutated in place and handed back to the caller.
#[derive(Default, Clone)]
pub struct ScoringContext {
    pub assessment_items: Arc<Vec<AssessmentItem>>,
    pub assessment_test: Option<Arc<AssessmentTest>>,
    pub assessment_results: Vec<AssessmentResult>,
    /// Merged over the shipped custom operators; same definition replaces.
    pub custom_operators: Vec<Arc<dyn CustomOperator>>,
    /// Defaults to [`NullLogger`].
    pub logger: Option<Arc<dyn ScoreLogger>>,
    pub process_parallel: bool,
}

impl ScoringContext {
    pub fn new(assessment_results: Vec<AssessmentResult>) -> Self {
        Self {
            assessment_results,
            ..Default::default()
        }
    }

    pub fn with_items(mut self, items: Vec<AssessmentItem>) -> Self {
        self.assessment_items = Arc::new(items);
        self
    }

    pub fn with_test(mut self, test: AssessmentTest) -> Self {
        self.assessment_test = Some(Arc::new(test));
        self
    }

    pub fn with_custom_operator(mut self, operator: Arc<dyn CustomOperator>) -> Self {
        self.custom_operators.push(operator);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ScoreLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn parallel(mut self, process_parallel: bool) -> Self {
        self.process_parallel = process_parallel;
        self
    }
}

/// The scoring engine. Holds the operator registry shared by every run.
pub struct ScoringEngine {
    registry: Arc<OperatorRegistry>,
    config: ScoringEngineConfig,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringEngineConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(config: ScoringEngineConfig) -> Self {
        Self::with_registry(OperatorRegistry::standard(), config)
    }

    pub fn with_registry(registry: OperatorRegistry, config: ScoringEngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Response-process every item of every result.
    pub async fn process_responses(&self, ctx: &mut ScoringContext) -> Result<(), ScoringError> {
        if ctx.assessment_items.is_empty() {
            return Err(ScoringError::MissingItems);
        }
        let items = Arc::clone(&ctx.assessment_items);
        let custom = Arc::new(merge(standard_custom_operators(), &ctx.custom_operators));

        self.fan_out(ctx, "response processing", move |registry, logger, result| {
            let processor =
                ResponseProcessor::new(registry, logger).with_custom_operators(&custom[..]);
            for item in items.iter() {
                processor.process(item, result);
            }
        })
        .await
    }

    /// Outcome-process every result against the test.
    pub async fn process_outcomes(&self, ctx: &mut ScoringContext) -> Result<(), ScoringError> {
        let Some(test) = ctx.assessment_test.clone() else {
            return Err(ScoringError::MissingTest);
        };

        self.fan_out(ctx, "outcome processing", move |registry, logger, result| {
            OutcomeProcessor::new(registry, logger).process(&test, result);
        })
        .await
    }

    /// Responses across the whole batch, then outcomes.
    ///
    /// Both inputs are checked before anything is mutated.
    pub async fn process_responses_and_outcomes(
        &self,
        ctx: &mut ScoringContext,
    ) -> Result<(), ScoringError> {
        if ctx.assessment_items.is_empty() {
            return Err(ScoringError::MissingItems);
        }
        if ctx.assessment_test.is_none() {
            return Err(ScoringError::MissingTest);
        }
        self.process_responses(ctx).await?;
        self.process_outcomes(ctx).await
    }

    /// Apply `work` to every result, sequentially or across blocking workers.
    ///
    /// Results keep their original order and the batch keeps its length. A
    /// result whose worker fails is handed back as it was before the call,
    /// and the first failure is returned once every result has been visited.
    async fn fan_out<F>(
        &self,
        ctx: &mut ScoringContext,
        label: &str,
        work: F,
    ) -> Result<(), ScoringError>
    where
        F: Fn(&OperatorRegistry, &dyn ScoreLogger, &mut AssessmentResult) + Send + Sync + 'static,
    {
        let start = Instant::now();
        let logger: Arc<dyn ScoreLogger> = ctx
            .logger
            .clone()
            .unwrap_or_else(|| Arc::new(NullLogger));
        let count = ctx.assessment_results.len();
        tracing::info!(results = count, parallel = ctx.process_parallel, "starting {label}");

        let mut failure = None;
        if ctx.process_parallel {
            let results = std::mem::take(&mut ctx.assessment_results);
            let (scored, first_failure) = self.run_parallel(results, logger, label, work).await;
            ctx.assessment_results = scored;
            failure = first_failure;
        } else {
            for result in &mut ctx.assessment_results {
                let original = result.clone();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    work(self.registry.as_ref(), logger.as_ref(), &mut *result)
                }));
                if let Err(payload) = outcome {
                    *result = original;
                    let e = ScoringError::Worker(panic_message(&*payload));
                    tracing::error!("{label} worker failed: {e}");
                    failure.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "finished {label}"
        );
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn run_parallel<F>(
        &self,
        results: Vec<AssessmentResult>,
        logger: Arc<dyn ScoreLogger>,
        label: &str,
        work: F,
    ) -> (Vec<AssessmentResult>, Option<ScoringError>)
    where
        F: Fn(&OperatorRegistry, &dyn ScoreLogger, &mut AssessmentResult) + Send + Sync + 'static,
    {
        let count = results.len();
        let work = Arc::new(work);
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut futures = FuturesUnordered::new();

        for (index, mut result) in results.into_iter().enumerate() {
            let work = Arc::clone(&work);
            let registry = Arc::clone(&self.registry);
            let logger = Arc::clone(&logger);
            let semaphore = Arc::clone(&semaphore);

            futures.push(async move {
                let original = result.clone();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let e = ScoringError::Worker("semaphore closed".to_string());
                    return (index, original, Some(e));
                };
                let handle = tokio::task::spawn_blocking(move || {
                    work(registry.as_ref(), logger.as_ref(), &mut result);
                    result
                });
                match handle.await {
                    Ok(scored) => (index, scored, None),
                    Err(e) => (index, original, Some(ScoringError::Worker(e.to_string()))),
                }
            });
        }

        let mut scored = Vec::with_capacity(count);
        let mut failure = None;
        while let Some((index, result, error)) = futures.next().await {
            if let Some(e) = error {
                tracing::error!("{label} worker failed: {e}");
                failure.get_or_insert(e);
            }
            scored.push((index, result));
        }
        scored.sort_by_key(|(index, _)| *index);
        (
            scored.into_iter().map(|(_, result)| result).collect(),
            failure,
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::model::{
        AssessmentItemRef, BaseType, BaseValue, Cardinality, OutcomeDeclaration,
        ResponseDeclaration,
    };
    use crate::node::Node;

    fn item(identifier: &str, correct: &str) -> AssessmentItem {
        AssessmentItem {
            identifier: identifier.into(),
            outcome_declarations: vec![OutcomeDeclaration::float("SCORE", 0.0)],
            response_declarations: vec![ResponseDeclaration {
                identifier: "RESPONSE".into(),
                base_type: BaseType::Identifier,
                cardinality: Cardinality::Single,
                correct_response: vec![correct.into()],
                mapping: None,
            }],
            response_processing: Some(vec![Node::operator(
                "responseCondition",
                vec![Node::operator(
                    "responseIf",
                    vec![
                        Node::operator(
                            "match",
                            vec![Node::variable("RESPONSE"), Node::correct("RESPONSE")],
                        ),
                        Node::operator(
                            "setOutcomeValue",
                            vec![Node::base_value(BaseType::Float, "1")],
                        )
                        .with_attribute("identifier", "SCORE"),
                    ],
                )],
            )]),
        }
    }

    fn test() -> AssessmentTest {
        AssessmentTest {
            identifier: "TEST".into(),
            item_refs: ["I1", "I2"]
                .iter()
                .map(|id| AssessmentItemRef {
                    identifier: id.to_string(),
                    href: None,
                    categories: vec![],
                    weights: vec![],
                })
                .collect(),
            outcome_declarations: vec![OutcomeDeclaration::float("SCORE_TOTAL", 0.0)],
            outcome_processing: Some(vec![Node::operator(
                "setOutcomeValue",
                vec![Node::operator("sum", vec![Node::test_variables("SCORE")])],
            )
            .with_attribute("identifier", "SCORE_TOTAL")]),
        }
    }

    fn results(n: usize) -> Vec<AssessmentResult> {
        (0..n)
            .map(|i| {
                let mut result = AssessmentResult::new(format!("cand-{i}"));
                result.set_response("I1", "RESPONSE", vec!["A".into()]);
                let second = if i % 2 == 0 { "B" } else { "C" };
                result.set_response("I2", "RESPONSE", vec![second.into()]);
                result
            })
            .collect()
    }

    fn context(n: usize) -> ScoringContext {
        ScoringContext::new(results(n))
            .with_items(vec![item("I1", "A"), item("I2", "B")])
            .with_test(test())
    }

    #[tokio::test]
    async fn scores_whole_batch() {
        let engine = ScoringEngine::default();
        let mut ctx = context(4);
        engine.process_responses_and_outcomes(&mut ctx).await.unwrap();

        let totals: Vec<&str> = ctx
            .assessment_results
            .iter()
            .filter_map(|r| r.test_outcome_value("TEST", "SCORE_TOTAL"))
            .collect();
        assert_eq!(totals, vec!["2", "1", "2", "1"]);
    }

    #[tokio::test]
    async fn parallel_matches_sequential_and_keeps_order() {
        let engine = ScoringEngine::new(ScoringEngineConfig { parallelism: 3 });
        let mut sequential = context(17);
        let mut parallel = context(17).parallel(true);
        engine
            .process_responses_and_outcomes(&mut sequential)
            .await
            .unwrap();
        engine
            .process_responses_and_outcomes(&mut parallel)
            .await
            .unwrap();
        assert_eq!(sequential.assessment_results, parallel.assessment_results);
    }

    #[tokio::test]
    async fn missing_inputs_are_configuration_errors() {
        let engine = ScoringEngine::default();

        let mut no_items = ScoringContext::new(results(1)).with_test(test());
        let err = engine.process_responses(&mut no_items).await.unwrap_err();
        assert!(matches!(err, ScoringError::MissingItems));

        let mut no_test = context(1);
        no_test.assessment_test = None;
        let err = engine.process_outcomes(&mut no_test).await.unwrap_err();
        assert!(matches!(err, ScoringError::MissingTest));

        let before = no_test.assessment_results.clone();
        let err = engine
            .process_responses_and_outcomes(&mut no_test)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::MissingTest));
        assert_eq!(no_test.assessment_results, before);
    }

    #[tokio::test]
    async fn diagnostics_reach_the_supplied_logger() {
        let engine = ScoringEngine::default();
        let logger = Arc::new(MemoryLogger::new());
        let mut ctx = context(1).with_logger(logger.clone());
        ctx.assessment_results[0].item_results.remove("I2");
        engine.process_responses(&mut ctx).await.unwrap();
        assert!(logger.contains(LogLevel::Warn, "Skipping ResponseProcessing"));
        assert_eq!(logger.records()[0].candidate.as_deref(), Some("cand-0"));
    }

    struct Explode;

    impl CustomOperator for Explode {
        fn definition(&self) -> &str {
            "test:Explode"
        }

        fn apply(&self, _: BaseValue) -> BaseValue {
            panic!("custom operator failure");
        }
    }

    fn exploding_context(n: usize) -> ScoringContext {
        let mut exploding = item("I1", "A");
        exploding.response_processing = Some(vec![Node::operator(
            "setOutcomeValue",
            vec![Node::operator(
                "customOperator",
                vec![Node::base_value(BaseType::String, "x")],
            )
            .with_attribute("definition", "test:Explode")],
        )
        .with_attribute("identifier", "SCORE")]);
        ScoringContext::new(results(n))
            .with_items(vec![exploding])
            .with_custom_operator(Arc::new(Explode))
    }

    #[tokio::test]
    async fn panicking_worker_surfaces_as_worker_error() {
        let engine = ScoringEngine::default();
        let mut ctx = exploding_context(2).parallel(true);
        let before = ctx.assessment_results.clone();
        let err = engine.process_responses(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ScoringError::Worker(_)));
        assert!(!err.is_configuration());
        assert_eq!(ctx.assessment_results, before);
    }

    #[tokio::test]
    async fn sequential_panic_keeps_the_batch() {
        let engine = ScoringEngine::default();
        let mut ctx = exploding_context(3);
        let before = ctx.assessment_results.clone();
        let err = engine.process_responses(&mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("custom operator failure"));
        assert_eq!(ctx.assessment_results, before);
    }
}
