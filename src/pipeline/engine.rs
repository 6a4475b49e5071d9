//! Generation engine: one completion call per source example.
//!
//! Epistemic foundation:
//! - K_i: Output order = input order minus failures
//! - K_i: Every record carries the transition's (from, to) labels
//! - B_i: Each call may fail → logged, dropped, counted; never aborts the batch
//! - I^R: The pause after each attempt comes from config via the RateLimiter

use crate::client::{CompletionService, RateLimiter};
use crate::models::{ContrastRecord, ServiceCallError, SourceExample, TransitionStats};
use crate::prompt::LabelTransition;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Optional check applied to every trimmed completion before it becomes a
/// record. A rejection drops the example like a service failure.
pub trait PerturbationCheck: Send + Sync {
    fn check(&self, example: &SourceExample, perturbed: &str) -> Result<(), String>;
}

/// Rejects completions that are empty after trimming.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyCheck;

impl PerturbationCheck for NonEmptyCheck {
    fn check(&self, _example: &SourceExample, perturbed: &str) -> Result<(), String> {
        if perturbed.is_empty() {
            Err("empty completion".to_string())
        } else {
            Ok(())
        }
    }
}

/// An example that produced no record.
#[derive(Debug)]
pub struct GenerationFailure {
    /// Position in the input batch
    pub index: usize,
    pub example: SourceExample,
    pub error: ServiceCallError,
}

/// Result of running one transition over a batch.
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    pub records: Vec<ContrastRecord>,
    pub failures: Vec<GenerationFailure>,
    pub stats: TransitionStats,
}

/// Sequential generation engine.
pub struct GenerationEngine {
    service: Arc<dyn CompletionService>,
    limiter: Arc<RateLimiter>,
    check: Option<Arc<dyn PerturbationCheck>>,
    show_progress: bool,
}

impl GenerationEngine {
    pub fn new(service: Arc<dyn CompletionService>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            service,
            limiter,
            check: None,
            show_progress: false,
        }
    }

    /// Install a validation hook.
    pub fn with_check(mut self, check: Arc<dyn PerturbationCheck>) -> Self {
        self.check = Some(check);
        self
    }

    /// Draw an indicatif progress bar per batch.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: usize, transition: &LabelTransition) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb.set_message(transition.name());
        pb
    }

    /// Perturb every example toward `transition.to()`.
    pub async fn generate(
        &self,
        examples: &[SourceExample],
        transition: &LabelTransition,
    ) -> GenerationOutcome {
        let mut outcome = GenerationOutcome {
            records: Vec::with_capacity(examples.len()),
            failures: Vec::new(),
            stats: TransitionStats {
                requested: examples.len(),
                ..Default::default()
            },
        };

        info!(
            transition = %transition.name(),
            examples = examples.len(),
            "Generating contrast examples"
        );

        let pb = self.progress_bar(examples.len(), transition);

        for (index, example) in examples.iter().enumerate() {
            match self.perturb(example, transition).await {
                Ok(record) => {
                    outcome.records.push(record);
                    outcome.stats.produced += 1;
                }
                Err(error) => {
                    warn!(
                        transition = %transition.name(),
                        index,
                        premise = %example.premise,
                        hypothesis = %example.hypothesis,
                        error = %error,
                        "Dropping example"
                    );
                    if matches!(error, ServiceCallError::Rejected(_)) {
                        outcome.stats.rejected += 1;
                    } else {
                        outcome.stats.failed += 1;
                    }
                    outcome.failures.push(GenerationFailure {
                        index,
                        example: example.clone(),
                        error,
                    });
                }
            }

            self.limiter.pause_after_attempt().await;

            pb.inc(1);
            pb.set_message(format!(
                "{} ok: {}, dropped: {}",
                transition.name(),
                outcome.stats.produced,
                outcome.stats.dropped()
            ));
        }

        pb.finish_and_clear();

        info!(
            transition = %transition.name(),
            requested = outcome.stats.requested,
            produced = outcome.stats.produced,
            dropped = outcome.stats.dropped(),
            "Transition complete"
        );

        outcome
    }

    async fn perturb(
        &self,
        example: &SourceExample,
        transition: &LabelTransition,
    ) -> Result<ContrastRecord, ServiceCallError> {
        let prompt = transition.render(&example.premise, &example.hypothesis);
        let completion = self.service.complete(&prompt).await?;
        let perturbed = completion.text.trim();

        if let Some(check) = &self.check {
            check
                .check(example, perturbed)
                .map_err(ServiceCallError::Rejected)?;
        }

        debug!(
            transition = %transition.name(),
            perturbed,
            "Received perturbation"
        );

        Ok(ContrastRecord::new(
            example,
            transition.from(),
            transition.to(),
            perturbed.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedService;
    use crate::models::{EditStrictness, Label};
    use std::time::Duration;

    fn transition(from: Label, to: Label) -> LabelTransition {
        LabelTransition::new(from, to, EditStrictness::Minimal).unwrap()
    }

    fn examples(n: usize, label: Label) -> Vec<SourceExample> {
        (0..n)
            .map(|i| SourceExample::new(format!("premise {i}"), format!("hypothesis {i}"), label))
            .collect()
    }

    fn engine(service: Arc<ScriptedService>) -> GenerationEngine {
        GenerationEngine::new(service, Arc::new(RateLimiter::default()))
    }

    #[tokio::test]
    async fn test_scenario_contradiction_to_entailment() {
        let service = Arc::new(ScriptedService::constant("  A man is moving.\n"));
        let engine = engine(Arc::clone(&service));
        let example = SourceExample::new(
            "A man is running.",
            "A man is sleeping.",
            Label::Contradiction,
        );

        let outcome = engine
            .generate(
                &[example],
                &transition(Label::Contradiction, Label::Entailment),
            )
            .await;

        let prompts = service.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("A man is running."));
        assert!(prompts[0].contains("A man is sleeping."));

        assert_eq!(
            outcome.records,
            vec![ContrastRecord {
                premise: "A man is running.".to_string(),
                original_hypothesis: "A man is sleeping.".to_string(),
                perturbed_hypothesis: "A man is moving.".to_string(),
                original_label: Label::Contradiction,
                new_label: Label::Entailment,
            }]
        );
        assert_eq!(
            serde_json::to_string(&outcome.records[0].normalize()).unwrap(),
            r#"{"premise":"A man is running.","hypothesis":"A man is moving.","label":0}"#
        );
    }

    #[tokio::test]
    async fn test_single_failure_is_contained() {
        let service = Arc::new(ScriptedService::new(|index, _| {
            if index == 2 {
                Err(ServiceCallError::Timeout(Duration::from_secs(60)))
            } else {
                Ok(format!("perturbed {index}"))
            }
        }));
        let engine = engine(Arc::clone(&service));
        let input = examples(5, Label::Entailment);

        let outcome = engine
            .generate(&input, &transition(Label::Entailment, Label::Neutral))
            .await;

        assert_eq!(service.prompts().len(), 5);
        assert_eq!(outcome.records.len(), 4);
        assert!(outcome.records.iter().all(|r| r.premise != "premise 2"));
        let premises: Vec<_> = outcome.records.iter().map(|r| r.premise.as_str()).collect();
        assert_eq!(premises, ["premise 0", "premise 1", "premise 3", "premise 4"]);

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 2);
        assert_eq!(outcome.stats.requested, 5);
        assert_eq!(outcome.stats.produced, 4);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.stats.rejected, 0);
    }

    #[tokio::test]
    async fn test_records_carry_transition_labels() {
        let engine = engine(Arc::new(ScriptedService::constant("x")));
        let t = transition(Label::Neutral, Label::Contradiction);
        let outcome = engine.generate(&examples(3, Label::Neutral), &t).await;

        assert_eq!(outcome.records.len(), 3);
        for record in &outcome.records {
            assert_eq!(record.original_label, t.from());
            assert_eq!(record.new_label, t.to());
        }
    }

    #[tokio::test]
    async fn test_every_call_failing_yields_empty_batch() {
        let engine = engine(Arc::new(ScriptedService::new(|_, _| {
            Err(ServiceCallError::InvalidResponse("no content".to_string()))
        })));
        let outcome = engine
            .generate(
                &examples(3, Label::Entailment),
                &transition(Label::Entailment, Label::Contradiction),
            )
            .await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.failed, 3);
    }

    #[tokio::test]
    async fn test_check_rejects_empty_completion() {
        let service = Arc::new(ScriptedService::new(|index, _| {
            Ok(if index == 0 { "   ".to_string() } else { "ok".to_string() })
        }));
        let engine = engine(service).with_check(Arc::new(NonEmptyCheck));
        let outcome = engine
            .generate(
                &examples(2, Label::Entailment),
                &transition(Label::Entailment, Label::Contradiction),
            )
            .await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.stats.rejected, 1);
        assert_eq!(outcome.stats.failed, 0);
        assert!(matches!(
            outcome.failures[0].error,
            ServiceCallError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_completion_kept_without_check() {
        let engine = engine(Arc::new(ScriptedService::constant("")));
        let outcome = engine
            .generate(
                &examples(1, Label::Entailment),
                &transition(Label::Entailment, Label::Contradiction),
            )
            .await;
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].perturbed_hypothesis, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_follows_every_attempt() {
        let service = Arc::new(ScriptedService::new(|index, _| {
            if index % 2 == 0 {
                Ok("ok".to_string())
            } else {
                Err(ServiceCallError::Api {
                    status: 500,
                    message: "internal".to_string(),
                })
            }
        }));
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2)));
        let engine = GenerationEngine::new(service, Arc::clone(&limiter));

        let start = tokio::time::Instant::now();
        let outcome = engine
            .generate(
                &examples(4, Label::Neutral),
                &transition(Label::Neutral, Label::Entailment),
            )
            .await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert_eq!(limiter.stats().total_attempts, 4);
    }
}
