use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::field::Empty;
use tracing::{info, instrument, warn, Span};

use crate::prompt::attributes::resolve;
use crate::prompt::backend::{synthesize_via_backend, PromptBackend, SynthesisError};
use crate::prompt::classifier::ClassifierTable;
use crate::prompt::fallback::synthesize_fallback;
use crate::prompt::types::{
    assemble_prompts, AttributeLayer, GenerationOutcome, PromptComponents,
    PromptGenerationResult, PromptSource,
};
use crate::utils::timing::GenerationTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Awaited between attempts, not after the last one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_secs(1),
        }
    }
}

enum AttemptLoop {
    Succeeded(PromptComponents),
    Exhausted,
    Cancelled,
}

/// Resolves, classifies and synthesizes prompts for one product per call.
///
/// Holds only read-only configuration, so one instance can serve any number of
/// concurrent requests.
pub struct PromptGenerator {
    backend: Option<Arc<dyn PromptBackend>>,
    table: ClassifierTable,
    retry: RetryPolicy,
}

impl PromptGenerator {
    pub fn new(
        backend: Option<Arc<dyn PromptBackend>>,
        table: ClassifierTable,
        retry: RetryPolicy,
    ) -> Self {
        PromptGenerator {
            backend,
            table,
            retry,
        }
    }

    /// Deterministic generator that never calls a backend.
    pub fn offline(table: ClassifierTable) -> Self {
        Self::new(None, table, RetryPolicy::default())
    }

    pub fn table(&self) -> &ClassifierTable {
        &self.table
    }

    /// Always returns prompts; backend failures degrade to `PromptSource::Fallback`.
    #[allow(dead_code)]
    pub async fn generate(
        &self,
        context: Option<&AttributeLayer>,
        locked: Option<&AttributeLayer>,
        predicted: Option<&AttributeLayer>,
    ) -> PromptGenerationResult {
        // A token nobody holds a handle to can never fire.
        match self
            .generate_with_cancellation(context, locked, predicted, &CancellationToken::new())
            .await
        {
            GenerationOutcome::Completed(result) => result,
            GenerationOutcome::Cancelled => unreachable!("private token was cancelled"),
        }
    }

    #[instrument(skip_all, fields(product_type = Empty, category = Empty))]
    pub async fn generate_with_cancellation(
        &self,
        context: Option<&AttributeLayer>,
        locked: Option<&AttributeLayer>,
        predicted: Option<&AttributeLayer>,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let mut timer = GenerationTimer::start();

        let descriptor = resolve(context, locked, predicted);
        timer.set_product_type(&descriptor.product_type);

        let category = self.table.classify(
            descriptor.product_group.as_deref(),
            &descriptor.product_type,
        );
        let model_profile = self.table.model_profile(descriptor.customer_segment.as_deref());
        let span = Span::current();
        span.record("product_type", descriptor.product_type.as_str());
        span.record("category", category.as_str());
        info!(
            "Resolved product: model={} attributes={}",
            model_profile.descriptor,
            descriptor.attributes.len()
        );

        let mut attempts = 0usize;
        let outcome = match &self.backend {
            Some(backend) if self.retry.max_attempts > 0 => {
                let mut outcome = AttemptLoop::Exhausted;
                for attempt in 1..=self.retry.max_attempts {
                    attempts = attempt;
                    let result = tokio::select! {
                        _ = cancel.cancelled() => {
                            outcome = AttemptLoop::Cancelled;
                            break;
                        }
                        result = synthesize_via_backend(
                            backend.as_ref(),
                            &descriptor,
                            category,
                            &model_profile,
                        ) => result,
                    };

                    match result {
                        Ok(components) => {
                            outcome = AttemptLoop::Succeeded(components);
                            break;
                        }
                        Err(err) => log_attempt_failure(
                            backend.name(),
                            attempt,
                            self.retry.max_attempts,
                            &err,
                        ),
                    }

                    if attempt < self.retry.max_attempts {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                outcome = AttemptLoop::Cancelled;
                                break;
                            }
                            _ = tokio::time::sleep(self.retry.delay) => {}
                        }
                    }
                }
                outcome
            }
            _ => AttemptLoop::Exhausted,
        };

        let (components, source) = match outcome {
            AttemptLoop::Succeeded(components) => (components, PromptSource::Llm),
            AttemptLoop::Exhausted => {
                info!(
                    "Using fallback synthesis after {} backend attempt(s)",
                    attempts
                );
                (
                    synthesize_fallback(&descriptor, category, Some(&model_profile)),
                    PromptSource::Fallback,
                )
            }
            AttemptLoop::Cancelled => {
                info!("Generation cancelled during attempt {}", attempts);
                timer.complete("cancelled", attempts);
                return GenerationOutcome::Cancelled;
            }
        };

        let prompts = assemble_prompts(&components);
        let source_label = match source {
            PromptSource::Llm => "llm",
            PromptSource::Fallback => "fallback",
        };
        timer.complete(source_label, attempts);

        GenerationOutcome::Completed(PromptGenerationResult { prompts, source })
    }
}

fn log_attempt_failure(
    backend: &str,
    attempt: usize,
    max_attempts: usize,
    err: &SynthesisError,
) {
    let kind = match err {
        SynthesisError::Transport(_) => "transport",
        SynthesisError::Parse(_) => "parse",
        SynthesisError::MissingField(_) => "validation",
    };
    warn!(
        "{} attempt {}/{} failed ({}): {}",
        backend, attempt, max_attempts, kind, err
    );
}
