use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "prompts.timing";

/// Wall-clock record of one end-to-end prompt generation. Events inherit the
/// caller's span, which carries the per-request fields.
#[derive(Debug)]
pub struct GenerationTimer {
    product_type: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    completed: bool,
}

impl GenerationTimer {
    pub fn start() -> Self {
        let timer = GenerationTimer {
            product_type: None,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            completed: false,
        };
        info!(
            target: TIMING_TARGET,
            "event=generation_started started_at={}",
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn set_product_type(&mut self, product_type: &str) {
        self.product_type = Some(product_type.to_string());
    }

    pub fn complete(&mut self, outcome: &str, attempts: usize) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=generation_completed product_type={:?} started_at={} completed_at={} duration_s={:.3} attempts={} outcome={}",
            self.product_type,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            attempts,
            outcome
        );
    }
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}
