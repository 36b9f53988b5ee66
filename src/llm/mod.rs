pub mod gemini;
pub mod openrouter;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Config;
use crate::prompt::backend::PromptBackend;

pub use gemini::GeminiBackend;
pub use openrouter::OpenRouterBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendProvider {
    OpenRouter,
    Gemini,
}

impl BackendProvider {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "gemini" => BackendProvider::Gemini,
            _ => BackendProvider::OpenRouter,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            BackendProvider::OpenRouter => "openrouter",
            BackendProvider::Gemini => "gemini",
        }
    }
}

/// The configured backend, or `None` when its credentials are missing.
pub fn build_backend(config: &Config) -> Option<Arc<dyn PromptBackend>> {
    if !config.backend_configured() {
        return None;
    }
    let backend: Arc<dyn PromptBackend> = match config.backend_provider {
        BackendProvider::OpenRouter => Arc::new(OpenRouterBackend::from_config(config)),
        BackendProvider::Gemini => Arc::new(GeminiBackend::from_config(config)),
    };
    Some(backend)
}

/// Request shape attached to the timing events of one backend call.
pub(crate) fn request_metadata(
    system_prompt: &str,
    user_content: &str,
    temperature: f32,
    timeout: Duration,
) -> Value {
    json!({
        "system_chars": system_prompt.chars().count(),
        "user_chars": user_content.chars().count(),
        "temperature": temperature,
        "timeout_secs": timeout.as_secs(),
    })
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls a human-readable message out of an error body, plus a truncated copy for logs.
pub(crate) fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}
