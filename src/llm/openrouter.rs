use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{request_metadata, summarize_error_body, truncate_for_log};
use crate::prompt::backend::PromptBackend;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>(.*)").expect("valid think regex"));

/// OpenAI-compatible `/chat/completions` client, pointed at OpenRouter by default.
#[derive(Debug, Clone)]
pub struct OpenRouterBackend {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenRouterBackend {
    pub fn from_config(config: &Config) -> Self {
        OpenRouterBackend {
            base_url: config.openrouter_base_url.clone(),
            api_key: config.openrouter_api_key.clone(),
            model: config.prompt_model.clone(),
            temperature: config.prompt_temperature,
            timeout: config.request_timeout(),
        }
    }

    fn build_payload(&self, system_prompt: &str, user_content: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
        })
    }

    async fn call_api(&self, payload: &Value) -> Result<Value> {
        debug!("OpenRouter request: {}", summarize_payload(payload));

        let response = get_http_client()
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", env!("CARGO_PKG_NAME"))
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "OpenRouter API error: status={}, body={}",
                status, body_summary
            );
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "OpenRouter request failed with status {}: {}",
                status,
                detail
            ));
        }

        Ok(response.json::<Value>().await?)
    }
}

fn summarize_payload(payload: &Value) -> String {
    let model = payload
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let message_chars = payload
        .get("messages")
        .and_then(|v| v.as_array())
        .map(|messages| {
            messages
                .iter()
                .filter_map(|message| message.get("content").and_then(|v| v.as_str()))
                .map(|content| content.chars().count())
                .sum::<usize>()
        })
        .unwrap_or(0);
    format!("model={}, message_chars={}", model, message_chars)
}

/// Drops a leading `<think>` block some reasoning models emit before the answer.
fn strip_reasoning(content: &str) -> String {
    if let Some(caps) = THINK_RE.captures(content) {
        let final_text = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim();
        if !final_text.is_empty() {
            return final_text.to_string();
        }
    }
    content.trim().to_string()
}

fn extract_message_content(response: &Value) -> Result<String> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("OpenRouter response has no choices"))?;
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let content = strip_reasoning(content);
    if content.is_empty() {
        warn!(
            "OpenRouter response had empty content: {}",
            truncate_for_log(&response.to_string(), 2000)
        );
        return Err(anyhow!("OpenRouter returned empty content"));
    }
    Ok(content)
}

#[async_trait]
impl PromptBackend for OpenRouterBackend {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("Model identifier is required"));
        }
        let payload = self.build_payload(system_prompt, user_content);
        log_llm_timing(
            "openrouter",
            &self.model,
            "product_prompts",
            Some(request_metadata(
                system_prompt,
                user_content,
                self.temperature,
                self.timeout,
            )),
            || async {
                let response = self.call_api(&payload).await?;
                extract_message_content(&response)
            },
        )
        .await
    }
}
