use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{request_metadata, summarize_error_body};
use crate::prompt::backend::PromptBackend;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// `generateContent` client asking for a JSON reply.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn from_config(config: &Config) -> Self {
        GeminiBackend {
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            temperature: config.prompt_temperature,
            timeout: config.request_timeout(),
        }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn build_payload(&self, system_prompt: &str, user_content: &str) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": user_content }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
            },
        })
    }

    async fn call_api(&self, payload: &Value) -> Result<GeminiResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );
        debug!(target: "llm.gemini", model = %self.model, "sending generateContent request");

        let response = get_http_client()
            .post(&url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                anyhow!("Gemini request failed: {}", err_text)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        Ok(response.json::<GeminiResponse>().await?)
    }
}

fn extract_text_from_response(response: GeminiResponse) -> Result<String> {
    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or_else(|| anyhow!("Gemini response has no candidates"))?;

    let text = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!(
            "Gemini returned empty content (finish_reason={})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(text.to_string())
}

#[async_trait]
impl PromptBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let payload = self.build_payload(system_prompt, user_content);
        let metadata =
            request_metadata(system_prompt, user_content, self.temperature, self.timeout);
        log_llm_timing(
            "gemini",
            &self.model,
            "product_prompts",
            Some(metadata),
            || async {
                let response = self.call_api(&payload).await?;
                extract_text_from_response(response)
            },
        )
        .await
    }
}
