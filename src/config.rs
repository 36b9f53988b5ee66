use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::llm::BackendProvider;
use crate::prompt::classifier::ClassifierTable;
use crate::prompt::generator::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub backend_provider: BackendProvider,
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub prompt_model: String,
    pub prompt_temperature: f32,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub prompt_max_attempts: usize,
    pub prompt_retry_delay_ms: u64,
    pub prompt_request_timeout_secs: u64,
    pub classifier_table_path: Option<PathBuf>,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_path(name: &str) -> Option<PathBuf> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let path = PathBuf::from(trimmed);
    if path.is_absolute() {
        return Some(path);
    }
    Some(
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path),
    )
}

fn normalize_temperature(value: f32) -> f32 {
    if !(0.0..=2.0).contains(&value) {
        warn!(
            "PROMPT_TEMPERATURE {} out of range [0, 2]; defaulting to 0.7.",
            value
        );
        return 0.7;
    }
    value
}

impl Config {
    pub fn load() -> Result<Self> {
        let provider_raw = env_string("PROMPT_BACKEND_PROVIDER", "openrouter");
        let backend_provider = BackendProvider::from_str(&provider_raw);
        if !provider_raw.trim().is_empty()
            && !provider_raw
                .trim()
                .eq_ignore_ascii_case(backend_provider.as_str())
        {
            warn!(
                "Unknown PROMPT_BACKEND_PROVIDER value '{}'; using {}.",
                provider_raw,
                backend_provider.as_str()
            );
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            backend_provider,
            openrouter_api_key: env_string("OPENROUTER_API_KEY", ""),
            openrouter_base_url: env_string("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            prompt_model: env_string("PROMPT_MODEL", "openai/gpt-4o-mini"),
            prompt_temperature: normalize_temperature(env_f32("PROMPT_TEMPERATURE", 0.7)),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_base_url: env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            prompt_max_attempts: env_usize("PROMPT_MAX_ATTEMPTS", 2),
            prompt_retry_delay_ms: env_u64("PROMPT_RETRY_DELAY_MS", 1000),
            prompt_request_timeout_secs: env_u64("PROMPT_REQUEST_TIMEOUT_SECS", 60).max(1),
            classifier_table_path: env_path("CLASSIFIER_TABLE_PATH"),
        })
    }

    /// Whether the selected provider has the credentials it needs.
    pub fn backend_configured(&self) -> bool {
        match self.backend_provider {
            BackendProvider::OpenRouter => !self.openrouter_api_key.trim().is_empty(),
            BackendProvider::Gemini => !self.gemini_api_key.trim().is_empty(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.prompt_max_attempts,
            delay: Duration::from_millis(self.prompt_retry_delay_ms),
        }
    }

    pub fn classifier_table(&self) -> ClassifierTable {
        match &self.classifier_table_path {
            Some(path) => load_classifier_table(path),
            None => ClassifierTable::default(),
        }
    }
}

fn load_classifier_table(path: &Path) -> ClassifierTable {
    match ClassifierTable::load_from_path(path) {
        Ok(table) => {
            info!(
                "Loaded classifier table version {} ({} rule(s)) from {}",
                table.version,
                table.categories.len(),
                path.display()
            );
            table
        }
        Err(err) => {
            warn!(
                "Failed to load classifier table at {}: {:#}; using built-in table",
                path.display(),
                err
            );
            ClassifierTable::default()
        }
    }
}
