//! OpenAI-compatible content generator.
//!
//! A single struct that handles chat completions for ALL OpenAI-compatible
//! APIs. Targets are distinguished only by endpoint URL and API key; the
//! default points at OpenAI itself, and `custom:<url>` reaches self-hosted
//! servers (vLLM, Ollama's /v1, llama.cpp, ...).

use async_trait::async_trait;
use localboost_core::config::GeneratorConfig;
use localboost_core::error::{LocalBoostError, Result};
use localboost_core::traits::ContentGenerator;
use serde_json::{Value, json};
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A generator that works with any OpenAI-compatible chat API.
pub struct OpenAiGenerator {
    /// Backend name ("openai" or "custom"), for logs.
    name: String,
    /// API key for Bearer auth. May be empty for local servers.
    api_key: String,
    /// Base URL (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Model to request.
    model: String,
    /// Sampling temperature.
    temperature: f32,
    /// Per-request timeout.
    timeout: Duration,
    /// HTTP client.
    client: reqwest::Client,
}

impl OpenAiGenerator {
    /// Create for OpenAI proper.
    ///
    /// API key resolves `config.api_key` > `OPENAI_API_KEY`; a missing key is
    /// reported at generate() time, not here, so startup never fails on it.
    pub fn new(config: &GeneratorConfig) -> Self {
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        };

        let base_url = if !config.endpoint.is_empty() {
            config.endpoint.trim_end_matches('/').to_string()
        } else {
            OPENAI_BASE_URL.to_string()
        };

        Self {
            name: "openai".to_string(),
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, config: &GeneratorConfig) -> Self {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };

        Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    /// Base URL currently in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        topic: &str,
        keywords: &[String],
        style_guide: &str,
    ) -> Result<String> {
        // OpenAI proper requires a key; local servers usually don't.
        if self.name == "openai" && self.api_key.is_empty() {
            return Err(LocalBoostError::Generation(
                "openai API key not set (config [generator].api_key or OPENAI_API_KEY)".into(),
            ));
        }

        let system = format!(
            "You are a marketing copywriter for a local business. {style_guide} \
             Write exactly one ready-to-publish social media post. \
             Output only the post text, no preamble."
        );
        let user = if keywords.is_empty() {
            format!("Topic: {topic}")
        } else {
            format!(
                "Topic: {topic}\nWork these local search keywords in naturally: {}",
                keywords.join(", ")
            )
        };

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req.send().await.map_err(|e| {
            LocalBoostError::Generation(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LocalBoostError::Generation(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        // Parse response — standard OpenAI format
        let json: Value = resp
            .json()
            .await
            .map_err(|e| LocalBoostError::Generation(e.to_string()))?;

        let content = json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LocalBoostError::Generation(format!(
                "{} returned an empty completion",
                self.name
            )));
        }

        tracing::debug!("🤖 {} produced {} chars", self.name, content.len());
        Ok(content.to_string())
    }
}
