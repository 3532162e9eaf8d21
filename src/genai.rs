//! Generative-model and image-description collaborators.
//!
//! Defines the [`Generator`] and [`ImageDescriber`] traits the pipeline is
//! written against, plus the Gemini-backed implementation of both. The
//! client is constructed explicitly and injected; tests substitute fakes.
//!
//! A missing `GEMINI_API_KEY` does not fail startup — the client degrades
//! to a disabled state whose calls error with a clear message.

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Schema-constrained text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a payload expected to be JSON conforming to `response_schema`.
    /// Callers must still validate the payload; conformance is a request, not
    /// a guarantee.
    async fn generate(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
        temperature: f64,
    ) -> Result<String>;
}

/// OCR / chart-description capability for raster images.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Returns extracted text plus a textual description of any charts.
    async fn describe(&self, image: &[u8], mime: &str) -> Result<String>;
}

/// A describer that always errors. Used where image support is not wired up.
pub struct NullDescriber;

#[async_trait]
impl ImageDescriber for NullDescriber {
    async fn describe(&self, _image: &[u8], _mime: &str) -> Result<String> {
        bail!("image description is disabled")
    }
}

/// Instruction sent alongside an image for OCR + chart description.
const DESCRIBE_INSTRUCTION: &str = "Transcribe all text in this image verbatim. \
If the image contains charts or graphs, follow the transcription with a plain-text \
description of what each chart shows.";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for the Gemini `generateContent` API, implementing both
/// [`Generator`] and [`ImageDescriber`].
pub struct GeminiClient {
    model: String,
    temperature: f64,
    max_output_tokens: u32,
    timeout_secs: u64,
    /// `None` when the provider is disabled or the API key is missing;
    /// every call then fails fast instead of the process crashing at startup.
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    /// Build a client from configuration, reading `GEMINI_API_KEY` from the
    /// environment. Never fails: a missing key yields a disabled client.
    pub fn from_config(config: &GenerationConfig) -> Self {
        let api_key = if config.provider == "disabled" {
            None
        } else {
            match std::env::var("GEMINI_API_KEY") {
                Ok(key) if !key.trim().is_empty() => Some(key),
                _ => {
                    tracing::warn!(
                        "GEMINI_API_KEY not set; generation and image description are disabled"
                    );
                    None
                }
            }
        };

        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.timeout_secs,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (tests point this at a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default temperature from configuration.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Gemini client not configured. Set GEMINI_API_KEY."))
    }

    async fn generate_content(&self, body: serde_json::Value) -> Result<String> {
        let key = self.key()?;
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, key
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let response = client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        extract_candidate_text(&json)
    }
}

/// Pulls `candidates[0].content.parts[*].text` out of a generateContent
/// response, concatenating multi-part answers.
fn extract_candidate_text(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        bail!("Invalid Gemini response: no text parts");
    }
    Ok(text)
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
        temperature: f64,
    ) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema,
                "temperature": temperature,
                "maxOutputTokens": self.max_output_tokens,
            },
        });
        self.generate_content(body).await
    }
}

#[async_trait]
impl ImageDescriber for GeminiClient {
    async fn describe(&self, image: &[u8], mime: &str) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": DESCRIBE_INSTRUCTION },
                    { "inlineData": { "mimeType": mime, "data": encoded } },
                ]
            }],
        });
        self.generate_content(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_has_no_key() {
        let cfg = GenerationConfig {
            provider: "disabled".to_string(),
            ..GenerationConfig::default()
        };
        let client = GeminiClient::from_config(&cfg);
        assert!(client.key().is_err());
    }

    #[tokio::test]
    async fn disabled_client_fails_fast_on_generate() {
        let cfg = GenerationConfig {
            provider: "disabled".to_string(),
            ..GenerationConfig::default()
        };
        let client = GeminiClient::from_config(&cfg);
        let err = client
            .generate("prompt", &serde_json::json!({}), 0.1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn candidate_text_concatenates_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }
            }]
        });
        assert_eq!(extract_candidate_text(&json).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let json = serde_json::json!({ "promptFeedback": {} });
        assert!(extract_candidate_text(&json).is_err());
    }
}
