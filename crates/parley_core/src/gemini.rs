//! Gemini REST client (`generateContent`).

use crate::config::RemoteSettings;
use crate::error::{ChatError, Result};
use crate::remote::{CompletionClient, CompletionRequest, RemoteError};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct GeminiClient {
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(settings: &RemoteSettings, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs: settings.timeout_secs,
            client,
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, model)
    }
}

/// Joined text of the first candidate's parts.
fn candidate_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

impl CompletionClient for GeminiClient {
    fn complete(&self, request: &CompletionRequest) -> std::result::Result<Value, RemoteError> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            },
        });

        let response = self
            .client
            .post(self.url(&request.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout(self.timeout_secs)
                } else {
                    RemoteError::classify(&format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(RemoteError::classify(&format!("HTTP {} {}", status, detail)));
        }

        let json: Value = response
            .json()
            .map_err(|e| RemoteError::Http(format!("Failed to parse response: {}", e)))?;

        debug!("Gemini response received for model {}", request.model);
        match candidate_text(&json) {
            Some(text) if !text.trim().is_empty() => Ok(Value::String(text)),
            Some(_) => Err(RemoteError::Empty),
            None => Ok(json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_text() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world"}]}}]
        });
        assert_eq!(candidate_text(&body).as_deref(), Some("Hello world"));
        assert_eq!(candidate_text(&json!({"error": "x"})), None);
    }

    #[test]
    fn test_url() {
        let settings = RemoteSettings {
            endpoint: "https://example.test/".to_string(),
            ..RemoteSettings::default()
        };
        let client = GeminiClient::new(&settings, "k").unwrap();
        assert_eq!(
            client.url("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
