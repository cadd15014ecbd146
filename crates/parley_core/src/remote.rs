//! Remote completion: client abstraction, response-shape extraction and the
//! rate-limited, retrying assistant used as the last resolution stage.

use crate::config::{ErrorSettings, RemoteSettings, SecuritySettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Length of the request-counting window
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Remote transport errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("Rate limit exceeded. Please wait.")]
    Throttled,

    #[error("429 resource exhausted: {0}")]
    RateLimited(String),

    #[error("503 service unavailable: {0}")]
    Unavailable(String),

    #[error("404 model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Remote returned empty response")]
    Empty,

    #[error("Remote completion is disabled")]
    Disabled,
}

impl RemoteError {
    /// Classify a free-text failure by sniffing status codes and phrases.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("resource exhausted") {
            RemoteError::RateLimited(message.to_string())
        } else if lower.contains("503") || lower.contains("unavailable") || lower.contains("overloaded") {
            RemoteError::Unavailable(message.to_string())
        } else if lower.contains("404") || lower.contains("not found") {
            RemoteError::ModelNotFound(message.to_string())
        } else {
            RemoteError::Http(message.to_string())
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RemoteError::Disabled | RemoteError::ModelNotFound(_) | RemoteError::Throttled
        )
    }
}

/// User-facing text for a failed remote call.
pub fn friendly_message(err: &RemoteError, errors: &ErrorSettings) -> String {
    if errors.verbose_errors {
        return format!("Error: {}", err);
    }
    match err {
        RemoteError::Throttled => err.to_string(),
        RemoteError::RateLimited(_) => {
            "API limit reached (quota exhausted). Please wait a moment and try again.".to_string()
        }
        RemoteError::Unavailable(_) => {
            "The AI server is busy right now. Please try again shortly.".to_string()
        }
        RemoteError::ModelNotFound(_) => {
            "The configured AI model was not found (404). Check the model name in your config."
                .to_string()
        }
        _ => errors.default_error_response.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// A remote text-completion backend
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<Value, RemoteError>;
}

type Extractor = fn(&Value) -> Option<&str>;

fn plain(v: &Value) -> Option<&str> {
    v.as_str()
}

fn text_field(v: &Value) -> Option<&str> {
    v.get("text")?.as_str()
}

fn outputs_content_text(v: &Value) -> Option<&str> {
    v.get("outputs")?.get(0)?.get("content")?.get(0)?.get("text")?.as_str()
}

fn outputs_text(v: &Value) -> Option<&str> {
    v.get("outputs")?.get(0)?.get("text")?.as_str()
}

fn output_content_text(v: &Value) -> Option<&str> {
    v.get("output")?.get(0)?.get("content")?.get(0)?.get("text")?.as_str()
}

fn candidates_text(v: &Value) -> Option<&str> {
    v.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/// Response shapes tried in order before falling back to the JSON text.
const EXTRACTORS: &[Extractor] = &[
    plain,
    text_field,
    outputs_content_text,
    outputs_text,
    output_content_text,
    candidates_text,
];

/// Pull the reply text out of whatever shape the backend returned.
pub fn extract_text(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(value))
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Rate-limited, retrying wrapper over a [`CompletionClient`].
pub struct RemoteAssistant {
    client: Box<dyn CompletionClient>,
    settings: RemoteSettings,
    security: SecuritySettings,
    window_start: Instant,
    request_count: u32,
}

impl RemoteAssistant {
    pub fn new(
        client: Box<dyn CompletionClient>,
        settings: RemoteSettings,
        security: SecuritySettings,
    ) -> Self {
        Self {
            client,
            settings,
            security,
            window_start: Instant::now(),
            request_count: 0,
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// `Context:\n<lines>\n\nUser: <prompt>`, or the bare prompt without context.
    pub fn build_prompt(prompt: &str, context: &[String], window: usize) -> String {
        if context.is_empty() || window == 0 {
            return prompt.to_string();
        }
        let start = context.len().saturating_sub(window);
        format!("Context:\n{}\n\nUser: {}", context[start..].join("\n"), prompt)
    }

    fn check_rate_limit(&mut self) -> bool {
        if !self.security.rate_limit_enabled {
            return true;
        }
        if self.window_start.elapsed() >= RATE_WINDOW {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        if self.request_count >= self.security.max_requests_per_minute {
            return false;
        }
        self.request_count += 1;
        true
    }

    /// Generate a reply, retrying transient failures with a growing delay.
    pub fn generate(
        &mut self,
        prompt: &str,
        context: &[String],
        window: usize,
    ) -> Result<String, RemoteError> {
        if !self.check_rate_limit() {
            warn!("Remote rate limit reached ({} per minute)", self.security.max_requests_per_minute);
            return Err(RemoteError::Throttled);
        }

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            prompt: Self::build_prompt(prompt, context, window),
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_response_length,
        };

        let attempts = self.settings.max_retries.max(1);
        let mut last_error = RemoteError::Empty;

        for attempt in 1..=attempts {
            let outcome = self.client.complete(&request).and_then(|value| {
                let text = extract_text(&value);
                if text.trim().is_empty() {
                    Err(RemoteError::Empty)
                } else {
                    Ok(text)
                }
            });

            match outcome {
                Ok(text) => {
                    debug!("Remote reply on attempt {} ({} chars)", attempt, text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Remote attempt {}/{} failed: {}", attempt, attempts, e);
                    let retry = e.is_retryable() && attempt < attempts;
                    last_error = e;
                    if !retry {
                        break;
                    }
                    let delay = self.settings.retry_delay_secs.max(0.0) * f64::from(attempt);
                    std::thread::sleep(Duration::from_secs_f64(delay));
                }
            }
        }

        error!("Remote completion failed: {}", last_error);
        Err(last_error)
    }
}

/// Scripted client for tests. Replays responses in order and repeats the
/// last one once the script runs out.
pub struct FakeCompletionClient {
    responses: Mutex<Vec<Result<Value, RemoteError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletionClient {
    pub fn new(responses: Vec<Result<Value, RemoteError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(Value::String(text.to_string()))])
    }

    pub fn always_error(err: RemoteError) -> Self {
        Self::new(vec![Err(err)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .ok()
            .and_then(|r| r.last().map(|req| req.prompt.clone()))
    }
}

impl CompletionClient for FakeCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Value, RemoteError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| RemoteError::Http("fake client poisoned".to_string()))?;
        match responses.len() {
            0 => Err(RemoteError::Empty),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}

impl<T: CompletionClient + ?Sized> CompletionClient for std::sync::Arc<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<Value, RemoteError> {
        (**self).complete(request)
    }
}
