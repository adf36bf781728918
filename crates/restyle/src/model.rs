//! Model collaborator contract and its HTTP transport.
//!
//! The orchestrator only needs a collaborator that, given the evaluation
//! payload, returns either a structured [`ModelResponse`] or a classified
//! [`ModelFailure`]. The HTTP client below wraps an OpenAI-compatible
//! completion API with a capped-retry, fixed-backoff policy and never
//! raises for a transport problem; failures come back as values so the
//! orchestrator can persist a typed verdict instead of crashing the batch.

use crate::prompt::ModelRequest;
use crate::settings::Settings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use style_model::Stylesheet;
use tokio::time::sleep;
use url::Url;

/// Structured model output. `reasoning` is never inspected for grading.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Free-text rationale from the model.
    pub reasoning: String,
    /// Proposed fix, shaped like a variant's change layer.
    pub css_changes: Stylesheet,
}

/// Classified transport failure kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The API kept rate limiting us through the retry budget.
    RateLimit,
    /// The API returned an error response or was unreachable.
    ApiError,
    /// The completion text held no parseable response object.
    JsonFormatError,
    /// Transient failures persisted through the retry budget.
    MaxRetriesExceeded,
}

impl FailureKind {
    /// Stable identifier for verdict details.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ApiError => "api_error",
            Self::JsonFormatError => "json_format_error",
            Self::MaxRetriesExceeded => "max_retries_exceeded",
        }
    }
}

/// A classified failure of the model collaborator.
#[derive(Clone, Debug)]
pub struct ModelFailure {
    /// What went wrong, coarsely.
    pub kind: FailureKind,
    /// Diagnostic detail.
    pub message: String,
}

impl ModelFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of one collaborator invocation.
pub type ModelOutcome = Result<ModelResponse, ModelFailure>;

/// The collaborator seam the orchestrator talks through.
pub trait ModelClient {
    /// Requests a proposed fix for the payload from `model`.
    fn complete(
        &self,
        model: &str,
        request: &ModelRequest,
    ) -> impl Future<Output = ModelOutcome> + Send;
}

/// HTTP client for an OpenAI-compatible chat-completion API.
pub struct HttpModelClient {
    http: reqwest::Client,
    api_base: Url,
    api_key: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpModelClient {
    /// Builds the client from run settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.model_timeout)
            .build()?;
        Ok(Self {
            http,
            api_base: settings.api_base.clone(),
            api_key: settings.api_key.clone(),
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
        })
    }

    fn request_body(model: &str, request: &ModelRequest) -> JsonValue {
        json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.instructions },
                    { "type": "image_url", "image_url": { "url": request.incorrect_image } },
                    { "type": "image_url", "image_url": { "url": request.reference_image } },
                ],
            }],
        })
    }

    /// One round trip. `Err` carries whether the failure is retryable.
    async fn attempt(
        &self,
        model: &str,
        request: &ModelRequest,
    ) -> Result<String, (bool, ModelFailure)> {
        let url = self
            .api_base
            .join("chat/completions")
            .map_err(|err| (false, ModelFailure::new(FailureKind::ApiError, err.to_string())))?;

        let mut http_request = self.http.post(url).json(&Self::request_body(model, request));
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await.map_err(|err| {
            // Connection problems and timeouts are worth retrying.
            (true, ModelFailure::new(FailureKind::ApiError, err.to_string()))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err((
                true,
                ModelFailure::new(FailureKind::RateLimit, "rate limited by completion API"),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err((
                false,
                ModelFailure::new(
                    FailureKind::ApiError,
                    format!("completion API returned {status}: {body}"),
                ),
            ));
        }

        let payload: JsonValue = response.json().await.map_err(|err| {
            (false, ModelFailure::new(FailureKind::ApiError, err.to_string()))
        })?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| {
                (
                    false,
                    ModelFailure::new(
                        FailureKind::ApiError,
                        "completion API response had no message content",
                    ),
                )
            })
    }
}

impl ModelClient for HttpModelClient {
    async fn complete(&self, model: &str, request: &ModelRequest) -> ModelOutcome {
        let mut last_failure = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::info!("model call retry {attempt}/{} for {model}", self.max_retries);
                sleep(self.retry_delay).await;
            }
            match self.attempt(model, request).await {
                Ok(content) => return parse_model_response(&content),
                Err((retryable, failure)) => {
                    if !retryable {
                        return Err(failure);
                    }
                    last_failure = Some(failure);
                }
            }
        }

        let last = last_failure
            .unwrap_or_else(|| ModelFailure::new(FailureKind::ApiError, "no attempts made"));
        if last.kind == FailureKind::RateLimit {
            Err(last)
        } else {
            Err(ModelFailure::new(
                FailureKind::MaxRetriesExceeded,
                last.message,
            ))
        }
    }
}

/// Parses a completion's text into a [`ModelResponse`].
fn parse_model_response(content: &str) -> ModelOutcome {
    let json_text = extract_json_block(content)
        .ok_or_else(|| ModelFailure::new(FailureKind::JsonFormatError, "no JSON object found"))?;
    serde_json::from_str(json_text)
        .map_err(|err| ModelFailure::new(FailureKind::JsonFormatError, err.to_string()))
}

/// Extracts the JSON object from completion text.
///
/// Accepts a ```json fenced block, a bare ``` fenced block, or the first
/// brace-balanced object in the text.
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        let end = rest.find("```")?;
        return Some(rest[..end].trim());
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        let end = rest.find("```")?;
        return Some(rest[..end].trim());
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].trim());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_fenced_block() {
        let text = "Here you go:\n```json\n{\"reasoning\": \"x\", \"css_changes\": {}}\n```";
        let block = extract_json_block(text).expect("found");
        assert!(block.starts_with('{') && block.ends_with('}'));
    }

    #[test]
    fn extracts_plain_fenced_block() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn extracts_bare_balanced_object() {
        let text = "sure: {\"a\": {\"b\": 2}} trailing";
        assert_eq!(extract_json_block(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn no_object_means_none() {
        assert_eq!(extract_json_block("no json here"), None);
        assert_eq!(extract_json_block("{unbalanced"), None);
    }

    #[test]
    fn parse_classifies_bad_json_as_format_error() {
        let failure = parse_model_response("```json\n{not json}\n```").expect_err("must fail");
        assert_eq!(failure.kind, FailureKind::JsonFormatError);

        let failure = parse_model_response("nothing structured").expect_err("must fail");
        assert_eq!(failure.kind, FailureKind::JsonFormatError);
    }

    #[test]
    fn parse_accepts_response_shape() {
        let text = r#"{"reasoning": "swap it back", "css_changes": {".a": {"color": "blue"}}}"#;
        let response = parse_model_response(text).expect("parses");
        assert_eq!(response.css_changes.get(".a", "color"), Some("blue"));
    }
}
