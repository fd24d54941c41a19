//! GeminiBackend - Direct REST API implementation for Gemini.
//!
//! Calls the `generateContent` endpoint directly. Chat sessions are kept client
//! side: each [`GeminiChatSession`] holds its system instruction and the exchange
//! history and sends the whole conversation with every request.
//!
//! # Example
//!
//! ```rust,no_run
//! use llm_roundtable::backend::{GeminiBackend, LanguageModel};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // From environment variable (GEMINI_API_KEY)
//! let backend = GeminiBackend::try_from_env()?;
//! let text = backend.generate(backend.default_model(), "Hello, world!").await?;
//!
//! // Direct API key
//! let backend = GeminiBackend::new("your-api-key");
//! let mut session = backend
//!     .create_session("gemini-2.0-flash", "You are a careful moderator.")
//!     .await?;
//! let reply = session.send("Open the discussion.").await?;
//! # Ok(())
//! # }
//! ```

use super::{ChatSession, LanguageModel};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Backend implementation that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    default_model: String,
    timeout: Duration,
}

impl GeminiBackend {
    /// Creates a backend with the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GEMINI_API_KEY` (required)
    /// - `GEMINI_MODEL` (optional, defaults to [`DEFAULT_MODEL`])
    pub fn try_from_env() -> Result<Self, BackendError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            BackendError::Credential("GEMINI_API_KEY environment variable not set".to_string())
        })?;

        let backend = Self::new(api_key);
        Ok(match env::var("GEMINI_MODEL") {
            Ok(model) if !model.trim().is_empty() => backend.with_default_model(model),
            _ => backend,
        })
    }

    /// Overrides the model reported by [`default_model`](Self::default_model).
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn send_request(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, BackendError> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::Credential("Gemini API key is empty".into()));
        }

        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            BASE_URL,
            model = model,
            api_key = self.api_key
        );
        debug!(
            target = "llm_roundtable::backend",
            model,
            contents = body.contents.len(),
            "sending Gemini request"
        );

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    BackendError::Timeout(self.timeout)
                } else {
                    BackendError::transport(
                        format!("Gemini API request failed: {err}"),
                        err.is_connect(),
                    )
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let body_text = response.text().await.map_err(|err| {
            BackendError::MalformedResponse(format!("Failed to read Gemini response body: {err}"))
        })?;

        let parsed: GenerateContentResponse = serde_json::from_str(&body_text).map_err(|err| {
            BackendError::MalformedResponse(format!(
                "Failed to parse Gemini response: {err}\n\nResponse body:\n{}",
                truncate(&body_text, 500)
            ))
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl LanguageModel for GeminiBackend {
    async fn create_session(
        &self,
        model_id: &str,
        system_instruction: &str,
    ) -> Result<Box<dyn ChatSession>, BackendError> {
        Ok(Box::new(GeminiChatSession {
            backend: self.clone(),
            model: model_id.to_string(),
            system_instruction: system_instruction.to_string(),
            history: Vec::new(),
        }))
    }

    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, BackendError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: None,
        };
        self.send_request(model_id, &request).await
    }
}

/// A participant's conversation with Gemini, history kept client side.
pub struct GeminiChatSession {
    backend: GeminiBackend,
    model: String,
    system_instruction: String,
    history: Vec<Content>,
}

impl GeminiChatSession {
    /// Number of recorded messages (prompts and replies).
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn request_for(&self, prompt: &str) -> GenerateContentRequest {
        let mut contents = self.history.clone();
        contents.push(Content::user(prompt));
        GenerateContentRequest {
            contents,
            system_instruction: Some(Content::system(&self.system_instruction)),
        }
    }
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send(&mut self, prompt: &str) -> Result<String, BackendError> {
        let request = self.request_for(prompt);
        let reply = self.backend.send_request(&self.model, &request).await?;
        self.record_exchange(prompt, &reply);
        Ok(reply)
    }

    fn record_exchange(&mut self, prompt: &str, reply: &str) {
        self.history.push(Content::user(prompt));
        self.history.push(Content::model(reply));
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize, Clone)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn with_role(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    fn user(text: &str) -> Self {
        Self::with_role("user", text)
    }

    fn model(text: &str) -> Self {
        Self::with_role("model", text)
    }

    fn system(text: &str) -> Self {
        Self::with_role("system", text)
    }
}

#[derive(Serialize, Clone)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, BackendError> {
    let text = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(BackendError::EmptyResponse(
            "Gemini API returned no text in the response candidates".into(),
        ));
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> BackendError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return BackendError::Credential(message);
    }

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    BackendError::Request {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
        retry_after,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}... (truncated, total {} bytes)", text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_creation() {
        let backend = GeminiBackend::new("test-key");
        assert_eq!(backend.default_model(), DEFAULT_MODEL);
        assert_eq!(backend.timeout, DEFAULT_TIMEOUT);

        let backend = backend
            .with_default_model("gemini-1.5-flash")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(backend.default_model(), "gemini-1.5-flash");
        assert_eq!(backend.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_session_request_carries_instruction_and_history() {
        let mut session = GeminiChatSession {
            backend: GeminiBackend::new("test-key"),
            model: DEFAULT_MODEL.into(),
            system_instruction: "Your name is Alice.".into(),
            history: Vec::new(),
        };
        session.record_exchange("Open please", "Hello all");
        assert_eq!(session.history_len(), 2);

        let request = session.request_for("Bob: I disagree.");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Your name is Alice.");
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "Hello all");
        assert_eq!(contents[2]["parts"][0]["text"], "Bob: I disagree.");
    }

    #[test]
    fn test_stateless_request_omits_system_instruction() {
        let request = GenerateContentRequest {
            contents: vec![Content::user("Summarize")],
            system_instruction: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("systemInstruction"));
        assert!(json.contains("\"text\":\"Summarize\""));
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "Hello, "}, {"text": "world!"}]
                }
            }]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text_response(response).unwrap(), "Hello, world!");
    }

    #[test]
    fn test_response_parsing_empty_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            extract_text_response(response),
            Err(BackendError::EmptyResponse(_))
        ));
    }

    #[test]
    fn test_error_parsing() {
        let json = r#"{
            "error": {
                "code": 400,
                "message": "Invalid argument",
                "status": "INVALID_ARGUMENT"
            }
        }"#;

        match map_http_error(StatusCode::BAD_REQUEST, json.to_string(), None) {
            BackendError::Request {
                message,
                status_code,
                is_retryable,
                ..
            } => {
                assert_eq!(message, "INVALID_ARGUMENT: Invalid argument");
                assert_eq!(status_code, Some(400));
                assert!(!is_retryable);
            }
            other => panic!("Expected Request error, got {other:?}"),
        }
    }

    #[test]
    fn test_auth_statuses_map_to_credential_errors() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let error = map_http_error(status, "denied".to_string(), None);
            assert!(matches!(error, BackendError::Credential(_)));
        }
    }

    #[test]
    fn test_retryable_status_codes() {
        let retryable_statuses = [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ];

        for status in retryable_statuses {
            let error = map_http_error(status, "error".to_string(), None);
            assert!(error.is_retryable(), "Status {:?} should be retryable", status);
        }
    }

    #[test]
    fn test_retry_after_header() {
        let header = HeaderValue::from_static("12");
        assert_eq!(parse_retry_after(Some(&header)), Some(Duration::from_secs(12)));
        let header = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&header)), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(600);
        let truncated = truncate(&body, 500);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, total 600 bytes)"));
        assert_eq!(truncate("short", 500), "short");
    }

    #[tokio::test]
    async fn test_empty_key_fails_before_request() {
        let backend = GeminiBackend::new("  ");
        let result = backend.generate(DEFAULT_MODEL, "hi").await;
        assert!(matches!(result, Err(BackendError::Credential(_))));
    }
}
