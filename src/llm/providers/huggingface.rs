//! Hugging Face Inference API provider (text-generation task).
//!
//! One POST per completion: `{"inputs": <prompt>, "parameters": {...}}`.
//! The endpoint answers in one of several shapes; [`interpret_response`]
//! normalises them:
//!
//! - `[{"generated_text": "..."}]` — the usual text-generation reply
//! - `{"generated_text": "..."}` — some hosted/compatible servers
//! - `{"error": "..."}` — model loading, rate limit, bad token, …
//!
//! Anything else is a [`ProviderError::MalformedResponse`].  Non-JSON bodies
//! (HTML error pages from a proxy, for instance) are request failures.
//! Nothing is retried here.

use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::config::HuggingFaceConfig;
use crate::llm::ProviderError;

/// Characters of a raw body kept in logs.
const BODY_PREVIEW_CHARS: usize = 500;

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for a Hugging Face model endpoint.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    api_base_url: String,
    max_new_tokens: u32,
    temperature: f32,
    wait_for_model: bool,
    return_full_text: Option<bool>,
    api_key: Option<String>,
}

impl HuggingFaceProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// When `api_key` is present it is sent as `Authorization: Bearer <key>`
    /// on every request.
    pub fn new(config: &HuggingFaceConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            wait_for_model: config.wait_for_model,
            return_full_text: config.return_full_text,
            api_key,
        })
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerationRequest<'a> {
        GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens: self.max_new_tokens,
                temperature: self.temperature,
                wait_for_model: self.wait_for_model,
                return_full_text: self.return_full_text,
            },
        }
    }

    /// Send `prompt` as the model input and return the trimmed generated text.
    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = self.request_body(prompt);

        debug!(
            url = %self.api_base_url,
            max_new_tokens = self.max_new_tokens,
            prompt_len = prompt.len(),
            "sending inference request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full inference request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, timeout = e.is_timeout(), "inference HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let body = response.text().await.map_err(|e| {
            error!(error = %e, "failed to read inference response body");
            ProviderError::Request(format!("failed to read response body: {e}"))
        })?;

        debug!(%status, raw = %preview(&body), "raw inference response");

        if !is_json {
            error!(%status, body = %preview(&body), "inference endpoint returned non-JSON body");
            return Err(ProviderError::Request("unexpected response format from server".into()));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "failed to parse inference response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        let text = interpret_response(status, &value)?;
        debug!(reply_len = text.len(), "received generated text");
        Ok(text)
    }
}

// ── Response normalisation ────────────────────────────────────────────────────

/// Map a decoded response body to generated text or a [`ProviderError`].
///
/// An `error` key wins over everything else, then the list shape, then the
/// object shape.  A non-success status without an `error` key is a request
/// failure rather than a malformed response.
pub(crate) fn interpret_response(status: StatusCode, value: &Value) -> Result<String, ProviderError> {
    if let Some(err) = value.get("error") {
        let message = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        error!(%status, %message, "inference endpoint returned an error payload");
        return Err(ProviderError::Request(message));
    }

    if !status.is_success() {
        return Err(ProviderError::Request(format!("HTTP {status}")));
    }

    let generated = value
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("generated_text"))
        .or_else(|| value.get("generated_text"))
        .and_then(Value::as_str);

    match generated {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(ProviderError::MalformedResponse(
            "no generated_text in response".into(),
        )),
    }
}

fn preview(body: &str) -> String {
    let mut out: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    if body.chars().nth(BODY_PREVIEW_CHARS).is_some() {
        out.push('…');
    }
    out
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    wait_for_model: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_full_text: Option<bool>,
}
