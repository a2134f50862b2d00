//! Completions API client
//!
//! Issues the streaming POST and hands the response body to the
//! [`StreamReassembler`].

use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::settings::ClientSettings;
use crate::handler::{TextHandler, Throttled};
use crate::stream::{StreamError, StreamReassembler};
use crate::truncate_str;

/// Completion request fields, passed through to the API as-is.
///
/// `stream` is always forced to `true` when the body is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    params: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::default()
            .with("model", model.into())
            .with("prompt", prompt.into())
    }

    /// Request seeded with the model and sampling defaults from settings
    pub fn from_settings(settings: &ClientSettings, prompt: impl Into<String>) -> Self {
        Self::new(settings.model.clone(), prompt)
            .with("max_tokens", settings.max_tokens)
            .with("temperature", settings.temperature)
    }

    /// Set a request field, replacing any previous value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// JSON body with streaming forced on
    pub fn into_body(self) -> Value {
        let mut params = self.params;
        params.insert("stream".to_string(), Value::Bool(true));
        Value::Object(params)
    }
}

impl From<Map<String, Value>> for CompletionRequest {
    fn from(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

/// Arguments of [`stream_completion`]
pub struct StreamCompletionArgs<H> {
    pub api_key: String,
    pub request: CompletionRequest,
    pub on_text: H,
    /// Minimum interval between `on_text` calls; unset or zero disables throttling
    pub throttle_ms: Option<u64>,
}

/// Stream a completion using default settings.
pub async fn stream_completion<H: TextHandler>(
    args: StreamCompletionArgs<H>,
) -> Result<String, StreamError> {
    CompletionClient::new(ClientSettings::default())?
        .stream_completion(args)
        .await
}

/// HTTP client for the streaming completions endpoint
pub struct CompletionClient {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl CompletionClient {
    pub fn new(settings: ClientSettings) -> Result<Self, StreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            settings,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Stream a completion, throttling `on_text` when asked to.
    ///
    /// The throttled handler is also the one that receives the end-of-stream
    /// call, which always goes through.
    pub async fn stream_completion<H: TextHandler>(
        &self,
        args: StreamCompletionArgs<H>,
    ) -> Result<String, StreamError> {
        let StreamCompletionArgs {
            api_key,
            request,
            on_text,
            throttle_ms,
        } = args;

        let mut handler = Throttled::from_millis(throttle_ms.unwrap_or(0), on_text);
        self.stream(&api_key, request, &mut handler).await
    }

    /// POST `request` and reassemble the streamed body.
    ///
    /// Fails before reading any of the body when the API answers with a
    /// non-success status.
    pub async fn stream<H>(
        &self,
        api_key: &str,
        request: CompletionRequest,
        handler: &mut H,
    ) -> Result<String, StreamError>
    where
        H: TextHandler + ?Sized,
    {
        if api_key.trim().is_empty() {
            return Err(StreamError::MissingApiKey);
        }

        let response = self.send(api_key, request).await?;
        StreamReassembler::new(self.settings.max_partial_bytes)
            .run(response, handler)
            .await
    }

    async fn send(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> Result<reqwest::Response, StreamError> {
        tracing::debug!(endpoint = %self.settings.endpoint, "Starting completion stream");

        let response = self
            .http
            .post(&self.settings.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request.into_body())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                %status,
                body = %truncate_str(&body, 1024),
                "Completion stream failed"
            );
            return Err(StreamError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}
