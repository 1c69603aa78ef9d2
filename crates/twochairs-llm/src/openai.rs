use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::instrument;

use twochairs_core::errors::{parse_retry_after, GatewayError};
use twochairs_core::provider::{GenerateOptions, LanguageModel};
use twochairs_core::security::ApiKey;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Language model backed by the OpenAI Responses API.
pub struct OpenAiModel {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    request_timeout: Duration,
}

impl OpenAiModel {
    pub fn new(
        api_key: ApiKey,
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::InvalidRequest(format!("http client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            request_timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

/// Build the Responses API body. The system message is omitted when empty.
pub(crate) fn build_request_body(
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
    options: &GenerateOptions,
) -> Value {
    let mut input = Vec::with_capacity(2);
    if !system_prompt.is_empty() {
        input.push(json!({"role": "system", "content": system_prompt}));
    }
    input.push(json!({"role": "user", "content": user_prompt}));

    let mut body = json!({
        "model": model,
        "input": input,
    });
    if let Some(t) = options.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(max) = options.max_output_tokens {
        body["max_output_tokens"] = json!(max);
    }
    body
}

/// Pull the generated text out of a Responses API payload.
///
/// Prefers the top-level `output_text` convenience field, then concatenates
/// every `output_text` content block. Blank output is an error.
pub(crate) fn extract_output_text(body: &Value) -> Result<String, GatewayError> {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let mut collected = String::new();
    if let Some(items) = body.get("output").and_then(Value::as_array) {
        for item in items {
            let Some(blocks) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        collected.push_str(text);
                    }
                }
            }
        }
    }

    let trimmed = collected.trim();
    if trimmed.is_empty() {
        Err(GatewayError::MalformedResponse("no output text in response".into()))
    } else {
        Ok(trimmed.to_string())
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, system_prompt, user_prompt, options), fields(model = %self.model))]
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GatewayError> {
        let body = build_request_body(&self.model, system_prompt, user_prompt, options);

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.request_timeout)
                } else {
                    GatewayError::NetworkError(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_response(status, retry_after, body));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        extract_output_text(&payload)
    }
}
