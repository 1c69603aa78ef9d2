use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::instrument;

use twochairs_core::errors::{parse_retry_after, GatewayError};
use twochairs_core::moderation::{ModerationService, ModerationVerdict};
use twochairs_core::security::ApiKey;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Categories that count as a self-harm flag.
const SELF_HARM_CATEGORIES: &[&str] = &["self-harm", "self-harm/intent", "self-harm/instructions"];

/// Moderation backed by the OpenAI Moderations API.
pub struct OpenAiModeration {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    request_timeout: Duration,
}

impl OpenAiModeration {
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
}

/// Read the self-harm categories of the first result. Anything missing
/// reads as not flagged.
pub(crate) fn verdict_from_response(body: &Value) -> ModerationVerdict {
    let categories = body
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(|result| result.get("categories"));

    let flagged = categories.is_some_and(|cats| {
        SELF_HARM_CATEGORIES
            .iter()
            .any(|name| cats.get(*name).and_then(Value::as_bool).unwrap_or(false))
    });

    ModerationVerdict {
        self_harm_flagged: flagged,
    }
}

#[async_trait]
impl ModerationService for OpenAiModeration {
    fn name(&self) -> &str {
        "openai-moderation"
    }

    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn classify(&self, text: &str) -> Result<ModerationVerdict, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/moderations", self.base_url))
            .bearer_auth(self.api_key.expose())
            .timeout(self.request_timeout)
            .json(&json!({"model": self.model, "input": text}))
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

        Ok(verdict_from_response(&payload))
    }
}
