use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use twochairs_core::errors::GatewayError;
use twochairs_core::moderation::{ModerationService, ModerationVerdict};
use twochairs_core::provider::{GenerateOptions, LanguageModel};

/// One scripted answer from [`MockModel`].
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Error(GatewayError),
    /// Wait a duration, then yield the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// A prompt the mock received, kept for assertions.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub options: GenerateOptions,
}

type Responder = Box<dyn Fn(&str, &str) -> MockReply + Send + Sync>;

enum Script {
    Sequence(Vec<MockReply>),
    Responder(Responder),
}

/// Mock language model returning scripted replies in order, or computing
/// them from the prompt.
pub struct MockModel {
    script: Script,
    call_count: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockModel {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            script: Script::Sequence(replies),
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Build a mock whose reply is chosen from `(system_prompt, user_prompt)`.
    pub fn responder<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> MockReply + Send + Sync + 'static,
    {
        Self {
            script: Script::Responder(Box::new(f)),
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always fails with the given error.
    pub fn failing(error: GatewayError) -> Self {
        Self::responder(move |_, _| MockReply::Error(error.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            options: options.clone(),
        });

        let reply = match &self.script {
            Script::Sequence(replies) => replies.get(idx).cloned().ok_or_else(|| {
                GatewayError::InvalidRequest(format!("script exhausted at call {idx}"))
            })?,
            Script::Responder(f) => f(system_prompt, user_prompt),
        };

        reply.resolve().await
    }
}

impl MockReply {
    async fn resolve(mut self) -> Result<String, GatewayError> {
        loop {
            self = match self {
                Self::Text(text) => return Ok(text),
                Self::Error(err) => return Err(err),
                Self::Delay(wait, next) => {
                    tokio::time::sleep(wait).await;
                    *next
                }
            };
        }
    }
}

/// Mock moderation service with a fixed outcome.
pub struct MockModeration {
    outcome: Result<ModerationVerdict, GatewayError>,
    call_count: AtomicUsize,
}

impl MockModeration {
    pub fn clear() -> Self {
        Self::with_outcome(Ok(ModerationVerdict::clear()))
    }

    pub fn flagging() -> Self {
        Self::with_outcome(Ok(ModerationVerdict::flagged()))
    }

    pub fn failing(error: GatewayError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<ModerationVerdict, GatewayError>) -> Self {
        Self {
            outcome,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModerationService for MockModeration {
    fn name(&self) -> &str {
        "mock-moderation"
    }

    async fn classify(&self, _text: &str) -> Result<ModerationVerdict, GatewayError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_replies() {
        let mock = MockModel::new(vec![MockReply::text("first"), MockReply::text("second")]);
        let opts = GenerateOptions::default();

        assert_eq!(mock.generate("", "a", &opts).await.unwrap(), "first");
        assert_eq!(mock.generate("", "b", &opts).await.unwrap(), "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let mock = MockModel::new(vec![MockReply::text("only one")]);
        let opts = GenerateOptions::default();

        let _ = mock.generate("", "a", &opts).await;
        assert!(mock.generate("", "b", &opts).await.is_err());
    }

    #[tokio::test]
    async fn responder_sees_prompts() {
        let mock = MockModel::responder(|system, user| {
            MockReply::text(format!("{}|{}", system.len(), user))
        });
        let out = mock
            .generate("sys", "hello", &GenerateOptions::with_temperature(0.2))
            .await
            .unwrap();
        assert_eq!(out, "3|hello");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user_prompt, "hello");
        assert_eq!(calls[0].options.temperature, Some(0.2));
    }

    #[tokio::test]
    async fn delayed_reply_waits() {
        let mock = MockModel::new(vec![MockReply::delayed(
            Duration::from_millis(30),
            MockReply::text("after delay"),
        )]);
        let start = std::time::Instant::now();
        let out = mock.generate("", "x", &GenerateOptions::default()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert_eq!(out, "after delay");
    }

    #[tokio::test]
    async fn failing_model_always_errors() {
        let mock = MockModel::failing(GatewayError::ProviderOverloaded);
        let result = mock.generate("", "x", &GenerateOptions::default()).await;
        assert!(matches!(result, Err(GatewayError::ProviderOverloaded)));
    }

    #[tokio::test]
    async fn moderation_outcomes() {
        assert!(!MockModeration::clear().classify("x").await.unwrap().self_harm_flagged);
        assert!(MockModeration::flagging().classify("x").await.unwrap().self_harm_flagged);

        let failing = MockModeration::failing(GatewayError::NetworkError("down".into()));
        assert!(failing.classify("x").await.is_err());
        assert_eq!(failing.call_count(), 1);
    }
}
