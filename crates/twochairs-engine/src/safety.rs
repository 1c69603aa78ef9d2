//! Crisis screening for incoming user messages, keywords before moderation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{instrument, warn};

use twochairs_core::moderation::ModerationService;

use crate::signals;

/// Which layer caught a crisis message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrisisTrigger {
    Keyword,
    Moderation,
}

impl CrisisTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Moderation => "moderation",
        }
    }

    /// Payload stored on the crisis alert.
    pub fn alert_payload(&self) -> Value {
        json!({ "matched": self.as_str() })
    }
}

impl std::fmt::Display for CrisisTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screens a message with the local keyword layer and then the moderation
/// service. Moderation failures read as not flagged.
pub struct SafetyGate {
    moderation: Arc<dyn ModerationService>,
}

impl SafetyGate {
    pub fn new(moderation: Arc<dyn ModerationService>) -> Self {
        Self { moderation }
    }

    #[instrument(skip(self, text), fields(session_id = %session_id))]
    pub async fn screen(&self, session_id: &str, text: &str) -> Option<CrisisTrigger> {
        if signals::is_crisis(text) {
            return Some(CrisisTrigger::Keyword);
        }

        match self.moderation.classify(text).await {
            Ok(verdict) if verdict.self_harm_flagged => Some(CrisisTrigger::Moderation),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    service = self.moderation.name(),
                    error = %e,
                    "moderation failed, treating message as not flagged"
                );
                None
            }
        }
    }
}
