use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

/// Result of classifying one message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationVerdict {
    pub self_harm_flagged: bool,
}

impl ModerationVerdict {
    pub fn flagged() -> Self {
        Self {
            self_harm_flagged: true,
        }
    }

    pub fn clear() -> Self {
        Self::default()
    }
}

/// The moderation collaborator. Callers treat any `Err` as not flagged.
#[async_trait]
pub trait ModerationService: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<ModerationVerdict, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_constructors() {
        assert!(ModerationVerdict::flagged().self_harm_flagged);
        assert!(!ModerationVerdict::clear().self_harm_flagged);
    }

    #[test]
    fn verdict_wire_shape() {
        let json = serde_json::to_value(ModerationVerdict::flagged()).unwrap();
        assert_eq!(json["selfHarmFlagged"], true);
    }
}
