use twochairs_core::errors::GatewayError;
use twochairs_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The round already holds six messages and still waits for its reply.
    #[error("round is complete and awaiting its reply; retry the round instead")]
    RoundPending,

    #[error("no complete round to retry")]
    NothingToRetry,

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Errors caused by the request rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::SessionNotFound(_) | Self::RoundPending | Self::NothingToRetry
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::RoundPending => "ROUND_PENDING",
            Self::NothingToRetry => "NOTHING_TO_RETRY",
            Self::Gateway(_) => "UPSTREAM_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors() {
        assert!(EngineError::Validation("empty".into()).is_client_error());
        assert!(EngineError::SessionNotFound("sess_x".into()).is_client_error());
        assert!(EngineError::RoundPending.is_client_error());
        assert!(EngineError::NothingToRetry.is_client_error());
        assert!(!EngineError::Gateway(GatewayError::ProviderOverloaded).is_client_error());
        assert!(!EngineError::Store(StoreError::SchemaTooNew { found: 2, supported: 1 }).is_client_error());
    }

    #[test]
    fn codes() {
        assert_eq!(EngineError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(
            EngineError::from(GatewayError::Timeout(std::time::Duration::from_secs(1))).code(),
            "UPSTREAM_ERROR"
        );
    }
}
