use std::time::Duration;

/// How the retry layer should treat a failed upstream call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The same request will fail again.
    Fatal,
    /// Transient; back off and try again.
    Retryable,
    /// Neither; surfaced as-is (e.g. our own deadline expired).
    Operational,
}

/// Failure of a call to the Language Model or Moderation Service.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("upstream returned {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("upstream overloaded")]
    ProviderOverloaded,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthenticationFailed(_) | Self::InvalidRequest(_) | Self::MalformedResponse(_) => {
                ErrorClass::Fatal
            }
            Self::RateLimited { .. }
            | Self::ServerError { .. }
            | Self::ProviderOverloaded
            | Self::NetworkError(_) => ErrorClass::Retryable,
            Self::Timeout(_) => ErrorClass::Operational,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    /// Server-provided wait before the next attempt.
    pub fn suggested_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Stable snake_case label for log fields.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::ProviderOverloaded => "provider_overloaded",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Map a non-success HTTP status without a `Retry-After` hint.
    pub fn from_status(status: u16, body: String) -> Self {
        Self::from_response(status, None, body)
    }

    /// Map a non-success HTTP status. `retry_after` only applies to 429.
    pub fn from_response(status: u16, retry_after: Option<Duration>, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            429 => Self::RateLimited { retry_after },
            503 | 529 => Self::ProviderOverloaded,
            500..=599 => Self::ServerError { status, body },
            400..=499 => Self::InvalidRequest(body),
            other => Self::InvalidRequest(format!("unexpected status {other}: {body}")),
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}
