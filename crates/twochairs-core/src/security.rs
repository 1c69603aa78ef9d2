use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Environment variable holding the upstream credential.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Upstream bearer credential. Never printed; zeroized on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Read a key from `var`, ignoring surrounding whitespace.
    /// Unset and blank values are both `None`.
    pub fn from_env(var: &str) -> Option<Self> {
        let raw = std::env::var(var).ok()?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self::new(trimmed))
    }

    /// The raw key, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
