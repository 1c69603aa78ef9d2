use async_trait::async_trait;

use crate::errors::GatewayError;

/// Options controlling a single generation call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

/// The language model collaborator: one prompt in, one text out.
///
/// Used for the integrated reply, the rolling summaries, suggestion
/// generation and (optionally) tone classification. An empty system prompt
/// means the call carries only the user prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_is_unset() {
        let opts = GenerateOptions::default();
        assert!(opts.temperature.is_none());
        assert!(opts.max_output_tokens.is_none());
    }

    #[test]
    fn with_temperature_sets_only_temperature() {
        let opts = GenerateOptions::with_temperature(0.3);
        assert_eq!(opts.temperature, Some(0.3));
        assert!(opts.max_output_tokens.is_none());
    }
}
