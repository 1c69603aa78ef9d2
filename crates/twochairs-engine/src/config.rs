//! Behaviour switches for the orchestrator, built once from `Settings`.

use std::time::Duration;

use twochairs_settings::{Settings, DEFAULT_HOTLINES_URL, DEFAULT_RESOURCES_URL};

/// How self-turn negativity is judged after a completed round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToneMode {
    /// Local phrase patterns only.
    #[default]
    Local,
    /// Ask the tone model, falling back to local patterns on any failure.
    Model,
}

/// Links and text shown to the user by safety responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyCopy {
    pub hotlines_url: String,
    pub resources_url: String,
    pub redirect_path: String,
    pub popup_message: String,
}

impl Default for SafetyCopy {
    fn default() -> Self {
        Self {
            hotlines_url: DEFAULT_HOTLINES_URL.to_string(),
            resources_url: DEFAULT_RESOURCES_URL.to_string(),
            redirect_path: "/therapist-room".to_string(),
            popup_message: "Would you like to switch to the 1-on-1 Therapist Room?".to_string(),
        }
    }
}

/// Per-instance behaviour switches for [`crate::RoundOrchestrator`].
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub tone: ToneMode,
    pub always_include_session_summary: bool,
    pub always_include_user_summary: bool,
    pub min_overlap: usize,
    pub update_user_summary: bool,
    pub suggestion_timeout: Duration,
    /// Deadline for each summary call made after a round completes.
    pub summary_timeout: Duration,
    pub safety: SafetyCopy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tone: ToneMode::Local,
            always_include_session_summary: false,
            always_include_user_summary: false,
            min_overlap: 2,
            update_user_summary: true,
            suggestion_timeout: Duration::from_secs(20),
            summary_timeout: Duration::from_secs(20),
            safety: SafetyCopy::default(),
        }
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            tone: if settings.tone.use_model {
                ToneMode::Model
            } else {
                ToneMode::Local
            },
            always_include_session_summary: settings.memory.always_include_session_summary,
            always_include_user_summary: settings.memory.always_include_user_summary,
            min_overlap: settings.memory.min_overlap,
            update_user_summary: settings.memory.update_user_summary,
            suggestion_timeout: Duration::from_secs(settings.suggestions.timeout_secs),
            summary_timeout: Duration::from_secs(settings.memory.summary_timeout_secs),
            safety: SafetyCopy {
                hotlines_url: settings.safety.hotlines_url.clone(),
                resources_url: settings.safety.resources_url.clone(),
                redirect_path: settings.safety.redirect_path.clone(),
                popup_message: settings.safety.popup_message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_from_settings() {
        let mut settings = Settings::default();
        settings.tone.use_model = true;
        settings.memory.min_overlap = 5;
        settings.suggestions.timeout_secs = 3;
        settings.memory.summary_timeout_secs = 7;
        settings.safety.hotlines_url = "https://example.org/hotlines".into();

        let config = OrchestratorConfig::from(&settings);
        assert_eq!(config.tone, ToneMode::Model);
        assert_eq!(config.min_overlap, 5);
        assert_eq!(config.suggestion_timeout, Duration::from_secs(3));
        assert_eq!(config.summary_timeout, Duration::from_secs(7));
        assert_eq!(config.safety.hotlines_url, "https://example.org/hotlines");
    }

    #[test]
    fn defaults_match_settings_defaults() {
        let from_settings = OrchestratorConfig::from(&Settings::default());
        let default = OrchestratorConfig::default();
        assert_eq!(from_settings.tone, default.tone);
        assert_eq!(from_settings.min_overlap, default.min_overlap);
        assert_eq!(from_settings.summary_timeout, default.summary_timeout);
        assert_eq!(from_settings.safety, default.safety);
    }
}
