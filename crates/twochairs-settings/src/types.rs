use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOTLINES_URL: &str = "https://www.sos.org.sg/contact";
pub const DEFAULT_RESOURCES_URL: &str =
    "https://www.healthhub.sg/well-being-and-lifestyle/mental-wellness/mental-wellbeing";

/// Base directory for data files (`~/.twochairs`).
pub fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".twochairs")
}

/// Root settings object. Every section falls back to its defaults when
/// missing from the file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server: ServerSettings,
    pub models: ModelSettings,
    pub safety: SafetySettings,
    pub memory: MemorySettings,
    pub tone: ToneSettings,
    pub suggestions: SuggestionSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_path: data_dir().join("database").join("twochairs.db"),
        }
    }
}

/// Language model and moderation endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    pub base_url: String,
    /// Model for the integrated reply, summaries and suggestions.
    pub reply_model: String,
    /// Model for tone labels when `tone.useModel` is on.
    pub tone_model: String,
    pub moderation_model: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            reply_model: "gpt-4.1-mini".to_string(),
            tone_model: "gpt-4.1-mini".to_string(),
            moderation_model: "omni-moderation-latest".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Text and links shown by crisis and escalation responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafetySettings {
    pub hotlines_url: String,
    pub resources_url: String,
    pub redirect_path: String,
    pub popup_message: String,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            hotlines_url: DEFAULT_HOTLINES_URL.to_string(),
            resources_url: DEFAULT_RESOURCES_URL.to_string(),
            redirect_path: "/therapist-room".to_string(),
            popup_message: "Would you like to switch to the 1-on-1 Therapist Room?".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorySettings {
    /// Skip the relevance check for the session summary.
    pub always_include_session_summary: bool,
    /// Skip the relevance check for the user summary.
    pub always_include_user_summary: bool,
    /// Minimum shared keywords for a summary to count as relevant.
    pub min_overlap: usize,
    pub update_user_summary: bool,
    /// Deadline for each best-effort summary call after a round completes.
    pub summary_timeout_secs: u64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            always_include_session_summary: false,
            always_include_user_summary: false,
            min_overlap: 2,
            update_user_summary: true,
            summary_timeout_secs: 20,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToneSettings {
    pub use_model: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionSettings {
    pub timeout_secs: u64,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self { timeout_secs: 20 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub log_to_sqlite: bool,
    pub log_database_path: PathBuf,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_sqlite: true,
            log_database_path: data_dir().join("database").join("logs.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.server.port, 3000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.models.moderation_model, "omni-moderation-latest");
        assert_eq!(s.memory.min_overlap, 2);
        assert!(!s.tone.use_model);
        assert_eq!(s.safety.redirect_path, "/therapist-room");
        assert_eq!(s.suggestions.timeout_secs, 20);
        assert_eq!(s.memory.summary_timeout_secs, 20);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert!(value["models"]["replyModel"].is_string());
        assert!(value["memory"]["minOverlap"].is_number());
        assert!(value["safety"]["hotlinesUrl"].is_string());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let s: Settings = serde_json::from_str(r#"{"tone": {"useModel": true}}"#).unwrap();
        assert!(s.tone.use_model);
        assert_eq!(s.server.port, 3000);
    }
}
