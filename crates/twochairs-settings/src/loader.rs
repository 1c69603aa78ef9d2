//! Settings loading with deep merge and environment variable overrides.
//!
//! 1. Start with compiled [`Settings::default()`]
//! 2. If `~/.twochairs/settings.json` exists, deep-merge it over the defaults
//! 3. Apply environment variable overrides (highest priority)

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{data_dir, Settings};

/// `~/.twochairs/settings.json`.
pub fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// All three layers, reading the file at `path`. A missing file is not an
/// error; an unreadable or malformed one is.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the file merged on top, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<Settings> {
    let mut document = serde_json::to_value(Settings::default())?;

    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let overlay: Value = serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "merging settings file");
            document = deep_merge(document, overlay);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    Ok(serde_json::from_value(document)?)
}

/// Overlay `source` onto `target`. Objects merge key by key; any other
/// value replaces what was there, except `null`, which is ignored.
pub fn deep_merge(mut target: Value, source: Value) -> Value {
    merge_into(&mut target, source);
    target
}

fn merge_into(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None if !value.is_null() => {
                        base.insert(key, value);
                    }
                    None => {}
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Reads overrides through `lookup`, dropping blank and invalid values.
struct Overrides<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Overrides<F> {
    fn text(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &str, accept: impl Fn(&T) -> bool) -> Option<T> {
        let raw = self.text(name)?;
        let value = raw.parse().ok().filter(|v| accept(v));
        if value.is_none() {
            warn!(key = name, value = %raw, "ignoring invalid environment override");
        }
        value
    }
}

/// Apply overrides from any variable source; the process environment in
/// production, a map in tests.
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let env = Overrides { lookup };

    if let Some(port) = env.parsed("PORT", |p: &u16| *p > 0) {
        settings.server.port = port;
    }
    if let Some(host) = env.text("TWOCHAIRS_HOST") {
        settings.server.host = host;
    }
    if let Some(db) = env.text("TWOCHAIRS_DB") {
        settings.server.database_path = PathBuf::from(db);
    }

    let models = &mut settings.models;
    for (name, slot) in [
        ("OPENAI_BASE_URL", &mut models.base_url),
        ("REPLY_MODEL", &mut models.reply_model),
        ("TONE_MODEL", &mut models.tone_model),
        ("MOD_MODEL", &mut models.moderation_model),
        ("SOS_HOTLINES_URL", &mut settings.safety.hotlines_url),
        ("SOS_RESOURCES_URL", &mut settings.safety.resources_url),
    ] {
        if let Some(value) = env.text(name) {
            *slot = value;
        }
    }

    if let Some(raw) = env.text("TWOCHAIRS_USE_MODEL_TONE") {
        match parse_bool(&raw) {
            Some(flag) => settings.tone.use_model = flag,
            None => warn!(key = "TWOCHAIRS_USE_MODEL_TONE", value = %raw, "ignoring invalid environment override"),
        }
    }
    if let Some(n) = env.parsed("TWOCHAIRS_MIN_OVERLAP", |n: &usize| in_range(n, 1..=100)) {
        settings.memory.min_overlap = n;
    }
}

/// Case-insensitive `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn in_range<T: PartialOrd>(value: &T, range: RangeInclusive<T>) -> bool {
    range.contains(value)
}
