//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Pomodoro durations (the timer settings)
//! - The default companion name
//! - Which backend holds notes and habit logs
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::Settings;

/// Timer durations in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_duration")]
    pub work_duration: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration: u32,
    #[serde(default = "default_long_break_duration")]
    pub long_break_duration: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_companion_name")]
    pub default_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite file in the data directory.
    #[default]
    Local,
    /// Supabase-compatible hosted backend.
    Hosted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: Option<String>,
    /// Public API key sent as `apikey` header.
    #[serde(default)]
    pub anon_key: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Print a motivational quote on phase changes.
    #[serde(default = "default_true")]
    pub show_quotes: bool,
}

fn default_work_duration() -> u32 {
    25
}
fn default_break_duration() -> u32 {
    5
}
fn default_long_break_duration() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}
fn default_companion_name() -> String {
    crate::companion::DEFAULT_COMPANION_NAME.into()
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            break_duration: default_break_duration(),
            long_break_duration: default_long_break_duration(),
            sessions_before_long_break: default_sessions_before_long_break(),
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            default_name: default_companion_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            companion: CompanionConfig::default(),
            backend: BackendConfig::default(),
            show_quotes: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data dir>/config.toml`
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The change is validated but
    /// not saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting timer settings are invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        next.settings().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        *self = next;
        Ok(())
    }

    /// Timer settings described by the `[timer]` table.
    pub fn settings(&self) -> Result<Settings, crate::error::ValidationError> {
        Settings::new(
            self.timer.work_duration,
            self.timer.break_duration,
            self.timer.long_break_duration,
            self.timer.sessions_before_long_break,
        )
    }

    pub fn set_settings(&mut self, settings: &Settings) {
        self.timer = TimerConfig {
            work_duration: settings.work_duration,
            break_duration: settings.break_duration,
            long_break_duration: settings.long_break_duration,
            sessions_before_long_break: settings.sessions_before_long_break,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.work_duration, 25);
        assert_eq!(parsed.companion.default_name, "Whiskers");
        assert_eq!(parsed.backend.kind, BackendKind::Local);
        assert!(parsed.show_quotes);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nwork_duration = 50\n").unwrap();
        assert_eq!(parsed.timer.work_duration, 50);
        assert_eq!(parsed.timer.break_duration, 5);
        assert_eq!(parsed.settings().unwrap().work_duration, 50);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.work_duration").as_deref(), Some("25"));
        assert_eq!(cfg.get("backend.kind").as_deref(), Some("local"));
        assert_eq!(cfg.get("show_quotes").as_deref(), Some("true"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("timer.break_duration", "10").unwrap();
        cfg.set("companion.default_name", "Mochi").unwrap();
        cfg.set("backend.kind", "hosted").unwrap();
        cfg.set("backend.url", "https://example.supabase.co").unwrap();
        assert_eq!(cfg.timer.break_duration, 10);
        assert_eq!(cfg.companion.default_name, "Mochi");
        assert_eq!(cfg.backend.kind, BackendKind::Hosted);
        assert_eq!(cfg.backend.url.as_deref(), Some("https://example.supabase.co"));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("show_quotes", "maybe").is_err());
        assert!(cfg.set("timer.work_duration", "soon").is_err());
        assert!(cfg.set("timer.work_duration", "0").is_err());
        assert!(cfg.set("backend.kind", "cloud").is_err());
        assert_eq!(cfg.timer.work_duration, 25);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.timer.sessions_before_long_break, 4);

        let mut cfg = cfg;
        cfg.set_settings(&Settings::new(30, 6, 20, 3).unwrap());
        cfg.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.settings().unwrap(), Settings::new(30, 6, 20, 3).unwrap());
    }
}
