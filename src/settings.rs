use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, sync::RwLock};

use crate::alerts::AlertSettings;
use crate::timer::{DetectionMode, SessionConfig};

/// Env var that enables per-tick heartbeats.
pub const DEBUG_ENV: &str = "FOCUSCAM_DEBUG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub session: SessionConfig,
    pub alerts: AlertSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid settings in {}", path.display()))?
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> Result<UserSettings> {
        self.data
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    /// The validated session configuration, with the debug heartbeat override
    /// applied when `FOCUSCAM_DEBUG=1`.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let debug = env::var(DEBUG_ENV).map(|v| v == "1").unwrap_or(false);
        let config = with_debug_override(self.read()?.session, debug);
        config.validate().context("Invalid session settings")?;
        Ok(config)
    }

    pub fn alerts(&self) -> Result<AlertSettings> {
        Ok(self.read()?.alerts)
    }

    /// Remembers the detection mode for the next run and writes the file back.
    pub fn set_mode(&self, mode: DetectionMode) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        guard.session.mode = mode;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn with_debug_override(mut config: SessionConfig, debug: bool) -> SessionConfig {
    if debug {
        config.heartbeat_every_ticks = 1;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("focuscam-{}-{name}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = SettingsStore::new(temp_path("missing")).unwrap();
        let config = store.session_config().unwrap();
        assert_eq!(config.focus_secs, 25 * 60);
        assert_eq!(config.break_secs, 5 * 60);
        assert_eq!(config.total_sets, 1);
        assert_eq!(config.mode, DetectionMode::Default);
        assert!(store.alerts().unwrap().enabled);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let path = temp_path("partial");
        fs::write(
            &path,
            concat!(
                r#"{"session":{"focusSecs":50,"totalSets":2,"mode":"penGated"},"#,
                r#""alerts":{"volume":0.2}}"#
            ),
        )
        .unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        let config = store.session_config().unwrap();
        assert_eq!(config.focus_secs, 50);
        assert_eq!(config.total_sets, 2);
        assert_eq!(config.mode, DetectionMode::PenGated);
        assert_eq!(config.break_secs, 5 * 60);
        assert_eq!(store.alerts().unwrap().volume, 0.2);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "{ not json").unwrap();
        assert!(SettingsStore::new(path.clone()).is_err());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn invalid_session_settings_are_rejected() {
        let path = temp_path("invalid");
        fs::write(&path, r#"{"session":{"totalSets":0}}"#).unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        assert!(store.session_config().is_err());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn set_mode_persists_and_keeps_other_fields() {
        let path = temp_path("persist");
        fs::write(&path, r#"{"session":{"focusSecs":600}}"#).unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_mode(DetectionMode::PhoneAlerts).unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        let config = reloaded.session_config().unwrap();
        assert_eq!(config.mode, DetectionMode::PhoneAlerts);
        assert_eq!(config.focus_secs, 600);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn debug_override_forces_heartbeat_every_tick() {
        let config = with_debug_override(SessionConfig::default(), true);
        assert_eq!(config.heartbeat_every_ticks, 1);
        let config = with_debug_override(SessionConfig::default(), false);
        assert_eq!(config.heartbeat_every_ticks, 10);
    }
}
