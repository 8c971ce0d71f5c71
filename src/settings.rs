use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::prayer::phase::PhaseConfig;

pub const DEFAULT_ZONE: &str = "TRG01";
pub const MAX_MINUTES: u32 = 120;
pub const MAX_ACTIVE_WINDOW_SECS: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default)]
    pub mosque_name: String,
    #[serde(default)]
    pub mosque_address: String,
    #[serde(default)]
    pub clock: ClockSettings,
    #[serde(default)]
    pub azan: AzanSettings,
    #[serde(default)]
    pub big_timer: BigTimerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClockSettings {
    #[serde(default, rename = "format24h")]
    pub format_24h: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzanSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigTimerSettings {
    #[serde(default = "default_minutes")]
    pub warning_minutes: u32,
    #[serde(default = "default_minutes")]
    pub iqamah_minutes: u32,
    #[serde(default = "default_active_window_seconds")]
    pub active_window_seconds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zone: default_zone(),
            mosque_name: String::new(),
            mosque_address: String::new(),
            clock: ClockSettings::default(),
            azan: AzanSettings::default(),
            big_timer: BigTimerSettings::default(),
        }
    }
}

impl Default for AzanSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            volume: default_volume(),
        }
    }
}

impl Default for BigTimerSettings {
    fn default() -> Self {
        Self {
            warning_minutes: default_minutes(),
            iqamah_minutes: default_minutes(),
            active_window_seconds: default_active_window_seconds(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.zone.trim().is_empty() {
            bail!("zone must not be empty");
        }
        if !self.azan.volume.is_finite() || !(0.0..=1.0).contains(&self.azan.volume) {
            bail!(
                "azan.volume must be between 0.0 and 1.0, got {}",
                self.azan.volume
            );
        }
        if self.big_timer.warning_minutes > MAX_MINUTES {
            bail!(
                "bigTimer.warningMinutes must be at most {MAX_MINUTES}, got {}",
                self.big_timer.warning_minutes
            );
        }
        if self.big_timer.iqamah_minutes > MAX_MINUTES {
            bail!(
                "bigTimer.iqamahMinutes must be at most {MAX_MINUTES}, got {}",
                self.big_timer.iqamah_minutes
            );
        }
        if self.big_timer.active_window_seconds > MAX_ACTIVE_WINDOW_SECS {
            bail!(
                "bigTimer.activeWindowSeconds must be at most {MAX_ACTIVE_WINDOW_SECS}, got {}",
                self.big_timer.active_window_seconds
            );
        }
        Ok(())
    }

    pub fn normalized_zone(&self) -> String {
        self.zone.trim().to_ascii_uppercase()
    }

    pub fn phase_config(&self) -> PhaseConfig {
        PhaseConfig {
            warning_minutes: self.big_timer.warning_minutes,
            iqamah_minutes: self.big_timer.iqamah_minutes,
            active_window_secs: self.big_timer.active_window_seconds,
        }
    }
}

/// The settings document on disk. Keys this program does not model (theme,
/// announcements, ...) are carried through untouched.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    document: Map<String, Value>,
}

impl SettingsStore {
    /// A missing file yields the defaults; nothing is written until a save.
    pub fn load(path: &Path) -> Result<Self> {
        let document = match fs::read_to_string(path) {
            Ok(content) => parse_document(&content)
                .with_context(|| format!("invalid settings file {}", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("unable to read settings file {}", path.display()));
            }
        };
        let store = Self {
            path: path.to_path_buf(),
            document,
        };
        store.settings()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings = serde_json::from_value::<Settings>(Value::Object(self.document.clone()))
            .context("settings do not match the expected shape")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with the stored document, as served to clients.
    pub fn document(&self) -> Value {
        let mut merged = match serde_json::to_value(Settings::default()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.document {
            merged.insert(key.clone(), value.clone());
        }
        Value::Object(merged)
    }

    /// Shallow merge: each top-level key in `patch` replaces the stored one.
    /// The file is only written when the merged result validates.
    pub fn apply_patch(&mut self, patch: Value) -> Result<Settings> {
        let Value::Object(patch) = patch else {
            bail!("settings update must be a JSON object");
        };
        let mut candidate = self.clone();
        for (key, value) in patch {
            candidate.document.insert(key, value);
        }
        let settings = candidate.settings()?;
        candidate.save()?;
        *self = candidate;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.document())?;
        fs::write(&self.path, format!("{text}\n"))
            .with_context(|| format!("unable to write settings file {}", self.path.display()))?;
        Ok(())
    }
}

fn parse_document(content: &str) -> Result<Map<String, Value>> {
    let value = serde_json::from_str::<Value>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("settings must be a JSON object"),
    }
}

fn default_zone() -> String {
    DEFAULT_ZONE.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_volume() -> f32 {
    0.8
}

fn default_minutes() -> u32 {
    10
}

fn default_active_window_seconds() -> u32 {
    15
}
