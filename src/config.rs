//! Configuration: response settings plus the key → action binding table.
//!
//! The file is YAML. A missing file is not an error, it just means default
//! settings and an empty binding table. The live config is shared with the
//! reader as an `Arc<Mutex<..>>` slot; the reader locks it briefly at the
//! start of every mapping pass, so edits and hot reloads swap it wholesale
//! without coordinating with the read loop beyond that lock.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::curve::Settings;
use crate::mapping::KeyAction;

pub const APP_NAME: &str = "hallpad";
pub const APP_COMMAND_NAME: &str = "hallpad";
pub const APP_VERSION_STR: &str = "0.3";
pub const APP_LONG_NAME: &str = "Analog HID Keyboard to Virtual Gamepad Bridge";
pub const APP_ABOUT: &str = APP_LONG_NAME;
pub const APP_DEFAULT_CONFIG_FILE: &str = "hallpad_cfg.yaml";
pub const APP_DEFAULT_MAX_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    /// Key id (decimal string form) to bound action.
    pub mappings: HashMap<String, KeyAction>,
}

/// The hot-swappable config slot shared between consumer and reader.
pub type SharedConfig = Arc<Mutex<Config>>;

pub struct ConfigManager {
    cfg_file_path: PathBuf,
    config: Config,
    debug: bool,
}

impl ConfigManager {
    pub fn new(cfg_file_path: &Path, debug: bool) -> Self {
        Self {
            cfg_file_path: cfg_file_path.to_path_buf(),
            config: Config::default(),
            debug,
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if !self.cfg_file_path.exists() {
            info!(
                "Config file {} not found, using defaults (empty binding table).",
                self.cfg_file_path.display()
            );
            self.config = Config::default();
            return Ok(());
        }

        let raw = fs::read_to_string(&self.cfg_file_path).context(format!(
            "Failed to read config file {}",
            self.cfg_file_path.display()
        ))?;
        self.config = serde_yaml::from_str(&raw).context(format!(
            "Failed to parse config file {}",
            self.cfg_file_path.display()
        ))?;

        if self.debug {
            log::debug!(
                "Loaded config: {} binding(s), settings {:?}",
                self.config.mappings.len(),
                self.config.settings
            );
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&self.config).context("Failed to serialize config")?;
        fs::write(&self.cfg_file_path, yaml).context(format!(
            "Failed to write config file {}",
            self.cfg_file_path.display()
        ))?;
        Ok(())
    }

    /// Non-fatal sanity checks. Degenerate values are tolerated at runtime
    /// (the curve mapper yields zero for them), but worth surfacing.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let s = &self.config.settings;

        if s.max_pressure <= s.deadzone {
            warnings.push(format!(
                "max_pressure ({}) must exceed deadzone ({}); all analog output will be zero",
                s.max_pressure, s.deadzone
            ));
        }
        if s.sensitivity <= 0.0 {
            warnings.push(format!(
                "sensitivity ({}) is not positive; all analog output will be zero",
                s.sensitivity
            ));
        }
        for key in self.config.mappings.keys() {
            if key.parse::<u8>().is_err() {
                warnings.push(format!(
                    "binding key '{key}' is not a valid key id (expected 0-255)"
                ));
            }
        }
        warnings
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    /// Move the loaded config into the shared slot form the reader uses.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(Mutex::new(self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::PressureCurve;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::new(&dir.path().join("nope.yaml"), false);
        manager.load().unwrap();
        assert_eq!(*manager.get_config(), Config::default());
        assert!(manager.get_config().mappings.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hallpad_cfg.yaml");

        let mut manager = ConfigManager::new(&path, false);
        manager.config.settings.deadzone = 42;
        manager.config.settings.curve = PressureCurve::Aggressive;
        manager
            .config
            .mappings
            .insert("4".to_string(), KeyAction::RightTrigger);
        manager.save().unwrap();

        let mut reloaded = ConfigManager::new(&path, false);
        reloaded.load().unwrap();
        assert_eq!(reloaded.get_config().settings.deadzone, 42);
        assert_eq!(
            reloaded.get_config().settings.curve,
            PressureCurve::Aggressive
        );
        assert_eq!(
            reloaded.get_config().mappings.get("4"),
            Some(&KeyAction::RightTrigger)
        );
    }

    #[test]
    fn test_parse_hand_written_config() {
        let yaml = "\
settings:
  deadzone: 30
  sensitivity: 1.25
  max_pressure: 600
  analog_mode: true
  curve: smooth
mappings:
  \"4\": left_stick_x_minus
  \"7\": left_stick_x_plus
  \"44\": button_a
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings.curve, PressureCurve::Smooth);
        assert_eq!(config.mappings.len(), 3);
        assert_eq!(config.mappings.get("44"), Some(&KeyAction::ButtonA));
    }

    #[test]
    fn test_validate_flags_degenerate_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::new(&dir.path().join("c.yaml"), false);
        manager.config.settings.deadzone = 700;
        manager.config.settings.max_pressure = 600;
        manager.config.settings.sensitivity = 0.0;
        manager
            .config
            .mappings
            .insert("not-a-key".to_string(), KeyAction::ButtonA);

        let warnings = manager.validate();
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_validate_clean_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::new(&dir.path().join("c.yaml"), false);
        manager
            .config
            .mappings
            .insert("225".to_string(), KeyAction::LeftTrigger);
        assert!(manager.validate().is_empty());
    }
}
