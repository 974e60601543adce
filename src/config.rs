//! Persistent configuration
//!
//! Stored as TOML, by default at `<config dir>/logi-vhid/config.toml`.
//! Every field has a default, so a partial file is valid and a missing file
//! means "all defaults".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context};
use logi_vhid_input::{ScreenBounds, Timing};
use logi_vhid_transport::protocol::paths;
use serde::{Deserialize, Serialize};

/// Delays in milliseconds (zero is raised to 1 ms when applied)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tap_delay_ms: u64,
    pub click_delay_ms: u64,
    pub inter_key_delay_ms: u64,
    /// Wait after device creation before opening the input endpoint
    pub settle_delay_ms: u64,
    pub move_step_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tap_delay_ms: 10,
            click_delay_ms: 10,
            inter_key_delay_ms: 5,
            settle_delay_ms: 200,
            move_step_delay_ms: 1,
        }
    }
}

impl TimingConfig {
    pub fn timing(&self) -> Timing {
        Timing {
            tap_delay: Duration::from_millis(self.tap_delay_ms),
            click_delay: Duration::from_millis(self.click_delay_ms),
            inter_key_delay: Duration::from_millis(self.inter_key_delay_ms),
            move_step_delay: Duration::from_millis(self.move_step_delay_ms),
        }
        .normalized()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        let bounds = ScreenBounds::default();
        Self {
            width: bounds.width,
            height: bounds.height,
        }
    }
}

impl ScreenConfig {
    pub fn bounds(&self) -> ScreenBounds {
        ScreenBounds {
            width: self.width,
            height: self.height,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhidConfig {
    /// Bus control endpoint
    pub bus_path: String,
    /// Input endpoint candidates, tried in order
    pub input_paths: Vec<String>,
    /// Take over our devices left on the bus instead of creating new ones
    pub adopt_existing: bool,
    pub timing: TimingConfig,
    pub screen: ScreenConfig,
}

impl Default for VhidConfig {
    fn default() -> Self {
        Self {
            bus_path: paths::BUS_DEVICE_PATH.to_string(),
            input_paths: paths::default_input_paths(),
            adopt_existing: true,
            timing: TimingConfig::default(),
            screen: ScreenConfig::default(),
        }
    }
}

impl VhidConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("logi-vhid")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: VhidConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.bus_path.is_empty(), "bus_path must not be empty");
        ensure!(
            !self.input_paths.is_empty(),
            "input_paths needs at least one candidate"
        );
        ensure!(
            self.screen.width > 0 && self.screen.height > 0,
            "screen size must be non-zero"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_lghub_bus() {
        let config = VhidConfig::default();
        assert_eq!(config.bus_path, paths::BUS_DEVICE_PATH);
        assert_eq!(config.input_paths.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: VhidConfig = toml::from_str(
            r#"
[timing]
tap_delay_ms = 40

[screen]
width = 2560
"#,
        )
        .unwrap();
        assert_eq!(config.timing.tap_delay_ms, 40);
        assert_eq!(config.timing.click_delay_ms, 10);
        assert_eq!(config.screen.width, 2560);
        assert_eq!(config.screen.height, 1080);
        assert_eq!(config.bus_path, paths::BUS_DEVICE_PATH);
    }

    #[test]
    fn zero_delays_become_one_millisecond() {
        let timing = TimingConfig {
            tap_delay_ms: 0,
            settle_delay_ms: 0,
            ..Default::default()
        };
        assert_eq!(timing.timing().tap_delay, Duration::from_millis(1));
        assert_eq!(timing.settle_delay(), Duration::from_millis(1));
    }

    #[test]
    fn empty_candidates_rejected() {
        let config = VhidConfig {
            input_paths: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("logi-vhid-test-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let mut config = VhidConfig::default();
        config.screen.height = 1440;
        config.save(&path).unwrap();
        assert_eq!(VhidConfig::load(&path).unwrap(), config);
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(VhidConfig::load(&path).unwrap(), VhidConfig::default());
    }
}
