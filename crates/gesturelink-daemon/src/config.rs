//! Configuration loading and validation

use anyhow::Result;
use gesturelink_core::{ButtonRegion, MAX_HANDS};
use gesturelink_serial::{default_port, SerialSettings, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub button: ButtonConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port name (e.g., "COM5" or "/dev/ttyACM0")
    #[serde(default = "default_port_name")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Delay after opening while the board resets
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port_name(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_port_name() -> String {
    default_port().to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    2000 // Uno-class boards reset on open
}

/// Virtual button geometry in frame pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonConfig {
    #[serde(default = "default_button_x")]
    pub x: i32,
    #[serde(default = "default_button_y")]
    pub y: i32,
    #[serde(default = "default_button_width")]
    pub width: i32,
    #[serde(default = "default_button_height")]
    pub height: i32,
    /// Text drawn on the button
    #[serde(default = "default_label")]
    pub label: String,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            x: default_button_x(),
            y: default_button_y(),
            width: default_button_width(),
            height: default_button_height(),
            label: default_label(),
        }
    }
}

fn default_button_x() -> i32 {
    50
}

fn default_button_y() -> i32 {
    380
}

fn default_button_width() -> i32 {
    150
}

fn default_button_height() -> i32 {
    70
}

fn default_label() -> String {
    "LED 1".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Program that prints landmark frames as JSON lines (stdin if unset)
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Hands kept per frame
    #[serde(default = "default_max_hands")]
    pub max_hands: usize,
    /// Hands scored below this are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Mirror frames the detector has not already flipped
    #[serde(default = "default_true")]
    pub mirror: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            max_hands: default_max_hands(),
            min_confidence: default_min_confidence(),
            mirror: true,
        }
    }
}

fn default_max_hands() -> usize {
    MAX_HANDS
}

fn default_min_confidence() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Reject values the wire protocol or geometry cannot represent
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HANDS).contains(&self.detector.max_hands) {
            // Finger counts above 10 have no wire encoding
            anyhow::bail!(
                "detector.max_hands must be within 1..={}, got {}",
                MAX_HANDS,
                self.detector.max_hands
            );
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            anyhow::bail!(
                "detector.min_confidence must be within 0..=1, got {}",
                self.detector.min_confidence
            );
        }
        if self.button.width <= 0 || self.button.height <= 0 {
            anyhow::bail!(
                "button size must be positive, got {}x{}",
                self.button.width,
                self.button.height
            );
        }
        if self.serial.baud_rate == 0 {
            anyhow::bail!("serial.baud_rate must be non-zero");
        }
        Ok(())
    }

    pub fn to_serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            timeout_ms: self.serial.timeout_ms,
            settle_ms: self.serial.settle_ms,
        }
    }

    pub fn button_region(&self) -> ButtonRegion {
        ButtonRegion::new(
            self.button.x,
            self.button.y,
            self.button.width,
            self.button.height,
        )
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.button_region(), ButtonRegion::new(50, 380, 150, 70));
        assert_eq!(config.detector.max_hands, 2);
        assert!(config.detector.mirror);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesturelink.toml");
        std::fs::write(
            &path,
            r#"
[serial]
port = "/dev/ttyUSB1"

[button]
x = 10
label = "Lamp"

[detector]
command = "python3"
args = ["hand_detect.py"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.settle_ms, 2000);
        assert_eq!(config.button.x, 10);
        assert_eq!(config.button.y, 380);
        assert_eq!(config.button.label, "Lamp");
        assert_eq!(config.detector.command.as_deref(), Some("python3"));
        assert_eq!(config.detector.args, vec!["hand_detect.py".to_string()]);

        let settings = config.to_serial_settings();
        assert_eq!(settings.port, "/dev/ttyUSB1");
        assert_eq!(settings.baud_rate, 9600);
    }

    #[test]
    fn test_rejects_too_many_hands() {
        let mut config = Config::default();
        config.detector.max_hands = 3;
        assert!(config.validate().is_err());

        config.detector.max_hands = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        save_default_config(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), Config::default());
    }
}
