// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth transport settings.
    pub bluetooth: BluetoothConfig,

    /// USB transport settings.
    pub usb: UsbConfig,

    /// Link timing.
    pub link: LinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bluetooth: BluetoothConfig::default(),
            usb: UsbConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Device address, "XX:XX:XX:XX:XX:XX". None until the user picks a
    /// device.
    pub address: Option<String>,

    /// Fallback RFCOMM channel, used when the service UUID cannot be
    /// resolved over SDP.
    pub channel: u8,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            address: None,
            channel: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbConfig {
    /// Character device exposed by the accessory-mode kernel driver.
    pub device: PathBuf,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/usb_accessory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Interval between periodic state refresh queries, in milliseconds.
    pub poll_interval_ms: u64,

    /// Window after an outbound change during which echoed replies are
    /// ignored, in milliseconds.
    pub echo_window_ms: u64,

    /// Upper bound for one command write, in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            echo_window_ms: 500,
            write_timeout_ms: 2000,
        }
    }
}

impl LinkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Config {
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clocklink")
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(&config_path, content)?;
            config
        };

        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bluetooth.channel, 1);
        assert_eq!(config.link.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.link.write_timeout(), Duration::from_millis(2000));
        assert!(config.bluetooth.address.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [bluetooth]
            address = "00:11:22:33:44:55"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.bluetooth.address.as_deref(),
            Some("00:11:22:33:44:55")
        );
        assert_eq!(config.bluetooth.channel, 1);
        assert_eq!(config.link.echo_window_ms, 500);
    }
}
