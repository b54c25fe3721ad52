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

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::bluetooth::{Address, SessionConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// File this configuration was loaded from.
    #[serde(skip)]
    pub path: PathBuf,

    /// Bluetooth settings.
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Deadline for connecting and completing the handshake, in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for a single command or status refresh, in seconds.
    pub command_timeout_secs: u64,

    /// Fixed RFCOMM channel. When unset the SPP service record is used.
    pub rfcomm_channel: Option<u8>,

    /// Power the adapter on without asking.
    pub auto_power_on: bool,

    /// Last device connected successfully.
    pub last_device: Option<String>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            command_timeout_secs: 5,
            rfcomm_channel: None,
            auto_power_on: false,
            last_device: None,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/btswitch/config.toml` or the platform equivalent.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("btswitch")
            .join("config.toml")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            debug!("No configuration at {}, writing defaults", path.display());
            let config = Self::default();
            config.write(path)?;
            config
        };

        config.path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        self.write(&self.path)
    }

    fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.bluetooth.connect_timeout_secs == 0 {
            bail!("bluetooth.connect_timeout_secs must be greater than zero");
        }
        if self.bluetooth.command_timeout_secs == 0 {
            bail!("bluetooth.command_timeout_secs must be greater than zero");
        }
        if self.bluetooth.rfcomm_channel.is_some_and(|ch| !(1..=30).contains(&ch)) {
            bail!("bluetooth.rfcomm_channel must be between 1 and 30");
        }
        Ok(())
    }

    /// Session timing derived from the Bluetooth settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.bluetooth.connect_timeout_secs),
            command_timeout: Duration::from_secs(self.bluetooth.command_timeout_secs),
        }
    }

    /// Last connected device, if one was stored and still parses.
    pub fn last_device(&self) -> Option<Address> {
        let stored = self.bluetooth.last_device.as_deref()?;
        match stored.parse() {
            Ok(address) => Some(address),
            Err(_) => {
                warn!("Ignoring invalid last_device {:?}", stored);
                None
            }
        }
    }

    /// Remember `address` as the last connected device.
    pub fn remember_device(&mut self, address: Address) {
        self.bluetooth.last_device = Some(address.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_written_on_first_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("btswitch").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.bluetooth, BluetoothConfig::default());
        assert_eq!(config.session_config().connect_timeout, Duration::from_secs(10));
        assert_eq!(config.session_config().command_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bluetooth]\nrfcomm_channel = 1\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bluetooth.rfcomm_channel, Some(1));
        assert_eq!(config.bluetooth.connect_timeout_secs, 10);
        assert!(!config.bluetooth.auto_power_on);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bluetooth]\nconnect_timeout_secs = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_remember_device_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let address = Address::new([0x00, 0x13, 0xEF, 0x12, 0x34, 0x56]);

        let mut config = Config::load_from(&path).unwrap();
        assert_eq!(config.last_device(), None);
        config.remember_device(address);
        config.save().unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.last_device(), Some(address));
        assert_eq!(
            reloaded.bluetooth.last_device.as_deref(),
            Some("00:13:EF:12:34:56")
        );
    }

    #[test]
    fn test_invalid_last_device_ignored() {
        let mut config = Config::default();
        config.bluetooth.last_device = Some("not-an-address".to_string());
        assert_eq!(config.last_device(), None);
    }
}
