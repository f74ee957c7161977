//! Simulator configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/otaflash/sim.toml`
//! - Windows: `%APPDATA%/otaflash/sim.toml`

use std::path::{Path, PathBuf};

use otaflash_device::DeviceConfig;
use otaflash_protocol::constants::DEFAULT_CHUNK_PAYLOAD;
use serde::{Deserialize, Serialize};

/// Simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host file backing the download slot.
    #[serde(default = "default_slot_path")]
    pub slot_path: PathBuf,

    /// Slot length in bytes.
    #[serde(default = "default_slot_capacity")]
    pub slot_capacity: usize,

    /// Payload bytes per data write.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Period of the transfer clock in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Pause between data writes in milliseconds.
    #[serde(default)]
    pub chunk_delay_ms: u64,

    /// Version word reported by the simulated bootloader.
    #[serde(default = "default_bootloader_version")]
    pub bootloader_version: u32,

    #[serde(default)]
    pub device: DeviceConfig,
}

fn default_slot_path() -> PathBuf {
    std::env::temp_dir().join("otaflash").join("slot0.bin")
}

fn default_slot_capacity() -> usize {
    256 * 1024
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_PAYLOAD
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_bootloader_version() -> u32 {
    0x0100_0000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slot_path: default_slot_path(),
            slot_capacity: default_slot_capacity(),
            chunk_size: default_chunk_size(),
            tick_interval_ms: default_tick_interval(),
            chunk_delay_ms: 0,
            bootloader_version: default_bootloader_version(),
            device: DeviceConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the platform path, or creates a default.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("otaflash")
            .join("sim.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("otaflash").join("sim.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/otaflash/sim.toml"))
    }
}
