//! Viewer configuration management

use anyhow::{Context, Result, anyhow};
use hid_adapter::LibraryOverrides;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub viewer: ViewerSettings,
    /// Native library overrides
    #[serde(default)]
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "ViewerSettings::default_log_level")]
    pub log_level: String,
    /// Device filter (VID:PID format, e.g. "0x046d:*"; "*:*" lists everything)
    #[serde(default = "ViewerSettings::default_filter")]
    pub filter: String,
    /// Wait for a keypress before exiting
    #[serde(default = "ViewerSettings::default_wait_for_key")]
    pub wait_for_key: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            filter: Self::default_filter(),
            wait_for_key: Self::default_wait_for_key(),
        }
    }
}

impl ViewerSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_filter() -> String {
        "*:*".to_string()
    }

    fn default_wait_for_key() -> bool {
        true
    }
}

/// Library file names or paths per pointer width
///
/// When unset, the platform's file name for `hidapi32` / `hidapi64` is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_32: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_64: Option<String>,
}

impl ViewerConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/hid-adapter/viewer.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ViewerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("hid-adapter").join("viewer.toml")
        } else {
            PathBuf::from(".config/hid-adapter/viewer.toml")
        }
    }

    /// Filter as (vendor_id, product_id), with 0 for a wildcard
    pub fn filter_ids(&self) -> Result<(u16, u16)> {
        parse_filter(&self.viewer.filter)
    }

    /// Library overrides with `~` expanded
    pub fn library_overrides(&self) -> LibraryOverrides {
        let expand = |p: &Option<String>| p.as_deref().map(|p| shellexpand::tilde(p).into_owned());
        LibraryOverrides {
            bits32: expand(&self.transport.library_32),
            bits64: expand(&self.transport.library_64),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.viewer.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.viewer.log_level,
                valid_levels.join(", ")
            ));
        }

        parse_filter(&self.viewer.filter)?;

        for library in [&self.transport.library_32, &self.transport.library_64]
            .into_iter()
            .flatten()
        {
            if library.trim().is_empty() {
                return Err(anyhow!("Empty library name in [transport]"));
            }
        }

        Ok(())
    }
}

/// Parse a `VID:PID` filter; `*` matches anything and maps to 0
pub fn parse_filter(filter: &str) -> Result<(u16, u16)> {
    let Some((vid, pid)) = filter.split_once(':') else {
        return Err(anyhow!(
            "Invalid filter format '{}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')",
            filter
        ));
    };

    Ok((parse_hex_id(vid, "VID", filter)?, parse_hex_id(pid, "PID", filter)?))
}

fn parse_hex_id(id: &str, name: &str, filter: &str) -> Result<u16> {
    if id == "*" {
        return Ok(0);
    }

    let hex_part = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| {
            anyhow!(
                "Invalid {} '{}' in filter '{}', must start with '0x' (e.g., '0x1234')",
                name,
                id,
                filter
            )
        })?;

    if hex_part.is_empty() || hex_part.len() > 4 {
        return Err(anyhow!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name,
            id
        ));
    }

    u16::from_str_radix(hex_part, 16)
        .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
}
