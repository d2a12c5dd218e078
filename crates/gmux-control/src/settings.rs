//! Daemon settings.
//!
//! Settings are layered: compiled defaults, then the config file, then
//! command-line overrides, merged with [`Settings::merge`]. Only values
//! that differ from the defaults override lower layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings of the code execution core.
///
/// # Example
///
/// ```
/// use gmux_control::Settings;
///
/// let mut settings = Settings::default();
/// let overrides = Settings::from_toml("base_directory = \"/opt/machine\"").unwrap();
/// settings.merge(&overrides);
/// assert_eq!(settings.base_directory.to_str(), Some("/opt/machine"));
/// assert_eq!(settings.config_override, "config-override.g");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Physical directory the virtual `0:/` root maps to.
    pub base_directory: PathBuf,

    /// File name of the configuration override written by `M500`,
    /// resolved in the system directory.
    pub config_override: String,

    /// File name of the IAP binary streamed first by `M997`, resolved in
    /// the firmware directory.
    pub iap_file: String,

    /// File name of the firmware binary streamed by `M997`, resolved in
    /// the firmware directory.
    pub firmware_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("/opt/gmux/sd"),
            config_override: "config-override.g".into(),
            iap_file: "iap.bin".into(),
            firmware_file: "firmware.bin".into(),
        }
    }
}

impl Settings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has wrong
    /// field types.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges `other` into `self`; only non-default values override.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.base_directory != default.base_directory {
            self.base_directory = other.base_directory.clone();
        }
        if other.config_override != default.config_override {
            self.config_override = other.config_override.clone();
        }
        if other.iap_file != default.iap_file {
            self.iap_file = other.iap_file.clone();
        }
        if other.firmware_file != default.firmware_file {
            self.firmware_file = other.firmware_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_round_trip() {
        let settings = Settings {
            base_directory: PathBuf::from("/var/lib/machine"),
            config_override: "override.g".into(),
            ..Settings::default()
        };
        let toml_str = settings.to_toml().unwrap();
        let back = Settings::from_toml(&toml_str).unwrap();
        assert_eq!(settings, back);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let settings = Settings::from_toml("config_override = \"x.g\"").unwrap();
        assert_eq!(settings.config_override, "x.g");
        assert_eq!(settings.base_directory, Settings::default().base_directory);
    }

    #[test]
    fn merge_prefers_non_default_values() {
        let mut base = Settings {
            base_directory: PathBuf::from("/a"),
            ..Settings::default()
        };
        let layer = Settings {
            iap_file: "new-iap.bin".into(),
            ..Settings::default()
        };
        base.merge(&layer);
        // The layer's default base_directory does not clobber /a.
        assert_eq!(base.base_directory, PathBuf::from("/a"));
        assert_eq!(base.iap_file, "new-iap.bin");
    }
}
