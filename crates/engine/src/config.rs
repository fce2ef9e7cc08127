//! Array configuration via `tessera.toml`
//!
//! A handful of knobs that change how arrays are opened and validated. The
//! file is optional: every field has a default, and an empty file parses to
//! [`ArrayConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::{TesseraError, TesseraResult};
use tessera_schema::{
    EnumerationLimits, DEFAULT_ENUMERATION_MAX_SIZE, DEFAULT_ENUMERATION_MAX_TOTAL_SIZE,
};

/// Config file name placed next to the arrays it governs.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Array configuration loaded from `tessera.toml`.
///
/// # Example
///
/// ```toml
/// load_fragments_on_open = true
/// enumeration_max_size = 10485760
/// enumeration_max_total_size = 52428800
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Load fragment metadata when opening for reads.
    #[serde(default = "default_load_fragments_on_open")]
    pub load_fragments_on_open: bool,
    /// Maximum size in bytes of a single enumeration.
    #[serde(default = "default_enumeration_max_size")]
    pub enumeration_max_size: u64,
    /// Maximum size in bytes of all enumerations of one schema.
    #[serde(default = "default_enumeration_max_total_size")]
    pub enumeration_max_total_size: u64,
}

fn default_load_fragments_on_open() -> bool {
    true
}

fn default_enumeration_max_size() -> u64 {
    DEFAULT_ENUMERATION_MAX_SIZE
}

fn default_enumeration_max_total_size() -> u64 {
    DEFAULT_ENUMERATION_MAX_TOTAL_SIZE
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            load_fragments_on_open: default_load_fragments_on_open(),
            enumeration_max_size: default_enumeration_max_size(),
            enumeration_max_total_size: default_enumeration_max_total_size(),
        }
    }
}

impl ArrayConfig {
    /// Check that the size limits are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a limit is zero or the per-enumeration limit
    /// exceeds the total limit.
    pub fn validate(&self) -> TesseraResult<()> {
        if self.enumeration_max_size == 0 || self.enumeration_max_total_size == 0 {
            return Err(TesseraError::validation(
                "Invalid enumeration size limit in tessera.toml; limits must be greater than zero.",
            ));
        }
        if self.enumeration_max_size > self.enumeration_max_total_size {
            return Err(TesseraError::validation(format!(
                "Invalid enumeration size limits in tessera.toml; enumeration_max_size ({}) exceeds enumeration_max_total_size ({}).",
                self.enumeration_max_size, self.enumeration_max_total_size
            )));
        }
        Ok(())
    }

    /// Enumeration limits for [`tessera_schema::ArraySchema::check`].
    pub fn enumeration_limits(&self) -> EnumerationLimits {
        EnumerationLimits {
            max_size: self.enumeration_max_size,
            max_total_size: self.enumeration_max_total_size,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tessera array configuration
#
# Load fragment metadata when an array is opened for reads (default: true).
# When false, reads see the schemas only and an empty non-empty domain.
load_fragments_on_open = true

# Maximum size in bytes of one enumeration, data plus offsets (default: 10 MiB).
enumeration_max_size = 10485760

# Maximum size in bytes of all enumerations of a schema (default: 50 MiB).
enumeration_max_total_size = 52428800
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> TesseraResult<Self> {
        let config: ArrayConfig = toml::from_str(content).map_err(|e| {
            TesseraError::validation(format!("Failed to parse array config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> TesseraResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::storage(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> TesseraResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                TesseraError::storage(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> TesseraResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| {
                TesseraError::serialization(format!("Failed to serialize config: {}", e))
            })?;
        std::fs::write(path, content).map_err(|e| {
            TesseraError::storage(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_loads_fragments() {
        let config = ArrayConfig::default();
        assert!(config.load_fragments_on_open);
        assert_eq!(config.enumeration_limits(), EnumerationLimits::default());
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config = ArrayConfig::from_toml_str(ArrayConfig::default_toml()).unwrap();
        assert_eq!(config, ArrayConfig::default());
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let config = ArrayConfig::from_toml_str("load_fragments_on_open = false").unwrap();
        assert!(!config.load_fragments_on_open);
        assert_eq!(config.enumeration_max_size, DEFAULT_ENUMERATION_MAX_SIZE);
    }

    #[test]
    fn parse_wrong_type_returns_error() {
        assert!(ArrayConfig::from_toml_str("load_fragments_on_open = \"yes\"").is_err());
    }

    #[test]
    fn inverted_limits_rejected() {
        let err = ArrayConfig::from_toml_str(
            "enumeration_max_size = 100\nenumeration_max_total_size = 10",
        )
        .unwrap_err();
        assert!(matches!(err, TesseraError::Validation { .. }));
        assert!(ArrayConfig::from_toml_str("enumeration_max_size = 0").is_err());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        ArrayConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = ArrayConfig::from_file(&path).unwrap();
        assert!(config.load_fragments_on_open);
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "load_fragments_on_open = false\n").unwrap();
        ArrayConfig::write_default_if_missing(&path).unwrap();

        let config = ArrayConfig::from_file(&path).unwrap();
        assert!(!config.load_fragments_on_open);
    }

    #[test]
    fn from_file_with_empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = ArrayConfig::from_file(&path).unwrap();
        assert_eq!(config, ArrayConfig::default());
    }

    #[test]
    fn from_missing_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let err = ArrayConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, TesseraError::Storage { .. }));
    }

    #[test]
    fn from_file_applies_text_parsing_and_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "load_fragments_on_open = \"yes\"\n").unwrap();
        let err = ArrayConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse array config"));

        std::fs::write(&path, "enumeration_max_size = 0\n").unwrap();
        let err = ArrayConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TesseraError::Validation { .. }));
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = ArrayConfig {
            load_fragments_on_open: false,
            enumeration_max_size: 1024,
            enumeration_max_total_size: 4096,
        };
        config.write_to_file(&path).unwrap();

        let loaded = ArrayConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.enumeration_limits().max_total_size, 4096);
    }
}
