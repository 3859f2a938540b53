//! Configuration
//!
//! Reads configuration from `.xformlinkrc.yaml`, `.xformlinkrc.yml` or
//! `.xformlinkrc.json` in the working directory, or from an explicit path.
//! Command-line flags are merged on top with [`Config::merge_cli`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Namespace of XForms instance elements
pub const XFORMS_NAMESPACE: &str = "http://www.w3.org/2002/xforms";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Where and how edited documents are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Written as `<stem>-<suffix>.xml`; `None` rewrites the source in place
    pub suffix: Option<String>,

    /// Replace suffixed outputs that already exist
    pub overwrite: bool,

    /// Insert a version comment on the second line of each output
    pub stamp_version: bool,

    /// Report format
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: None,
            overwrite: false,
            stamp_version: true,
            format: OutputFormat::Text,
        }
    }
}

/// Cross-form validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    /// Unresolved references fail the batch and remove its output
    pub strict: bool,

    /// Report forms whose instance has no `meta/logging` element
    pub require_logging: bool,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            strict: true,
            require_logging: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Literal tokens removed from every line
    pub placeholders: Vec<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,

    pub linking: LinkingConfig,

    pub normalize: NormalizeConfig,

    /// Namespace URI used to qualify instance paths during validation
    pub namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            linking: LinkingConfig::default(),
            normalize: NormalizeConfig::default(),
            namespace: XFORMS_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the working directory, or defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load the first config file found in `dir`, or defaults
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let config_names = [".xformlinkrc.yaml", ".xformlinkrc.yml", ".xformlinkrc.json"];

        for name in &config_names {
            let path: PathBuf = dir.join(name);
            if path.exists() {
                log::debug!("Loading configuration from {}", path.display());
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(suffix) = &self.output.suffix {
            if suffix.is_empty() || suffix.starts_with('-') {
                return Err(ConfigError::Invalid(format!(
                    "Output suffix must be non-empty and must not start with '-': \"{}\"",
                    suffix
                )));
            }
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("Namespace must not be empty".to_string()));
        }
        Ok(())
    }

    /// Merge CLI arguments into configuration
    #[allow(clippy::too_many_arguments)]
    pub fn merge_cli(
        &mut self,
        suffix: Option<String>,
        overwrite: bool,
        linking_warn: bool,
        no_stamp: bool,
        require_logging: bool,
        format: Option<OutputFormat>,
    ) -> Result<(), ConfigError> {
        if let Some(s) = suffix {
            self.output.suffix = Some(s);
        }
        if overwrite {
            self.output.overwrite = true;
        }
        if linking_warn {
            self.linking.strict = false;
        }
        if no_stamp {
            self.output.stamp_version = false;
        }
        if require_logging {
            self.linking.require_logging = true;
        }
        if let Some(f) = format {
            self.output.format = f;
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(config.output.suffix.is_none());
        assert!(config.output.stamp_version);
        assert!(config.linking.strict);
        assert!(!config.linking.require_logging);
        assert!(config.normalize.placeholders.is_empty());
        assert_eq!(config.namespace, XFORMS_NAMESPACE);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r####"
output:
  suffix: linked
  stamp_version: false
linking:
  strict: false
normalize:
  placeholders:
    - "###"
"####;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.output.suffix.as_deref(), Some("linked"));
        assert!(!config.output.stamp_version);
        assert!(!config.linking.strict);
        assert_eq!(config.normalize.placeholders, vec!["###"]);
        assert_eq!(config.namespace, XFORMS_NAMESPACE);
    }

    #[test]
    fn test_merge_cli() {
        let mut config = Config::new();
        config
            .merge_cli(
                Some("out".to_string()),
                true,
                true,
                true,
                true,
                Some(OutputFormat::Json),
            )
            .unwrap();

        assert_eq!(config.output.suffix.as_deref(), Some("out"));
        assert!(config.output.overwrite);
        assert!(!config.linking.strict);
        assert!(!config.output.stamp_version);
        assert!(config.linking.require_logging);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_merge_cli_keeps_file_values() {
        let mut config = Config::new();
        config.linking.strict = false;
        config.merge_cli(None, false, false, false, false, None).unwrap();
        assert!(!config.linking.strict);
    }

    #[test]
    fn test_invalid_suffix() {
        let mut config = Config::new();
        assert!(config
            .merge_cli(Some("-bad".to_string()), false, false, false, false, None)
            .is_err());
        config.output.suffix = Some(String::new());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".xformlinkrc.json"),
            r#"{"output": {"suffix": "v2"}, "linking": {"require_logging": true}}"#,
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.output.suffix.as_deref(), Some("v2"));
        assert!(config.linking.require_logging);
        assert!(config.linking.strict);
    }

    #[test]
    fn test_load_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_dir_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert!(config.linking.strict);
    }
}
