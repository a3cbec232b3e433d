//! Configuration model
//!
//! A configuration is a list of named entries, one per warning, each carrying
//! an enabled flag and free-form string parameters. The reserved `common`
//! entry holds cross-cutting parameters. Entries are validated against the
//! warning catalog before any file is processed; an unknown name fails the
//! run with the nearest known name attached.
//!
//! Files are read from `.dekor.yaml` / `.dekor.yml` / `.dekor.json`, looked
//! up in the working directory and then the home directory.

use crate::warnings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reserved entry name for cross-cutting parameters
pub const COMMON: &str = "common";

/// Configuration error; always aborts the run before any file is processed
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown configuration file format: {0}")]
    UnknownFormat(String),

    #[error("unknown warning name '{name}'; did you mean '{suggestion}'?")]
    UnknownWarning { name: String, suggestion: String },

    #[error("duplicate configuration entry '{0}'")]
    DuplicateEntry(String),

    #[error("malformed value '{value}' for parameter '{key}' of '{rule}'")]
    MalformedParameter {
        rule: String,
        key: String,
        value: String,
    },

    #[error("'{rule}': options '{first}' and '{second}' are mutually exclusive")]
    ConflictingOptions {
        rule: String,
        first: String,
        second: String,
    },
}

/// One configuration entry: a warning name, an enabled flag, and parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfigEntry {
    /// Warning id, or the reserved `common` name
    pub name: String,

    /// Absence of an entry implies enabled with default parameters
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Free-form string parameters, interpreted by the owning check
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl RuleConfigEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            configuration: BTreeMap::new(),
        }
    }

    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
            configuration: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.configuration.insert(key.to_string(), value.to_string());
        self
    }
}

/// Cross-cutting parameters from the reserved `common` entry
#[derive(Debug, Clone, Default)]
pub struct CommonConfig {
    /// Project domain name (package prefix)
    pub domain: Option<String>,
    /// Directory name markers for test sources
    pub test_dirs: Vec<String>,
    /// Directory name markers for production sources
    pub src_dirs: Vec<String>,
    /// Target language version
    pub language_version: Option<String>,
}

/// A validated run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LintConfig {
    pub entries: Vec<RuleConfigEntry>,
}

impl LintConfig {
    /// Empty configuration: every warning enabled with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: RuleConfigEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Load a configuration file; format chosen by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => return Err(ConfigError::UnknownFormat(ext.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations, falling back to the empty configuration
    pub fn load_default() -> Result<Self, ConfigError> {
        let names = [".dekor.yaml", ".dekor.yml", ".dekor.json"];

        for name in &names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Validate entry names against the catalog and eagerly check the
    /// parameters the core checks interpret
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name != COMMON && warnings::find(&entry.name).is_none() {
                let suggestion = warnings::suggest_nearest(&entry.name)
                    .unwrap_or("")
                    .to_string();
                return Err(ConfigError::UnknownWarning {
                    name: entry.name.clone(),
                    suggestion,
                });
            }
            if self.entries[i + 1..].iter().any(|e| e.name == entry.name) {
                return Err(ConfigError::DuplicateEntry(entry.name.clone()));
            }
        }

        // Numeric and boolean parameters fail the run up front, not mid-file.
        self.usize_param(warnings::WRONG_INDENTATION.id, "indentation-size", 4)?;
        let aligned = self.bool_param(warnings::WRONG_INDENTATION.id, "aligned-parameters", false)?;
        let extended = self.bool_param(
            warnings::WRONG_INDENTATION.id,
            "extended-indent-of-parameters",
            false,
        )?;
        if aligned && extended {
            return Err(ConfigError::ConflictingOptions {
                rule: warnings::WRONG_INDENTATION.id.to_string(),
                first: "aligned-parameters".to_string(),
                second: "extended-indent-of-parameters".to_string(),
            });
        }
        self.bool_param(
            warnings::WRONG_INDENTATION.id,
            "extended-indent-after-operators",
            false,
        )?;
        self.bool_param(
            warnings::WRONG_INDENTATION.id,
            "extended-indent-before-dot",
            false,
        )?;
        self.bool_param(warnings::WRONG_INDENTATION.id, "newline-at-end", true)?;

        Ok(())
    }

    /// Entry for a warning, if present
    pub fn entry(&self, name: &str) -> Option<&RuleConfigEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// A warning absent from the configuration is enabled by default
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entry(name).map(|e| e.enabled).unwrap_or(true)
    }

    /// Raw parameter value for a warning
    pub fn param<'a>(&'a self, name: &str, key: &str) -> Option<&'a str> {
        self.entry(name)
            .and_then(|e| e.configuration.get(key))
            .map(|s| s.as_str())
    }

    pub fn bool_param(&self, name: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.param(name, key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::MalformedParameter {
                rule: name.to_string(),
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    pub fn usize_param(&self, name: &str, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.param(name, key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::MalformedParameter {
                rule: name.to_string(),
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Parse the reserved `common` entry
    pub fn common(&self) -> CommonConfig {
        let mut common = CommonConfig::default();
        if let Some(entry) = self.entry(COMMON) {
            common.domain = entry.configuration.get("domain").cloned();
            common.language_version = entry.configuration.get("language-version").cloned();
            if let Some(dirs) = entry.configuration.get("test-dirs") {
                common.test_dirs = dirs.split(',').map(|s| s.trim().to_string()).collect();
            }
            if let Some(dirs) = entry.configuration.get("src-dirs") {
                common.src_dirs = dirs.split(',').map(|s| s.trim().to_string()).collect();
            }
        }
        common
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_entry_is_enabled() {
        let config = LintConfig::new();
        assert!(config.is_enabled("wrong-indentation"));
        assert!(config.is_enabled("commented-out-code"));
    }

    #[test]
    fn test_disabled_entry() {
        let config = LintConfig::new().with_entry(RuleConfigEntry::disabled("commented-out-code"));
        assert!(!config.is_enabled("commented-out-code"));
        assert!(config.is_enabled("wrong-indentation"));
    }

    #[test]
    fn test_unknown_name_suggestion() {
        let config = LintConfig::new().with_entry(RuleConfigEntry::new("wrong-indentatoin"));
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::UnknownWarning { name, suggestion } => {
                assert_eq!(name, "wrong-indentatoin");
                assert_eq!(suggestion, "wrong-indentation");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let config = LintConfig::new()
            .with_entry(RuleConfigEntry::new("wrong-indentation"))
            .with_entry(RuleConfigEntry::new("wrong-indentation"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_malformed_parameter() {
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new("wrong-indentation").with_param("indentation-size", "four"),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedParameter { .. })
        ));
    }

    #[test]
    fn test_conflicting_options() {
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new("wrong-indentation")
                .with_param("aligned-parameters", "true")
                .with_param("extended-indent-of-parameters", "true"),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingOptions { .. })
        ));
    }

    #[test]
    fn test_common_entry() {
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new(COMMON)
                .with_param("domain", "com.example")
                .with_param("test-dirs", "test, testFixtures"),
        );
        assert!(config.validate().is_ok());
        let common = config.common();
        assert_eq!(common.domain.as_deref(), Some("com.example"));
        assert_eq!(common.test_dirs, vec!["test", "testFixtures"]);
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
- name: common
  configuration:
    domain: com.example
- name: commented-out-code
  enabled: false
- name: wrong-indentation
  configuration:
    indentation-size: "2"
"#;
        let config: LintConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.is_enabled("commented-out-code"));
        assert_eq!(
            config.usize_param("wrong-indentation", "indentation-size", 4).unwrap(),
            2
        );
    }
}
