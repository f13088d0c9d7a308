use crate::models::{Configuration, FileSubstitutions, MainConfig, TextSubstitutions};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use thiserror::Error;

/// Errors that abort a run before any file is touched
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Failed to read configuration file {path}: {error}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("Invalid configuration file {path}: {message}")]
    Malformed { path: Utf8PathBuf, message: String },

    #[error("Root path does not exist: {0}")]
    RootPathMissing(Utf8PathBuf),

    #[error("Root path is not a directory: {0}")]
    RootPathNotDirectory(Utf8PathBuf),
}

/// On-disk format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml` / `.yml` are YAML, anything else is read as JSON
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Loads the main configuration and the two substitution documents it points at.
///
/// The main document has three keys:
/// - `root_path`: directory tree to process
/// - `line_replacement_config_path`: document mapping old text → new text
/// - `file_replacement_config_path`: document mapping file name → replacement file path
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    main_config_path: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given main configuration document.
    pub fn new<P: AsRef<Utf8Path>>(main_config_path: P) -> Self {
        Self {
            main_config_path: main_config_path.as_ref().to_path_buf(),
        }
    }

    /// Read and parse one structured document.
    ///
    /// Failures are logged before they are returned.
    pub fn load_document<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ConfigError> {
        let result = Self::read_document(path);
        if let Err(e) = &result {
            tracing::error!("{}", e);
        }
        result
    }

    fn read_document<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Unreadable {
                path: path.to_path_buf(),
                error,
            },
        })?;

        let malformed = |message: String| ConfigError::Malformed {
            path: path.to_path_buf(),
            message,
        };

        match DocumentFormat::from_path(path) {
            DocumentFormat::Json => {
                serde_json::from_str(&contents).map_err(|e| malformed(e.to_string()))
            }
            DocumentFormat::Yaml => {
                serde_yaml_ng::from_str(&contents).map_err(|e| malformed(e.to_string()))
            }
        }
    }

    /// Load the main configuration document.
    pub fn load_main_config(&self) -> Result<MainConfig, ConfigError> {
        let config: MainConfig = Self::load_document(&self.main_config_path)?;
        tracing::info!("Loaded main config from {}", self.main_config_path);
        Ok(config)
    }

    /// Load the ordered text substitutions, dropping empty search strings.
    pub fn load_text_substitutions(path: &Utf8Path) -> Result<TextSubstitutions, ConfigError> {
        let mut substitutions: TextSubstitutions = Self::load_document(path)?;

        let before = substitutions.len();
        substitutions.retain(|old, _| !old.is_empty());
        if substitutions.len() != before {
            tracing::warn!("Ignoring empty search string in {}", path);
        }

        tracing::info!("Loaded {} text substitutions from {}", substitutions.len(), path);
        Ok(substitutions)
    }

    /// Load the file name → replacement path map.
    pub fn load_file_substitutions(path: &Utf8Path) -> Result<FileSubstitutions, ConfigError> {
        let substitutions: FileSubstitutions = Self::load_document(path)?;
        tracing::info!("Loaded {} file replacements from {}", substitutions.len(), path);
        Ok(substitutions)
    }

    /// Check that the root exists and is a directory.
    pub fn validate_root(root: &Utf8Path) -> Result<(), ConfigError> {
        let error = if !root.exists() {
            ConfigError::RootPathMissing(root.to_path_buf())
        } else if !root.is_dir() {
            ConfigError::RootPathNotDirectory(root.to_path_buf())
        } else {
            return Ok(());
        };

        tracing::error!("{}", error);
        Err(error)
    }

    /// Load and validate the complete configuration for a run.
    pub fn load(&self) -> Result<Configuration, ConfigError> {
        let main = self.load_main_config()?;
        let text_substitutions = Self::load_text_substitutions(&main.line_replacement_config_path)?;
        let file_substitutions = Self::load_file_substitutions(&main.file_replacement_config_path)?;
        Self::validate_root(&main.root_path)?;

        Ok(Configuration {
            root_path: main.root_path,
            text_substitutions,
            file_substitutions,
        })
    }
}
