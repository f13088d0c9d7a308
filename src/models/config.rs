use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered literal text substitutions (old text → new text).
///
/// Order matters: substitutions are applied one after another in document order.
pub type TextSubstitutions = IndexMap<String, String>;

/// File name → path of the replacement file.
pub type FileSubstitutions = IndexMap<String, Utf8PathBuf>;

/// Main configuration document (usually `config.json`)
///
/// Names the root directory and the two documents holding the substitution maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainConfig {
    pub root_path: Utf8PathBuf,
    pub line_replacement_config_path: Utf8PathBuf,
    pub file_replacement_config_path: Utf8PathBuf,
}

/// Fully resolved configuration for a single pipeline run.
///
/// Built once by [`ConfigLoader`](crate::config::ConfigLoader) and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub root_path: Utf8PathBuf,
    pub text_substitutions: TextSubstitutions,
    pub file_substitutions: FileSubstitutions,
}

impl Configuration {
    /// Create a configuration with no substitutions for the given root
    pub fn new(root_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    /// Add a text substitution (builder style, mostly for tests and embedding)
    pub fn with_text_substitution(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.text_substitutions.insert(old.into(), new.into());
        self
    }

    /// Add a file substitution (builder style)
    pub fn with_file_substitution(
        mut self,
        file_name: impl Into<String>,
        replacement: impl Into<Utf8PathBuf>,
    ) -> Self {
        self.file_substitutions
            .insert(file_name.into(), replacement.into());
        self
    }

    /// Look up the replacement source for a file name
    pub fn replacement_for(&self, file_name: &str) -> Option<&Utf8PathBuf> {
        self.file_substitutions.get(file_name)
    }
}
