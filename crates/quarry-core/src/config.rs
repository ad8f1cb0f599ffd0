//! Project configuration (quarry.yaml)

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::QuarryError;

fn default_workers() -> usize {
    4
}

/// Main configuration structure, loaded from the project's `quarry.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory containing model SQL files, relative to the project root
    pub models_dir: PathBuf,

    /// Path of the DuckDB database file, relative to the project root
    pub db_path: PathBuf,

    /// Optional directory containing macro definition files
    #[serde(default)]
    pub macros_dir: Option<PathBuf>,

    /// Worker-pool width for within-stage parallel execution
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Settings applied to the database connection at open time
    /// (`SET key = 'value'`)
    #[serde(default)]
    pub db_settings: BTreeMap<String, String>,

    /// Project root (directory of the config file), used to resolve the
    /// relative paths above
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, QuarryError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, QuarryError> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| QuarryError::Config(e.to_string()))?;
        if config.workers == 0 {
            return Err(QuarryError::Config(
                "`workers` must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Models directory resolved against the project root.
    pub fn models_path(&self) -> PathBuf {
        self.project_root.join(&self.models_dir)
    }

    /// Macros directory resolved against the project root, if configured.
    pub fn macros_path(&self) -> Option<PathBuf> {
        self.macros_dir.as_ref().map(|p| self.project_root.join(p))
    }

    /// Database file resolved against the project root.
    pub fn database_path(&self) -> PathBuf {
        self.project_root.join(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_config() {
        let config = Config::from_yaml("models_dir: models\ndb_path: store.db\n").unwrap();
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.db_path, PathBuf::from("store.db"));
        assert_eq!(config.workers, 4);
        assert!(config.macros_dir.is_none());
        assert!(config.db_settings.is_empty());
    }

    #[test]
    fn full_config() {
        let yaml = "\
models_dir: models
db_path: store.db
macros_dir: macros
workers: 8
db_settings:
  memory_limit: 2GB
";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.macros_dir, Some(PathBuf::from("macros")));
        assert_eq!(config.db_settings["memory_limit"], "2GB");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = Config::from_yaml("models_dir: models\n").unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn zero_workers_rejected() {
        let err =
            Config::from_yaml("models_dir: m\ndb_path: d\nworkers: 0\n").unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn paths_resolve_against_project_root() {
        let mut config = Config::from_yaml("models_dir: models\ndb_path: store.db\n").unwrap();
        config.project_root = PathBuf::from("/proj");
        assert_eq!(config.models_path(), PathBuf::from("/proj/models"));
        assert_eq!(config.database_path(), PathBuf::from("/proj/store.db"));
    }
}
