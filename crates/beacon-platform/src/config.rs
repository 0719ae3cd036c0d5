use log::warn;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::paths::UpdatePaths;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode updater config: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.display().to_string(),
            source,
        }
    }
}

/// Host-wide updater settings persisted in the shared update folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl GlobalConfig {
    /// Load the persisted config, writing the defaults first if the file does
    /// not exist yet. Unparseable contents fall back to the defaults.
    ///
    /// # Errors
    /// Returns an error if the update folder or the default file cannot be
    /// created, or the existing file cannot be read.
    pub fn load_or_init(paths: &UpdatePaths) -> Result<Self, StorageError> {
        let config_path = paths.config_file();
        paths
            .ensure_dirs()
            .map_err(|error| StorageError::io("failed to create update folder", &paths.update_dir, error))?;

        if !config_path.exists() {
            Self::default().save_to_path(&config_path)?;
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|error| StorageError::io("failed to read updater config", &config_path, error))?;
        Ok(serde_json::from_str(&content).unwrap_or_else(|error| {
            warn!(
                "Ignoring unreadable updater config {}: {error}",
                config_path.display()
            );
            Self::default()
        }))
    }

    /// # Errors
    /// Returns an error if the config cannot be encoded or written.
    pub fn save(&self, paths: &UpdatePaths) -> Result<(), StorageError> {
        paths
            .ensure_dirs()
            .map_err(|error| StorageError::io("failed to create update folder", &paths.update_dir, error))?;
        self.save_to_path(&paths.config_file())
    }

    fn save_to_path(&self, path: &Path) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|error| StorageError::io("failed to create temporary config file", parent, error))?;
    temp.write_all(data)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|error| StorageError::io("failed to write temporary config file", temp.path(), error))?;
    temp.persist(path)
        .map_err(|error| StorageError::io("failed to replace updater config", path, error.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::GlobalConfig;
    use crate::paths::UpdatePaths;

    fn temp_paths() -> (tempfile::TempDir, UpdatePaths) {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = UpdatePaths::new(temp_dir.path().join("Updater"));
        (temp_dir, paths)
    }

    #[test]
    fn defaults_are_written_before_first_load() {
        let (_guard, paths) = temp_paths();

        let config = GlobalConfig::load_or_init(&paths).expect("config should load");
        assert!(config.enabled);

        let written = std::fs::read_to_string(paths.config_file()).expect("defaults should be written");
        assert!(written.contains("\"enabled\": true"));
    }

    #[test]
    fn existing_config_is_respected() {
        let (_guard, paths) = temp_paths();
        GlobalConfig { enabled: false }
            .save(&paths)
            .expect("config should save");

        let config = GlobalConfig::load_or_init(&paths).expect("config should load");
        assert!(!config.enabled);
    }

    #[test]
    fn missing_field_defaults_to_enabled() {
        let (_guard, paths) = temp_paths();
        paths.ensure_dirs().expect("update folder should be created");
        std::fs::write(paths.config_file(), "{}").expect("config should be written");

        assert!(GlobalConfig::load_or_init(&paths).expect("config should load").enabled);
    }

    #[test]
    fn unreadable_json_falls_back_to_defaults() {
        let (_guard, paths) = temp_paths();
        paths.ensure_dirs().expect("update folder should be created");
        std::fs::write(paths.config_file(), "enabled: false").expect("config should be written");

        let config = GlobalConfig::load_or_init(&paths).expect("config should load");
        assert_eq!(config, GlobalConfig::default());
    }
}
