use std::path::{Path, PathBuf};

pub const UPDATE_FOLDER_NAME: &str = "Updater";
pub const FALLBACK_ARTIFACT_NAME: &str = "update-download";

/// Filesystem layout shared by every updater on a host.
///
/// The update folder sits next to the plugin's own data folder, so all
/// plugins on one server share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePaths {
    pub update_dir: PathBuf,
}

impl UpdatePaths {
    #[must_use]
    pub fn new(update_dir: impl Into<PathBuf>) -> Self {
        Self {
            update_dir: update_dir.into(),
        }
    }

    #[must_use]
    pub fn for_data_folder(data_folder: &Path) -> Self {
        let base = data_folder.parent().unwrap_or(data_folder);
        Self::new(base.join(UPDATE_FOLDER_NAME))
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.update_dir.join("config.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.update_dir.join("updater.log")
    }

    #[must_use]
    pub fn artifact_path(&self, download_link: &str) -> PathBuf {
        self.update_dir.join(artifact_file_name(download_link))
    }

    /// Ensure the update folder exists on disk.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.update_dir)
    }
}

/// File name for a downloaded artifact: the last path segment of the link
/// with query and fragment removed. Unsafe or empty names fall back to
/// [`FALLBACK_ARTIFACT_NAME`].
#[must_use]
pub fn artifact_file_name(download_link: &str) -> String {
    let without_query = download_link.split(['?', '#']).next().unwrap_or_default();
    let raw_name = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(FALLBACK_ARTIFACT_NAME);
    Path::new(raw_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && !name.contains("..") && !name.contains(['\\', ':']))
        .unwrap_or(FALLBACK_ARTIFACT_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{FALLBACK_ARTIFACT_NAME, UpdatePaths, artifact_file_name};

    #[test]
    fn update_folder_is_sibling_of_data_folder() {
        let paths = UpdatePaths::for_data_folder(Path::new("/srv/server/plugins/Example"));
        assert_eq!(paths.update_dir, Path::new("/srv/server/plugins/Updater"));
        assert!(paths.config_file().ends_with("Updater/config.json"));
        assert!(paths.log_file().ends_with("Updater/updater.log"));
    }

    #[test]
    fn artifact_name_uses_last_segment_without_query() {
        assert_eq!(
            artifact_file_name("https://cdn.example.com/files/Example-2.0.jar?token=abc#frag"),
            "Example-2.0.jar"
        );
        assert_eq!(
            artifact_file_name("https://www.spigotmc.org/resources/1234/"),
            "1234"
        );
    }

    #[test]
    fn unsafe_artifact_names_fall_back() {
        assert_eq!(artifact_file_name("https://host/.."), FALLBACK_ARTIFACT_NAME);
        assert_eq!(artifact_file_name(""), FALLBACK_ARTIFACT_NAME);
        assert_eq!(artifact_file_name("https://host/a..b.jar"), FALLBACK_ARTIFACT_NAME);
    }

    #[test]
    fn artifact_path_lands_in_update_folder() {
        let paths = UpdatePaths::new("/tmp/Updater");
        assert_eq!(
            paths.artifact_path("https://host/dl/Plugin.jar"),
            Path::new("/tmp/Updater/Plugin.jar")
        );
    }

    #[test]
    fn ensure_dirs_creates_update_folder() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = UpdatePaths::for_data_folder(&temp_dir.path().join("Example"));

        paths
            .ensure_dirs()
            .expect("ensure_dirs should create the update folder");
        assert!(paths.update_dir.is_dir());
    }
}
