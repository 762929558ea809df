//! Application paths management.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Manages all application paths following platform conventions.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub blob_dir: PathBuf,
}

impl AppPaths {
    /// Create paths using platform-specific directories.
    pub fn new() -> Option<Self> {
        let proj_dirs = ProjectDirs::from("com", "murag", "murag")?;

        let config_dir = proj_dirs.config_dir().to_path_buf();
        let data_dir = proj_dirs.data_dir().to_path_buf();

        Some(Self::from_dirs(config_dir, data_dir))
    }

    /// Lay out all paths below a single root, used for tests and portable installs.
    pub fn under(root: &Path) -> Self {
        Self::from_dirs(root.join("config"), root.join("data"))
    }

    fn from_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.toml"),
            database_file: data_dir.join("murag.db"),
            blob_dir: data_dir.join("blobs"),
            config_dir,
            data_dir,
        }
    }

    /// Point data storage somewhere else, keeping the config location.
    pub fn with_data_dir(self, data_dir: impl Into<PathBuf>) -> Self {
        Self::from_dirs(self.config_dir, data_dir.into())
    }

    /// Create all necessary directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.blob_dir)?;
        Ok(())
    }

    /// Check if murag has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists() && self.database_file.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_creation() {
        let paths = AppPaths::new();
        assert!(paths.is_some());

        let paths = paths.unwrap();
        assert!(paths.config_file.to_string_lossy().contains("config.toml"));
        assert!(paths.database_file.to_string_lossy().contains("murag.db"));
    }

    #[test]
    fn test_paths_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());

        assert!(!paths.is_initialized());
        paths.ensure_dirs().unwrap();
        assert!(paths.blob_dir.is_dir());
        assert!(paths.blob_dir.starts_with(dir.path()));
    }

    #[test]
    fn test_with_data_dir_moves_storage_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path()).with_data_dir(dir.path().join("elsewhere"));

        assert_eq!(paths.database_file, dir.path().join("elsewhere").join("murag.db"));
        assert_eq!(paths.config_file, dir.path().join("config").join("config.toml"));
    }
}
