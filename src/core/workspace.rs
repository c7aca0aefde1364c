//! Workspace discovery and structure
//!
//! A workspace is any directory containing a `.garage/` folder. The folder
//! holds the shop database and the workspace-level config file.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the workspace marker directory
pub const WORKSPACE_DIR: &str = ".garage";

/// Database file inside the workspace directory
const DATABASE_FILE: &str = "garage.db";

/// Config file inside the workspace directory
const CONFIG_FILE: &str = "config.yaml";

/// Represents a Garage Desk workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory of the workspace (parent of .garage/)
    root: PathBuf,
}

impl Workspace {
    /// Find workspace root by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current =
            std::env::current_dir().map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find workspace root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        loop {
            if current.join(WORKSPACE_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Open an explicit workspace root without walking up
    pub fn at(root: &Path) -> Result<Self, WorkspaceError> {
        if root.join(WORKSPACE_DIR).is_dir() {
            Ok(Self {
                root: root.to_path_buf(),
            })
        } else {
            Err(WorkspaceError::NotFound {
                searched_from: root.to_path_buf(),
            })
        }
    }

    /// Create a new workspace at the given path
    pub fn init(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(WORKSPACE_DIR).exists() {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        Self::create_structure(root)
    }

    /// Initialize even if .garage/ exists; the database is kept, the config is reset
    pub fn init_force(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::create_structure(root)
    }

    fn create_structure(root: PathBuf) -> Result<Self, WorkspaceError> {
        let dir = root.join(WORKSPACE_DIR);
        std::fs::create_dir_all(dir.join("exports"))
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        std::fs::write(dir.join(CONFIG_FILE), Self::default_config())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Garage Desk workspace configuration

# Shop selected by default (id or name); set with `garage shop use`
# shop: ""

# Staff identity used for history entries and notifications
# user: ""

# Default output format (auto, yaml, tsv, json, csv, md, id)
# default_format: auto

# Seconds a cached query stays fresh before it is refetched
# cache_ttl_secs: 300

# Emit low-stock notifications from stock movements
# low_stock_notifications: true
"#
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .garage directory
    pub fn garage_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    /// Path of the shop database
    pub fn database_path(&self) -> PathBuf {
        self.garage_dir().join(DATABASE_FILE)
    }

    /// Path of the workspace config file
    pub fn config_path(&self) -> PathBuf {
        self.garage_dir().join(CONFIG_FILE)
    }

    /// Default directory for report exports
    pub fn exports_dir(&self) -> PathBuf {
        self.garage_dir().join("exports")
    }
}

/// Errors that can occur during workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("not a Garage Desk workspace (searched from {searched_from:?}). Run 'garage init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("workspace already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        assert!(ws.garage_dir().is_dir());
        assert!(ws.config_path().exists());
        assert!(ws.exports_dir().is_dir());
        assert!(ws.database_path().starts_with(ws.garage_dir()));
    }

    #[test]
    fn test_workspace_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let err = Workspace::init(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
    }

    #[test]
    fn test_workspace_discover_from_nested_dir() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("invoices/2024");
        std::fs::create_dir_all(&subdir).unwrap();

        let ws = Workspace::discover_from(&subdir).unwrap();
        assert_eq!(
            ws.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_workspace_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Workspace::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }
}
