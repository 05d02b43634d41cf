use glob::glob;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{WorkflowError, WorkflowStore};

/// Files searched when neither the command line nor the config file names any.
pub const DEFAULT_PATTERNS: [&str; 6] = [
    ".github/workflows/*.yml",
    ".github/workflows/*.yaml",
    "action.yml",
    "action.yaml",
    ".github/actions/**/action.yml",
    ".github/actions/**/action.yaml",
];

/// Which files a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Explicit paths; each is processed even if it turns out to be unreadable
    Files(Vec<PathBuf>),
    /// Glob patterns relative to the repository root
    Patterns(Vec<String>),
}

impl Default for Targets {
    fn default() -> Self {
        Targets::Patterns(DEFAULT_PATTERNS.iter().map(|&p| p.to_owned()).collect())
    }
}

/// Workflow files on the local filesystem.
pub struct FileWorkflowStore {
    root: PathBuf,
    targets: Targets,
}

impl FileWorkflowStore {
    #[must_use]
    pub fn new(root: &Path, targets: Targets) -> Self {
        Self {
            root: root.to_path_buf(),
            targets,
        }
    }

    fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>, WorkflowError> {
        let full = if Path::new(pattern).is_absolute() {
            pattern.to_owned()
        } else {
            self.root.join(pattern).to_string_lossy().into_owned()
        };

        let entries = glob(&full).map_err(|source| WorkflowError::Glob {
            pattern: pattern.to_owned(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(path) => debug!("Skipping {}: not a file", path.display()),
                Err(e) => warn!("Error reading path: {e}"),
            }
        }
        Ok(paths)
    }
}

impl WorkflowStore for FileWorkflowStore {
    fn discover(&self) -> Result<Vec<PathBuf>, WorkflowError> {
        let mut paths = match &self.targets {
            Targets::Files(files) => files.clone(),
            Targets::Patterns(patterns) => {
                let mut paths = Vec::new();
                for pattern in patterns {
                    paths.extend(self.expand(pattern)?);
                }
                paths
            }
        };
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<String, WorkflowError> {
        fs::read_to_string(path).map_err(|source| WorkflowError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), WorkflowError> {
        fs::write(path, content).map_err(|source| WorkflowError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_file(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn default_targets_find_workflows_and_actions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let ci = create_file(root, ".github/workflows/ci.yml", "name: CI");
        let deploy = create_file(root, ".github/workflows/deploy.yaml", "name: Deploy");
        let action = create_file(root, "action.yml", "name: Root");
        let nested = create_file(root, ".github/actions/build/action.yaml", "name: Build");
        create_file(root, ".github/workflows/README.md", "docs");

        let store = FileWorkflowStore::new(root, Targets::default());
        let mut expected = vec![ci, deploy, action, nested];
        expected.sort();

        assert_eq!(store.discover().unwrap(), expected);
    }

    #[test]
    fn overlapping_patterns_are_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        let ci = create_file(temp_dir.path(), ".github/workflows/ci.yml", "name: CI");

        let store = FileWorkflowStore::new(
            temp_dir.path(),
            Targets::Patterns(vec![
                ".github/workflows/*.yml".to_owned(),
                ".github/**/*.yml".to_owned(),
            ]),
        );

        assert_eq!(store.discover().unwrap(), vec![ci]);
    }

    #[test]
    fn explicit_files_are_kept_even_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.yml");
        let store = FileWorkflowStore::new(temp_dir.path(), Targets::Files(vec![missing.clone()]));

        assert_eq!(store.discover().unwrap(), vec![missing.clone()]);
        assert!(matches!(
            store.read(&missing),
            Err(WorkflowError::Read { .. })
        ));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store =
            FileWorkflowStore::new(temp_dir.path(), Targets::Patterns(vec!["[".to_owned()]));

        assert!(matches!(store.discover(), Err(WorkflowError::Glob { .. })));
    }

    #[test]
    fn write_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_file(temp_dir.path(), "ci.yml", "old\n");
        let store = FileWorkflowStore::new(temp_dir.path(), Targets::default());

        store.write(&path, "new\n").unwrap();

        assert_eq!(store.read(&path).unwrap(), "new\n");
    }
}
