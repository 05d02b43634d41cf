use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when locating the local repository
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository has no work tree")]
    BareRepository,

    #[error("no valid git repository could be found")]
    GitRepository(#[source] Box<gix_discover::upwards::Error>),
}

/// Find the work tree root of the git repository containing `start`.
///
/// # Errors
///
/// Returns an error if no git repository is found or the repository is bare.
pub fn find_root(start: &Path) -> Result<PathBuf, RepoError> {
    let (repo_path, _trust) =
        gix_discover::upwards(start).map_err(|e| RepoError::GitRepository(Box::new(e)))?;

    let (_git_dir, work_tree) = repo_path.into_repository_and_work_tree_directories();

    work_tree.ok_or(RepoError::BareRepository)
}

/// The repository root for `start`, or `start` itself outside a git work tree.
#[must_use]
pub fn root_or_current(start: &Path) -> PathBuf {
    match find_root(start) {
        Ok(root) => root,
        Err(e) => {
            debug!("{e}, using {} as root", start.display());
            start.to_path_buf()
        }
    }
}

