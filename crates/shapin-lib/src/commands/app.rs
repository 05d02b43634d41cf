use log::{debug, info};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::domain::{
    ActionFilter, CachedRepositoryService, FilterError, LinePinner, Mode, RepositoryService,
    WorkflowError,
};
use crate::infrastructure::{
    ConfigFileError, FileWorkflowStore, GithubError, GithubRegistry, Targets, init_config,
    migrate_config,
};

use super::pin::{self, PinReport, PinRunError};

/// Errors that can occur during command orchestration
#[derive(Debug, Error)]
pub enum AppError {
    /// The config file could not be read, parsed or written.
    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),

    /// Target files could not be discovered.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The Github client could not be initialized.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// An include or exclude pattern is invalid.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The `uses:` line pattern failed to compile.
    #[error("failed to compile the line pattern")]
    LinePattern(#[from] regex::Error),

    /// Some lines or files failed, or a check found unpinned lines.
    #[error(transparent)]
    Pin(#[from] PinRunError),
}

/// What the `run` command should do.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Explicit files; empty means the configured or default targets
    pub files: Vec<PathBuf>,
    /// Only process actions whose name matches one of these
    pub include: Vec<String>,
    /// Skip actions whose name matches one of these
    pub exclude: Vec<String>,
    pub mode: Mode,
}

fn targets(config: &Config, request: &RunRequest) -> Targets {
    if !request.files.is_empty() {
        Targets::Files(request.files.clone())
    } else if !config.file.files.is_empty() {
        Targets::Patterns(config.file.files.clone())
    } else {
        Targets::default()
    }
}

/// Run the pin command against the Github API.
///
/// # Errors
///
/// Returns [`AppError::Github`] if the client cannot be created.
/// Propagates errors from [`run_with`].
pub fn run(config: &Config, request: &RunRequest) -> Result<PinReport, AppError> {
    if config.settings.github_token.is_none() && !request.mode.is_check_only() {
        debug!("GITHUB_TOKEN is not set, Github API requests are unauthenticated");
    }
    let registry = GithubRegistry::from_settings(&config.settings)?;
    run_with(config, request, registry)
}

/// Run the pin command with the given repository service.
///
/// # Errors
///
/// Returns [`AppError::Filter`] if an include or exclude pattern is invalid.
/// Returns [`AppError::Workflow`] if target files cannot be discovered.
/// Returns [`AppError::Pin`] if any line or file failed, or a check did not pass.
pub fn run_with<S: RepositoryService>(
    config: &Config,
    request: &RunRequest,
    service: S,
) -> Result<PinReport, AppError> {
    let filter = ActionFilter::new(
        config.file.ignore.clone(),
        &request.include,
        &request.exclude,
    )?;
    let pinner = LinePinner::new(CachedRepositoryService::new(service), filter, request.mode)?;
    let store = FileWorkflowStore::new(&config.root, targets(config, request));

    let report = pin::run(&pinner, &store)?;
    pin::present(&report, request.mode);
    report.status(request.mode)?;
    Ok(report)
}

/// Run the init command: write a default config file.
///
/// # Errors
///
/// Returns [`AppError::ConfigFile`] if a config file exists or cannot be written.
pub fn init(repo_root: &Path) -> Result<(), AppError> {
    let path = init_config(repo_root)?;
    info!("Created {}", path.display());
    Ok(())
}

/// Run the migrate command: upgrade the config file to the current schema.
///
/// # Errors
///
/// Returns [`AppError::ConfigFile`] if there is no config file or it cannot be migrated.
pub fn migrate(repo_root: &Path) -> Result<(), AppError> {
    let migration = migrate_config(repo_root)?;
    if !migration.changed() {
        info!("{} is already up to date", migration.path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::infrastructure::ConfigFile;

    fn config(files: &[&str]) -> Config {
        Config {
            settings: Settings::default(),
            root: PathBuf::from("/repo"),
            file: ConfigFile {
                files: files.iter().map(|&f| f.to_owned()).collect(),
                ..ConfigFile::default()
            },
        }
    }

    #[test]
    fn cli_files_win_over_config() {
        let request = RunRequest {
            files: vec![PathBuf::from("ci.yml")],
            ..RunRequest::default()
        };
        assert_eq!(
            targets(&config(&["*.yml"]), &request),
            Targets::Files(vec![PathBuf::from("ci.yml")])
        );
    }

    #[test]
    fn config_files_win_over_defaults() {
        assert_eq!(
            targets(&config(&["ci/*.yml"]), &RunRequest::default()),
            Targets::Patterns(vec!["ci/*.yml".to_owned()])
        );
        assert_eq!(
            targets(&config(&[]), &RunRequest::default()),
            Targets::default()
        );
    }
}
