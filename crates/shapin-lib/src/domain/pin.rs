use log::{debug, warn};
use thiserror::Error;

use super::action::{Action, LineMatcher, Repository};
use super::filter::ActionFilter;
use super::resolution::{RepositoryService, ResolutionError, VersionResolver};
use super::version::{VersionType, classify, is_newer, is_short_tag};

/// Operation flags for one run. Immutable while files are processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools, reason = "mirrors the CLI flags")]
pub struct Mode {
    /// Fail on anything that is not pinned
    pub check: bool,
    /// Check that pinned SHAs match their version comments
    pub verify: bool,
    /// Move every action to its latest version
    pub update: bool,
    /// Write changes back to the files
    pub fix: bool,
    /// Show proposed changes
    pub diff: bool,
}

impl Mode {
    /// Check without fix or diff: report unpinned lines, resolve nothing.
    #[must_use]
    pub fn is_check_only(&self) -> bool {
        self.check && !self.fix && !self.diff
    }
}

/// Why a single line could not be handled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("{action} is not pinned to a full commit SHA")]
    NotPinned { action: String },

    #[error("cannot pin {action}: {reason}")]
    CannotPin {
        action: String,
        reason: &'static str,
    },

    #[error(
        "{name}@{version} does not match its version comment {comment}: {comment} points to {expected}"
    )]
    VerifyMismatch {
        name: String,
        version: String,
        comment: String,
        expected: String,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl PinError {
    /// A hint on how to resolve the problem by hand.
    #[must_use]
    pub fn help(&self) -> Option<&'static str> {
        match self {
            PinError::NotPinned { .. } => Some("run `shapin run --fix` to pin it"),
            PinError::CannotPin { .. } => Some(
                "reference a version tag, or add it to `ignore_actions` in the config file",
            ),
            PinError::VerifyMismatch { .. } => Some(
                "pin the expected SHA, fix the version comment, or run `shapin run --update`",
            ),
            PinError::Resolution(_) => None,
        }
    }
}

/// Decides, line by line, whether and how a `uses:` reference is rewritten.
pub struct LinePinner<S: RepositoryService> {
    matcher: LineMatcher,
    filter: ActionFilter,
    resolver: VersionResolver<S>,
    mode: Mode,
}

impl<S: RepositoryService> LinePinner<S> {
    /// Create a pinner backed by `service`. Wrap the service in a
    /// [`CachedRepositoryService`](super::CachedRepositoryService) to share lookups across lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the line pattern fails to compile.
    pub fn new(service: S, filter: ActionFilter, mode: Mode) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: LineMatcher::new()?,
            filter,
            resolver: VersionResolver::new(service),
            mode,
        })
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn resolver(&self) -> &VersionResolver<S> {
        &self.resolver
    }

    /// Process one line (without its line ending).
    ///
    /// Returns `Ok(None)` when the line stays as it is, `Ok(Some(new_line))`
    /// when it must be rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`PinError::NotPinned`] in check-only mode for refs that are not full SHAs.
    /// Returns [`PinError::CannotPin`] when there is no tag to pin from.
    /// Returns [`PinError::VerifyMismatch`] when verification finds a different SHA.
    /// Returns [`PinError::Resolution`] when a lookup fails.
    pub fn pin_line(&self, line: &str) -> Result<Option<String>, PinError> {
        let Some(action) = self.matcher.parse(line) else {
            return Ok(None);
        };
        if self.filter.is_skipped(&action) {
            debug!("Skipping {action}: ignored");
            return Ok(None);
        }

        let version_type = classify(&action.version);
        if self.mode.is_check_only() {
            return match version_type {
                VersionType::FullCommitSha => Ok(None),
                _ => Err(PinError::NotPinned {
                    action: action.to_string(),
                }),
            };
        }

        let Some(repo) = action.repository() else {
            debug!("Skipping {action}: not an owner/repo reference");
            return Ok(None);
        };

        let new_line = match (version_type, classify(&action.version_comment)) {
            (VersionType::VersionTag, _) => self.pin_tag(&action, &repo)?,
            (VersionType::FullCommitSha, VersionType::Empty) => None,
            (VersionType::FullCommitSha, VersionType::VersionTag) => {
                self.refresh_pinned(&action, &repo)?
            }
            (VersionType::FullCommitSha, VersionType::Other | VersionType::FullCommitSha) => {
                return Err(cannot_pin(&action, "version comment is not a version tag"));
            }
            (VersionType::Other | VersionType::Empty, _) => {
                return Err(cannot_pin(&action, "ref is neither a version tag nor a commit SHA"));
            }
        };

        Ok(new_line.filter(|new_line| new_line != line))
    }

    /// `name@tag`: pin to the SHA of the tag, or of the latest version when updating.
    fn pin_tag(&self, action: &Action, repo: &Repository) -> Result<Option<String>, PinError> {
        if self.mode.update
            && let Some(latest) = self.update_target(action, repo, &action.version)?
        {
            let sha = self.resolver.resolve_sha(repo, &latest)?;
            return Ok(Some(action.rewrite(&sha, &latest)));
        }

        let sha = self.resolver.resolve_sha(repo, &action.version)?;
        let tag = self.expand_short_tag(action, repo, &sha, &action.version)?;
        Ok(Some(action.rewrite(&sha, tag.as_deref().unwrap_or(&action.version))))
    }

    /// `name@sha # tag`: update, verify, or expand the comment of an already pinned line.
    fn refresh_pinned(
        &self,
        action: &Action,
        repo: &Repository,
    ) -> Result<Option<String>, PinError> {
        let comment = &action.version_comment;

        if self.mode.update {
            return match self.update_target(action, repo, comment)? {
                Some(latest) => {
                    let sha = self.resolver.resolve_sha(repo, &latest)?;
                    Ok(Some(action.rewrite(&sha, &latest)))
                }
                None => Ok(None),
            };
        }

        if self.mode.verify {
            let expected = self.resolver.resolve_sha(repo, comment)?;
            if !expected.eq_ignore_ascii_case(&action.version) {
                return Err(PinError::VerifyMismatch {
                    name: action.name.clone(),
                    version: action.version.clone(),
                    comment: comment.clone(),
                    expected,
                });
            }
        }

        Ok(self
            .expand_short_tag(action, repo, &action.version, comment)?
            .map(|tag| action.rewrite(&action.version, &tag)))
    }

    /// The version to update to, or None to keep `current`.
    fn update_target(
        &self,
        action: &Action,
        repo: &Repository,
        current: &str,
    ) -> Result<Option<String>, PinError> {
        let latest = match self.resolver.latest_version(repo) {
            Ok(latest) => latest,
            Err(ResolutionError::NonSemverLatest { latest, .. }) => {
                warn!(
                    "Skip updating {}: latest version {latest} is not a semantic version",
                    action.name
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if latest == current {
            debug!("{} is already at the latest version {latest}", action.name);
            return Ok(None);
        }
        if is_newer(current, &latest) {
            warn!(
                "Skip updating {}: current version {current} is newer than the latest version {latest}",
                action.name
            );
            return Ok(None);
        }
        Ok(Some(latest))
    }

    /// For "v3" or "v3.1", find a longer tag at the same commit (e.g., "v3.5.2").
    fn expand_short_tag(
        &self,
        action: &Action,
        repo: &Repository,
        sha: &str,
        tag: &str,
    ) -> Result<Option<String>, PinError> {
        if !is_short_tag(tag) {
            return Ok(None);
        }
        let skip = [action.version.as_str(), action.version_comment.as_str()];
        let found = self.resolver.find_tag_for_sha(repo, sha, tag, &skip)?;
        if found.is_empty() {
            debug!("No longer tag than {tag} found for {}", action.name);
            return Ok(None);
        }
        Ok(Some(found))
    }
}

fn cannot_pin(action: &Action, reason: &'static str) -> PinError {
    PinError::CannotPin {
        action: action.to_string(),
        reason,
    }
}
