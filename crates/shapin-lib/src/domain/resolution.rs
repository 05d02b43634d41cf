use log::{debug, warn};
use thiserror::Error;

use super::Repository;
use super::version::{higher_version, is_short_tag, parse_semver};

/// Upper bound on pages fetched per listing, so huge tag lists still terminate.
pub const MAX_PAGES: u32 = 10;

/// Number of items requested per page.
pub const PER_PAGE: u32 = 100;

/// Errors that can occur during version resolution.
///
/// Cloneable so that failed lookups can be memoized like successful ones.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("failed to list tags of {repo} (page {page}): {reason}")]
    ListTags {
        repo: Repository,
        page: u32,
        reason: String,
    },

    #[error("failed to list releases of {repo} (page {page}): {reason}")]
    ListReleases {
        repo: Repository,
        page: u32,
        reason: String,
    },

    #[error("failed to get the commit SHA of {repo}@{git_ref}: {reason}")]
    CommitSha {
        repo: Repository,
        git_ref: String,
        reason: String,
    },

    #[error("no release or tag found for {repo}")]
    NoVersionFound { repo: Repository },

    /// No candidate parsed as semver; `latest` is the lexically greatest one.
    #[error("latest version of {repo} could not be parsed as semver: {latest}")]
    NonSemverLatest { repo: Repository, latest: String },
}

/// A git tag and the commit it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub commit_sha: String,
}

/// A GitHub release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    pub draft: bool,
    pub prerelease: bool,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The next page number, None on the last page
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_page: Option<u32>) -> Self {
        Self { items, next_page }
    }

    /// A single page with nothing after it.
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Remote queries needed to pin actions. Pages are numbered from 1.
pub trait RepositoryService {
    /// List one page of tags.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ListTags`] if the lookup fails.
    fn list_tags(&self, repo: &Repository, page: u32) -> Result<Page<Tag>, ResolutionError>;

    /// List one page of releases.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ListReleases`] if the lookup fails.
    fn list_releases(&self, repo: &Repository, page: u32)
    -> Result<Page<Release>, ResolutionError>;

    /// Resolve a ref (tag, branch or SHA) to a commit SHA.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::CommitSha`] if the lookup fails.
    fn commit_sha(&self, repo: &Repository, git_ref: &str) -> Result<String, ResolutionError>;
}

/// Running maximum over candidate versions.
///
/// Semver candidates always win over non-semver ones; non-semver candidates
/// only compete with each other, lexically.
#[derive(Debug, Default)]
struct LatestTracker {
    semver: Option<String>,
    lexical: Option<String>,
}

impl LatestTracker {
    fn offer(&mut self, candidate: &str) {
        let slot = if parse_semver(candidate).is_some() {
            &mut self.semver
        } else {
            &mut self.lexical
        };
        let best = match slot.take() {
            Some(current) => higher_version(&current, candidate).to_owned(),
            None => candidate.to_owned(),
        };
        *slot = Some(best);
    }
}

/// Resolves versions and commit SHAs through a [`RepositoryService`].
pub struct VersionResolver<S: RepositoryService> {
    service: S,
}

impl<S: RepositoryService> VersionResolver<S> {
    #[must_use]
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Access the underlying service
    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Determine the latest version of a repository.
    ///
    /// Non-draft releases are the primary source; tags are only listed when
    /// releases yield no semver version.
    ///
    /// # Errors
    ///
    /// Propagates listing errors.
    /// Returns [`ResolutionError::NonSemverLatest`] with the lexically greatest
    /// candidate when nothing parses as semver.
    /// Returns [`ResolutionError::NoVersionFound`] when there are no candidates at all.
    pub fn latest_version(&self, repo: &Repository) -> Result<String, ResolutionError> {
        let releases = self.latest_from_releases(repo)?;
        if let Some(latest) = releases.semver {
            debug!("Latest release of {repo} is {latest}");
            return Ok(latest);
        }

        let tags = self.latest_from_tags(repo)?;
        if let Some(latest) = tags.semver {
            debug!("Latest tag of {repo} is {latest}");
            return Ok(latest);
        }

        let lexical = match (releases.lexical, tags.lexical) {
            (Some(release), Some(tag)) => Some(higher_version(&release, &tag).to_owned()),
            (release, tag) => release.or(tag),
        };
        match lexical {
            Some(latest) => Err(ResolutionError::NonSemverLatest {
                repo: repo.clone(),
                latest,
            }),
            None => Err(ResolutionError::NoVersionFound { repo: repo.clone() }),
        }
    }

    fn latest_from_releases(&self, repo: &Repository) -> Result<LatestTracker, ResolutionError> {
        let mut tracker = LatestTracker::default();
        let mut page = 1;
        for _ in 0..MAX_PAGES {
            let releases = self.service.list_releases(repo, page)?;
            for release in releases.items.iter().filter(|r| !r.draft) {
                tracker.offer(&release.tag_name);
            }
            match releases.next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(tracker)
    }

    fn latest_from_tags(&self, repo: &Repository) -> Result<LatestTracker, ResolutionError> {
        let mut tracker = LatestTracker::default();
        let mut page = 1;
        for _ in 0..MAX_PAGES {
            let tags = self.service.list_tags(repo, page)?;
            for tag in &tags.items {
                tracker.offer(&tag.name);
            }
            match tags.next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(tracker)
    }

    /// Resolve a ref (branch, tag or SHA) to a commit SHA.
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub fn resolve_sha(&self, repo: &Repository, git_ref: &str) -> Result<String, ResolutionError> {
        self.service.commit_sha(repo, git_ref)
    }

    /// Find the most specific tag that points at `sha` and extends `prefix`.
    ///
    /// A tag extends the prefix when it equals the prefix followed by `.`, `-`
    /// or `+` (so "v3" extends to "v3.5.2" but not to "v30"). Tags listed in
    /// `skip` are ignored. SHAs are compared case-insensitively. A full
    /// `major.minor.patch` match without a pre-release ends the search early;
    /// otherwise the longest match wins. Returns an empty string when
    /// nothing matches within [`MAX_PAGES`] pages.
    ///
    /// # Errors
    ///
    /// Propagates listing errors.
    pub fn find_tag_for_sha(
        &self,
        repo: &Repository,
        sha: &str,
        prefix: &str,
        skip: &[&str],
    ) -> Result<String, ResolutionError> {
        let mut best = String::new();
        let mut page = 1;
        for _ in 0..MAX_PAGES {
            let tags = self.service.list_tags(repo, page)?;
            for tag in &tags.items {
                if !tag.commit_sha.eq_ignore_ascii_case(sha)
                    || skip.contains(&tag.name.as_str())
                    || !extends_prefix(&tag.name, prefix)
                {
                    continue;
                }
                if is_final_release(&tag.name) {
                    return Ok(tag.name.clone());
                }
                if tag.name.len() > best.len() {
                    best.clone_from(&tag.name);
                }
            }
            match tags.next_page {
                Some(next) => page = next,
                None => return Ok(best),
            }
        }
        warn!("Stopped looking up tags of {repo} for {sha} after {MAX_PAGES} pages");
        Ok(best)
    }
}

/// A full `major.minor.patch` version without a pre-release part.
fn is_final_release(tag: &str) -> bool {
    !is_short_tag(tag) && parse_semver(tag).is_some_and(|v| v.pre.is_empty())
}

fn extends_prefix(tag: &str, prefix: &str) -> bool {
    tag.strip_prefix(prefix)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| matches!(c, '.' | '-' | '+'))
}
