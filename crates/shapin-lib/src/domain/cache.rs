use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::Repository;
use super::resolution::{Page, Release, RepositoryService, ResolutionError, Tag};

type Memo<T> = Mutex<HashMap<String, Result<T, ResolutionError>>>;

/// Memoizes every [`RepositoryService`] call for the length of a run.
///
/// Keys are `owner/repo/page` for listings and `owner/repo/ref` for SHA
/// lookups. Errors are memoized too, so a failing key is fetched once. The
/// map lock is held across the fetch: two callers asking for the same key
/// share one request.
pub struct CachedRepositoryService<S: RepositoryService> {
    inner: S,
    tags: Memo<Page<Tag>>,
    releases: Memo<Page<Release>>,
    shas: Memo<String>,
}

impl<S: RepositoryService> CachedRepositoryService<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tags: Mutex::default(),
            releases: Mutex::default(),
            shas: Mutex::default(),
        }
    }

    /// Access the wrapped service
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn memoized<T, F>(memo: &Memo<T>, key: String, fetch: F) -> Result<T, ResolutionError>
where
    T: Clone,
    F: FnOnce() -> Result<T, ResolutionError>,
{
    let mut map = memo.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(hit) = map.get(&key) {
        debug!("Cache hit for {key}");
        return hit.clone();
    }
    let fetched = fetch();
    map.insert(key, fetched.clone());
    fetched
}

impl<S: RepositoryService> RepositoryService for CachedRepositoryService<S> {
    fn list_tags(&self, repo: &Repository, page: u32) -> Result<Page<Tag>, ResolutionError> {
        memoized(&self.tags, format!("{repo}/{page}"), || {
            self.inner.list_tags(repo, page)
        })
    }

    fn list_releases(
        &self,
        repo: &Repository,
        page: u32,
    ) -> Result<Page<Release>, ResolutionError> {
        memoized(&self.releases, format!("{repo}/{page}"), || {
            self.inner.list_releases(repo, page)
        })
    }

    fn commit_sha(&self, repo: &Repository, git_ref: &str) -> Result<String, ResolutionError> {
        memoized(&self.shas, format!("{repo}/{git_ref}"), || {
            self.inner.commit_sha(repo, git_ref)
        })
    }
}
