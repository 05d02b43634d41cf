use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::config::Settings;
use crate::domain::resolution::PER_PAGE;
use crate::domain::{Page, Release, Repository, RepositoryService, ResolutionError, Tag};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("shapin/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const API_VERSION: &str = "2022-11-28";

/// Errors that can occur when interacting with the Github API
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("failed to create HTTP client")]
    ClientInit(#[source] reqwest::Error),

    #[error("failed to fetch {operation} from {url}")]
    Request {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Github API returned status {status} for {url}")]
    ApiStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("failed to parse response from {url}")]
    ParseResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Deserialize)]
struct ReleaseEntry {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

/// Github REST client for tags, releases and commits.
pub struct GithubRegistry {
    client: reqwest::blocking::Client,
    api_url: String,
    token: Option<String>,
}

impl GithubRegistry {
    /// Create a client from runtime settings.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::ClientInit` if the HTTP client cannot be initialized.
    pub fn from_settings(settings: &Settings) -> Result<Self, GithubError> {
        Self::new(&settings.github_api_url, settings.github_token.clone())
    }

    /// Create a client for `api_url`, authenticating with `token` when present.
    ///
    /// # Errors
    ///
    /// This method fails if TLS backend cannot be initialized, or the resolver
    /// cannot load the system configuration.
    ///
    /// # Panics
    ///
    /// This method panics if called from within an async runtime. See docs on
    /// [`reqwest::blocking`] for details.
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self, GithubError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(GithubError::ClientInit)?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
            token,
        })
    }

    fn repo_url(&self, repo: &Repository) -> String {
        format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.name)
    }

    fn tags_url(&self, repo: &Repository, page: u32) -> String {
        format!("{}/tags?per_page={PER_PAGE}&page={page}", self.repo_url(repo))
    }

    fn releases_url(&self, repo: &Repository, page: u32) -> String {
        format!(
            "{}/releases?per_page={PER_PAGE}&page={page}",
            self.repo_url(repo)
        )
    }

    fn commit_url(&self, repo: &Repository, git_ref: &str) -> String {
        format!("{}/commits/{git_ref}", self.repo_url(repo))
    }

    /// GET `url` and decode the JSON body. Also returns the next page
    /// number announced by the `Link` header.
    fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
    ) -> Result<(T, Option<u32>), GithubError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().map_err(|source| GithubError::Request {
            operation,
            url: url.to_owned(),
            source,
        })?;

        if !response.status().is_success() {
            return Err(GithubError::ApiStatus {
                status: response.status(),
                url: url.to_owned(),
            });
        }

        let next = next_page(response.headers());
        let body = response
            .json()
            .map_err(|source| GithubError::ParseResponse {
                url: url.to_owned(),
                source,
            })?;
        Ok((body, next))
    }

    /// Fetch one page of tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    pub fn tags(&self, repo: &Repository, page: u32) -> Result<Page<Tag>, GithubError> {
        let (entries, next): (Vec<TagEntry>, _) =
            self.get_json("tags", &self.tags_url(repo, page))?;
        let items = entries
            .into_iter()
            .map(|e| Tag {
                name: e.name,
                commit_sha: e.commit.sha,
            })
            .collect();
        Ok(Page::new(items, next))
    }

    /// Fetch one page of releases.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    pub fn releases(&self, repo: &Repository, page: u32) -> Result<Page<Release>, GithubError> {
        let (entries, next): (Vec<ReleaseEntry>, _) =
            self.get_json("releases", &self.releases_url(repo, page))?;
        let items = entries
            .into_iter()
            .map(|e| Release {
                tag_name: e.tag_name,
                draft: e.draft,
                prerelease: e.prerelease,
            })
            .collect();
        Ok(Page::new(items, next))
    }

    /// Resolve a ref (tag, branch, or commit) to a full commit SHA
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    pub fn commit(&self, repo: &Repository, git_ref: &str) -> Result<String, GithubError> {
        let (commit, _): (CommitResponse, _) =
            self.get_json("commit", &self.commit_url(repo, git_ref))?;
        Ok(commit.sha)
    }
}

/// Page number of the `rel="next"` link, if any.
fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get("link")?.to_str().ok()?;
    link.split(',')
        .map(str::trim)
        .find(|part| part.ends_with("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            page_param(part.get(start..end)?)
        })
}

fn page_param(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}

impl RepositoryService for GithubRegistry {
    fn list_tags(&self, repo: &Repository, page: u32) -> Result<Page<Tag>, ResolutionError> {
        self.tags(repo, page)
            .map_err(|e| ResolutionError::ListTags {
                repo: repo.clone(),
                page,
                reason: e.to_string(),
            })
    }

    fn list_releases(&self, repo: &Repository, page: u32) -> Result<Page<Release>, ResolutionError> {
        self.releases(repo, page)
            .map_err(|e| ResolutionError::ListReleases {
                repo: repo.clone(),
                page,
                reason: e.to_string(),
            })
    }

    fn commit_sha(&self, repo: &Repository, git_ref: &str) -> Result<String, ResolutionError> {
        self.commit(repo, git_ref)
            .map_err(|e| ResolutionError::CommitSha {
                repo: repo.clone(),
                git_ref: git_ref.to_owned(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("link", HeaderValue::from_str(link).unwrap());
        headers
    }

    fn checkout() -> Repository {
        Repository::new("actions", "checkout")
    }

    #[test]
    fn next_page_from_link_header() {
        let link = r#"<https://api.github.com/repositories/1/tags?per_page=100&page=3>; rel="next", <https://api.github.com/repositories/1/tags?per_page=100&page=7>; rel="last""#;
        assert_eq!(next_page(&headers(link)), Some(3));
    }

    #[test]
    fn no_next_page_on_last_page() {
        let link = r#"<https://api.github.com/repositories/1/tags?per_page=100&page=1>; rel="first", <https://api.github.com/repositories/1/tags?per_page=100&page=6>; rel="prev""#;
        assert_eq!(next_page(&headers(link)), None);
        assert_eq!(next_page(&HeaderMap::new()), None);
    }

    #[test]
    fn page_param_ignores_per_page() {
        assert_eq!(page_param("https://x/tags?page=2&per_page=100"), Some(2));
        assert_eq!(page_param("https://x/tags?per_page=100"), None);
    }

    #[test]
    fn urls_use_configured_api() {
        let client = GithubRegistry::new("https://ghe.example.com/api/v3/", None).unwrap();
        assert_eq!(
            client.tags_url(&checkout(), 2),
            "https://ghe.example.com/api/v3/repos/actions/checkout/tags?per_page=100&page=2"
        );
        assert_eq!(
            client.releases_url(&checkout(), 1),
            "https://ghe.example.com/api/v3/repos/actions/checkout/releases?per_page=100&page=1"
        );
        assert_eq!(
            client.commit_url(&checkout(), "v4"),
            "https://ghe.example.com/api/v3/repos/actions/checkout/commits/v4"
        );
    }

    #[test]
    #[ignore = "requires network access to the Github API"]
    fn resolves_tag_against_github() {
        let client = GithubRegistry::new(DEFAULT_API_URL, std::env::var("GITHUB_TOKEN").ok())
            .unwrap();
        let sha = client.commit(&checkout(), "v4.2.2").unwrap();
        assert_eq!(sha, "11bd71901bbe5b1630ceea73d27597364c9af683");
    }
}
