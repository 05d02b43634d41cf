//! Pin GitHub Actions `uses:` references to full commit SHAs.
//!
//! Each `uses: owner/repo@ref` line of a workflow or action file is rewritten
//! to `owner/repo@<sha> # <tag>`, keeping the rest of the line byte for byte.
//! Versions are resolved through a [`domain::RepositoryService`]; the Github
//! implementation lives in [`infrastructure::github`].

pub mod commands;
pub mod config;
pub mod domain;
pub mod infrastructure;
