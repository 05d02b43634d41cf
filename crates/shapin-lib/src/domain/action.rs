use regex::Regex;
use std::fmt;

use super::version::{VersionType, classify};

/// Separator written before a version comment when the line had none.
pub const DEFAULT_COMMENT_SEPARATOR: &str = " # ";

/// Matches a `uses:` line. Groups:
/// 1. everything up to and including `uses:` and the whitespace after it
/// 2. opening quote
/// 3. action name
/// 4. ref after `@`
/// 5. closing quote
/// 6. comment separator (`" # "` or `" # tag="`)
/// 7. first comment token
/// 8. the rest of the line
const USES_PATTERN: &str = r#"^(\s*(?:-\s+)?['"]?uses['"]?\s*:\s+)(['"]?)([^'"\s@#:]+)@([^'"\s#]+)(['"]?)(?:(\s+#\s*(?:tag=)?)([^\s'"]+))?(.*)$"#;

/// A GitHub repository that hosts an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One `uses:` reference parsed from a single line.
///
/// Every field is the exact text from the line, so that [`Action::rewrite`]
/// reproduces the line byte for byte apart from the ref and the comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Prefix up to and including `uses:` and its separator (e.g., `"      - uses: "`)
    pub uses: String,
    /// Quote wrapping `name@version`: `'`, `"` or empty
    pub quote: String,
    /// The action name (e.g., "actions/checkout" or "github/codeql-action/init")
    pub name: String,
    /// The ref after @ (could be tag, SHA, or branch)
    pub version: String,
    /// Text between the ref and the version comment (e.g., `" # "`), empty without a comment
    pub comment_separator: String,
    /// The version recorded in the trailing comment, if any
    pub version_comment: String,
    /// Anything after the version comment
    pub suffix: String,
}

impl Action {
    /// The repository hosting this action: the first two segments of the name.
    /// Returns None for names without an owner.
    #[must_use]
    pub fn repository(&self) -> Option<Repository> {
        let mut parts = self.name.split('/');
        let owner = parts.next().filter(|s| !s.is_empty())?;
        let name = parts.next().filter(|s| !s.is_empty())?;
        Some(Repository::new(owner, name))
    }

    /// Build the line again with a new ref and version comment.
    #[must_use]
    pub fn rewrite(&self, version: &str, comment: &str) -> String {
        let separator = if self.comment_separator.is_empty() {
            DEFAULT_COMMENT_SEPARATOR
        } else {
            self.comment_separator.as_str()
        };
        format!(
            "{}{}{}@{}{}{}{}{}",
            self.uses, self.quote, self.name, version, self.quote, separator, comment, self.suffix
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Recognizes `uses:` lines and splits them into an [`Action`].
#[derive(Debug, Clone)]
pub struct LineMatcher {
    uses: Regex,
}

impl LineMatcher {
    /// Compile the `uses:` pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            uses: Regex::new(USES_PATTERN)?,
        })
    }

    /// Parse a single line without its line ending.
    ///
    /// Returns None for anything that is not a remote `uses:` reference with a
    /// ref: comments, other keys, local actions (`./path`), `docker://` images,
    /// and mismatched quotes.
    ///
    /// After a commit SHA, the first comment token is always the version
    /// comment. After any other ref, a comment that is not a version tag is
    /// free text and stays in the suffix.
    #[must_use]
    pub fn parse(&self, line: &str) -> Option<Action> {
        let caps = self.uses.captures(line)?;
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_owned();

        let quote = group(2);
        if quote != group(5) {
            return None;
        }

        let version = group(4);
        let mut comment_separator = group(6);
        let mut version_comment = group(7);
        let mut suffix = group(8);
        if classify(&version) != VersionType::FullCommitSha
            && classify(&version_comment) != VersionType::VersionTag
        {
            suffix = format!("{comment_separator}{version_comment}{suffix}");
            comment_separator.clear();
            version_comment.clear();
        }

        Some(Action {
            uses: group(1),
            quote,
            name: group(3),
            version,
            comment_separator,
            version_comment,
            suffix,
        })
    }
}
