use regex::Regex;
use std::fmt;
use thiserror::Error;

use super::Action;

/// Errors building a filter from user-supplied patterns
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid regular expression: {pattern}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid glob pattern: {pattern}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// How an ignore rule's name and ref are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFormat {
    /// The whole value must equal the pattern
    Exact,
    /// Shell-style glob (`actions/*`)
    Glob,
    /// Regular expression matched against the whole value
    Regexp,
}

impl PatternFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatternFormat::Exact => "exact",
            PatternFormat::Glob => "glob",
            PatternFormat::Regexp => "regexp",
        }
    }
}

impl fmt::Display for PatternFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Glob(glob::Pattern),
    Regexp(Regex),
}

/// A compiled name or ref pattern.
#[derive(Debug, Clone)]
pub struct NamePattern {
    matcher: Matcher,
}

impl NamePattern {
    /// Compile a pattern in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if a glob or regular expression does not compile.
    pub fn new(pattern: &str, format: PatternFormat) -> Result<Self, FilterError> {
        let matcher = match format {
            PatternFormat::Exact => Matcher::Exact(pattern.to_owned()),
            PatternFormat::Glob => Matcher::Glob(glob::Pattern::new(pattern).map_err(|source| {
                FilterError::Glob {
                    pattern: pattern.to_owned(),
                    source,
                }
            })?),
            PatternFormat::Regexp => Matcher::Regexp(compile_regex(&format!("^(?:{pattern})$"))?),
        };
        Ok(Self { matcher })
    }

    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(s) => s == value,
            Matcher::Glob(p) => p.matches(value),
            Matcher::Regexp(re) => re.is_match(value),
        }
    }
}

/// Skip actions whose name (and optionally ref) match.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub name: NamePattern,
    /// When set, the live ref or the version comment must also match
    pub git_ref: Option<NamePattern>,
}

impl IgnoreRule {
    #[must_use]
    pub fn matches(&self, action: &Action) -> bool {
        if !self.name.matches(&action.name) {
            return false;
        }
        match &self.git_ref {
            None => true,
            Some(pattern) => {
                pattern.matches(&action.version)
                    || (!action.version_comment.is_empty()
                        && pattern.matches(&action.version_comment))
            }
        }
    }
}

/// Everything that decides whether a matched line is processed at all.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    ignore: Vec<IgnoreRule>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ActionFilter {
    /// Build a filter from ignore rules and include/exclude regular expressions
    /// matched against the action name.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Regex`] if an include or exclude pattern does not compile.
    pub fn new(
        ignore: Vec<IgnoreRule>,
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, FilterError> {
        Ok(Self {
            ignore,
            include: include
                .iter()
                .map(|p| compile_regex(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| compile_regex(p))
                .collect::<Result<_, _>>()?,
        })
    }

    /// True if the action must be left alone.
    #[must_use]
    pub fn is_skipped(&self, action: &Action) -> bool {
        if self.ignore.iter().any(|rule| rule.matches(action)) {
            return true;
        }
        if self.exclude.iter().any(|re| re.is_match(&action.name)) {
            return true;
        }
        !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(&action.name))
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::Regex {
        pattern: pattern.to_owned(),
        source,
    })
}
