use std::path::{Path, PathBuf};
use thiserror::Error;

use super::pin::PinError;

/// Errors that can occur when working with workflow files
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid target pattern: {pattern}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to read workflow: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workflow: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a reported line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The line is (or would be) replaced by this text
    Rewritten(String),
    /// The line could not be handled
    Failed(PinError),
}

/// One reported line of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The original line, without its line ending
    pub text: String,
    pub outcome: Outcome,
}

impl Finding {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// Finds, reads and writes the files to process.
pub trait WorkflowStore {
    /// All files matching the configured targets, sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Glob`] if a target pattern is invalid.
    fn discover(&self) -> Result<Vec<PathBuf>, WorkflowError>;

    /// Read a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Read`] if the file cannot be read.
    fn read(&self, path: &Path) -> Result<String, WorkflowError>;

    /// Replace the content of an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Write`] if the file cannot be written.
    fn write(&self, path: &Path, content: &str) -> Result<(), WorkflowError>;
}

/// Split content into `(line, ending)` pairs, where `ending` is `"\n"`,
/// `"\r\n"` or empty for a last line without terminator.
/// Concatenating every pair gives back the original content.
#[must_use]
pub fn split_lines(content: &str) -> Vec<(&str, &str)> {
    content
        .split_inclusive('\n')
        .map(|chunk| {
            let body = chunk
                .strip_suffix("\r\n")
                .or_else(|| chunk.strip_suffix('\n'))
                .unwrap_or(chunk);
            (body, &chunk[body.len()..])
        })
        .collect()
}
