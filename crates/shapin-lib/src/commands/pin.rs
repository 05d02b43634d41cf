use console::{Term, style};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{
    Finding, LinePinner, Mode, Outcome, RepositoryService, WorkflowError, WorkflowStore,
    split_lines,
};

/// Why a run did not succeed, once every file has been processed.
#[derive(Debug, Error)]
pub enum PinRunError {
    #[error("{count} failure(s)")]
    Failed { count: usize },

    #[error("{count} line(s) are not pinned as expected")]
    ChangesNeeded { count: usize },
}

/// Everything a run found.
#[derive(Debug, Default)]
pub struct PinReport {
    pub files_scanned: usize,
    /// Files written back to disk
    pub files_changed: usize,
    /// Files that could not be read or written
    pub failed_files: Vec<PathBuf>,
    pub findings: Vec<Finding>,
}

impl PinReport {
    /// Failed lines plus failed files.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.findings.iter().filter(|f| f.is_failure()).count() + self.failed_files.len()
    }

    /// Lines that were or would be rewritten.
    pub fn rewrites(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_failure())
    }

    /// Success, or the reason the run must fail.
    ///
    /// # Errors
    ///
    /// Returns [`PinRunError::Failed`] if anything failed.
    /// Returns [`PinRunError::ChangesNeeded`] in check mode if any line needs a change.
    pub fn status(&self, mode: Mode) -> Result<(), PinRunError> {
        let failures = self.failures();
        if failures > 0 {
            return Err(PinRunError::Failed { count: failures });
        }
        let pending = self.rewrites().count();
        if mode.check && pending > 0 {
            return Err(PinRunError::ChangesNeeded { count: pending });
        }
        Ok(())
    }
}

/// Process every file of `store` line by line.
///
/// A file is written back once, after all of its lines were processed, and
/// only when fix mode is on and something changed. Files that cannot be read
/// or written are recorded and the run continues.
///
/// # Errors
///
/// Returns an error if the target files cannot be discovered.
pub fn run<S, W>(pinner: &LinePinner<S>, store: &W) -> Result<PinReport, WorkflowError>
where
    S: RepositoryService,
    W: WorkflowStore,
{
    let mut report = PinReport::default();
    for path in store.discover()? {
        report.files_scanned += 1;
        process_file(pinner, store, &path, &mut report);
    }
    Ok(report)
}

fn process_file<S, W>(pinner: &LinePinner<S>, store: &W, path: &Path, report: &mut PinReport)
where
    S: RepositoryService,
    W: WorkflowStore,
{
    debug!("Processing {}", path.display());
    let content = match store.read(path) {
        Ok(content) => content,
        Err(e) => {
            error!("{e}");
            report.failed_files.push(path.to_path_buf());
            return;
        }
    };

    let mut output = String::with_capacity(content.len());
    let mut changed = false;
    for (index, (line, ending)) in split_lines(&content).into_iter().enumerate() {
        let outcome = match pinner.pin_line(line) {
            Ok(None) => None,
            Ok(Some(new_line)) => Some(Outcome::Rewritten(new_line)),
            Err(e) => Some(Outcome::Failed(e)),
        };
        if let Some(Outcome::Rewritten(new_line)) = &outcome {
            changed = true;
            output.push_str(new_line);
        } else {
            output.push_str(line);
        }
        output.push_str(ending);

        if let Some(outcome) = outcome {
            report.findings.push(Finding {
                file: path.to_path_buf(),
                line: index + 1,
                text: line.to_owned(),
                outcome,
            });
        }
    }

    if changed && pinner.mode().fix {
        match store.write(path, &output) {
            Ok(()) => report.files_changed += 1,
            Err(e) => {
                error!("{e}");
                report.failed_files.push(path.to_path_buf());
            }
        }
    }
}

/// Log the findings of a run and print the diff when asked to.
pub fn present(report: &PinReport, mode: Mode) {
    let term = Term::stdout();
    for finding in &report.findings {
        let location = format!("{}:{}", finding.file.display(), finding.line);
        match &finding.outcome {
            Outcome::Failed(e) => {
                error!("{location}: {e}");
                if let Some(help) = e.help() {
                    info!("  help: {help}");
                }
            }
            Outcome::Rewritten(new_line) => {
                if mode.diff {
                    print_diff(&term, &location, &finding.text, new_line);
                } else if mode.fix {
                    info!("{location}: {}", new_line.trim());
                } else if mode.check {
                    error!("{location}: {}", finding.text.trim());
                }
            }
        }
    }

    let rewrites = report.rewrites().count();
    if mode.fix {
        info!(
            "Scanned {} file(s), pinned {rewrites} line(s) in {} file(s)",
            report.files_scanned, report.files_changed
        );
    } else {
        info!(
            "Scanned {} file(s), {rewrites} line(s) to change",
            report.files_scanned
        );
    }
}

fn print_diff(term: &Term, location: &str, old_line: &str, new_line: &str) {
    let lines = [
        style(location).bold().to_string(),
        style(format!("-{old_line}")).red().to_string(),
        style(format!("+{new_line}")).green().to_string(),
    ];
    for line in lines {
        if let Err(e) = term.write_line(&line) {
            warn!("failed to write diff: {e}");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PinError;

    fn finding(outcome: Outcome) -> Finding {
        Finding {
            file: PathBuf::from(".github/workflows/ci.yml"),
            line: 1,
            text: "uses: actions/checkout@v4".to_owned(),
            outcome,
        }
    }

    #[test]
    fn empty_report_succeeds_in_every_mode() {
        let report = PinReport::default();
        assert!(report.status(Mode::default()).is_ok());
        assert!(
            report
                .status(Mode {
                    check: true,
                    ..Mode::default()
                })
                .is_ok()
        );
    }

    #[test]
    fn failures_include_files() {
        let report = PinReport {
            failed_files: vec![PathBuf::from("missing.yml")],
            findings: vec![finding(Outcome::Failed(PinError::NotPinned {
                action: "actions/checkout@v4".to_owned(),
            }))],
            ..PinReport::default()
        };
        assert_eq!(report.failures(), 2);
        assert!(matches!(
            report.status(Mode::default()),
            Err(PinRunError::Failed { count: 2 })
        ));
    }

    #[test]
    fn rewrites_fail_only_in_check_mode() {
        let report = PinReport {
            findings: vec![finding(Outcome::Rewritten("new".to_owned()))],
            ..PinReport::default()
        };
        let fix = Mode {
            fix: true,
            ..Mode::default()
        };
        assert!(report.status(fix).is_ok());
        assert!(matches!(
            report.status(Mode { check: true, ..fix }),
            Err(PinRunError::ChangesNeeded { count: 1 })
        ));
    }
}
