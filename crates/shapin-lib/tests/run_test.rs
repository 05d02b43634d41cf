#![allow(unused_crate_dependencies)]
use shapin_lib::commands::app::{self, AppError, RunRequest};
use shapin_lib::commands::pin::PinRunError;
use shapin_lib::config::{Config, Settings};
use shapin_lib::domain::{
    Mode, Page, Release, Repository, RepositoryService, ResolutionError, Tag,
};
use shapin_lib::infrastructure::{CONFIG_FILE_NAME, load_config};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

const SHA_V2: &str = "ee0669bd1cc54295c223e0bb666b733df41de1c5";
const SHA_V3: &str = "8e5e7e5ab8b370d6c329ec480221332ada57f0ab";
const SHA_V4: &str = "11bd71901bbe5b1630ceea73d27597364c9af683";
const SHA_GO: &str = "0aaccfd150d50ccaeb58ebd88d36e91967a5f35b";

/// In-memory Github: a few tags per repository, counting commit lookups.
struct MockService {
    commit_calls: Rc<Cell<usize>>,
}

impl MockService {
    fn new() -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                commit_calls: Rc::clone(&calls),
            },
            calls,
        )
    }

    fn tags(repo: &Repository) -> Vec<Tag> {
        let tags: &[(&str, &str)] = match (repo.owner.as_str(), repo.name.as_str()) {
            ("actions", "checkout") => &[
                ("v4.2.2", SHA_V4),
                ("v4", SHA_V4),
                ("v3.5.2", SHA_V3),
                ("v3", SHA_V3),
                ("v2.7.0", SHA_V2),
                ("v2", SHA_V2),
            ],
            ("actions", "setup-go") => &[("v5.0.0", SHA_GO), ("v5", SHA_GO)],
            _ => &[],
        };
        tags.iter()
            .map(|(name, sha)| Tag {
                name: (*name).to_owned(),
                commit_sha: (*sha).to_owned(),
            })
            .collect()
    }
}

impl RepositoryService for MockService {
    fn list_tags(&self, repo: &Repository, _page: u32) -> Result<Page<Tag>, ResolutionError> {
        Ok(Page::last(Self::tags(repo)))
    }

    fn list_releases(&self, repo: &Repository, _page: u32) -> Result<Page<Release>, ResolutionError> {
        let releases = Self::tags(repo)
            .into_iter()
            .filter(|t| t.name.matches('.').count() == 2)
            .map(|t| Release {
                tag_name: t.name,
                draft: false,
                prerelease: false,
            })
            .collect();
        Ok(Page::last(releases))
    }

    fn commit_sha(&self, repo: &Repository, git_ref: &str) -> Result<String, ResolutionError> {
        self.commit_calls.set(self.commit_calls.get() + 1);
        Self::tags(repo)
            .into_iter()
            .find(|t| t.name == git_ref)
            .map(|t| t.commit_sha)
            .ok_or_else(|| ResolutionError::CommitSha {
                repo: repo.clone(),
                git_ref: git_ref.to_owned(),
                reason: "Github API returned status 404 Not Found".to_owned(),
            })
    }
}

fn create_test_repo(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path();
    fs::create_dir_all(root.join(".github").join("workflows")).unwrap();
    root.to_path_buf()
}

fn create_workflow(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(".github").join("workflows").join(name);
    fs::write(&path, content).unwrap();
    path
}

fn load(root: &Path) -> Config {
    Config {
        settings: Settings::default(),
        root: root.to_path_buf(),
        file: load_config(root).unwrap(),
    }
}

fn request(mode: Mode) -> RunRequest {
    RunRequest {
        mode,
        ..RunRequest::default()
    }
}

fn fix() -> Mode {
    Mode {
        fix: true,
        ..Mode::default()
    }
}

#[test]
fn test_fix_pins_every_action() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let workflow = create_workflow(
        &root,
        "ci.yml",
        "name: CI\r\non: push\r\njobs:\r\n  build:\r\n    steps:\r\n      - uses: actions/checkout@v3\r\n      - uses: actions/setup-go@v5.0.0 # keep\r\n      - uses: ./local\r\n",
    );

    let (service, _) = MockService::new();
    let report = app::run_with(&load(&root), &request(fix()), service).unwrap();

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files_changed, 1);
    assert_eq!(report.rewrites().count(), 2);
    assert_eq!(
        fs::read_to_string(&workflow).unwrap(),
        format!(
            "name: CI\r\non: push\r\njobs:\r\n  build:\r\n    steps:\r\n      - uses: actions/checkout@{SHA_V3} # v3.5.2\r\n      - uses: actions/setup-go@{SHA_GO} # v5.0.0 # keep\r\n      - uses: ./local\r\n"
        )
    );
}

#[test]
fn test_second_run_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let workflow = create_workflow(
        &root,
        "ci.yml",
        "steps:\n  - uses: actions/checkout@v2\n  - uses: actions/checkout@v4\n",
    );

    let (service, _) = MockService::new();
    app::run_with(&load(&root), &request(fix()), service).unwrap();
    let pinned = fs::read_to_string(&workflow).unwrap();
    assert_eq!(
        pinned,
        format!(
            "steps:\n  - uses: actions/checkout@{SHA_V2} # v2.7.0\n  - uses: actions/checkout@{SHA_V4} # v4.2.2\n"
        )
    );

    let (service, _) = MockService::new();
    let report = app::run_with(&load(&root), &request(fix()), service).unwrap();
    assert_eq!(report.files_changed, 0);
    assert!(report.findings.is_empty());
    assert_eq!(fs::read_to_string(&workflow).unwrap(), pinned);
}

#[test]
fn test_lookups_are_shared_across_lines_and_files() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    create_workflow(&root, "a.yml", "- uses: actions/checkout@v4.2.2\n");
    create_workflow(&root, "b.yml", "- uses: actions/checkout@v4.2.2\n- uses: actions/checkout@v4.2.2\n");

    let (service, calls) = MockService::new();
    let report = app::run_with(&load(&root), &request(fix()), service).unwrap();

    assert_eq!(report.files_changed, 2);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_check_only_reports_unpinned_without_writing() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let content = format!(
        "- uses: actions/checkout@v4\n- uses: actions/setup-go@{SHA_GO} # v5.0.0\n"
    );
    let workflow = create_workflow(&root, "ci.yml", &content);
    let mode = Mode {
        check: true,
        ..Mode::default()
    };

    let (service, calls) = MockService::new();
    let result = app::run_with(&load(&root), &request(mode), service);

    assert!(matches!(
        result,
        Err(AppError::Pin(PinRunError::Failed { count: 1 }))
    ));
    assert_eq!(calls.get(), 0);
    assert_eq!(fs::read_to_string(&workflow).unwrap(), content);
}

#[test]
fn test_check_with_fix_writes_and_fails() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let workflow = create_workflow(&root, "ci.yml", "- uses: actions/checkout@v4.2.2\n");
    let mode = Mode {
        check: true,
        ..fix()
    };

    let (service, _) = MockService::new();
    let result = app::run_with(&load(&root), &request(mode), service);

    assert!(matches!(
        result,
        Err(AppError::Pin(PinRunError::ChangesNeeded { count: 1 }))
    ));
    assert_eq!(
        fs::read_to_string(&workflow).unwrap(),
        format!("- uses: actions/checkout@{SHA_V4} # v4.2.2\n")
    );
}

#[test]
fn test_diff_does_not_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let content = "- uses: actions/checkout@v4\n";
    let workflow = create_workflow(&root, "ci.yml", content);
    let mode = Mode {
        diff: true,
        ..Mode::default()
    };

    let (service, _) = MockService::new();
    let report = app::run_with(&load(&root), &request(mode), service).unwrap();

    assert_eq!(report.rewrites().count(), 1);
    assert_eq!(report.files_changed, 0);
    assert_eq!(fs::read_to_string(&workflow).unwrap(), content);
}

#[test]
fn test_failed_line_does_not_block_the_rest() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let workflow = create_workflow(
        &root,
        "ci.yml",
        "- uses: actions/checkout@main\n- uses: actions/setup-go@v5\n",
    );

    let (service, _) = MockService::new();
    let result = app::run_with(&load(&root), &request(fix()), service);

    assert!(matches!(
        result,
        Err(AppError::Pin(PinRunError::Failed { count: 1 }))
    ));
    assert_eq!(
        fs::read_to_string(&workflow).unwrap(),
        format!("- uses: actions/checkout@main\n- uses: actions/setup-go@{SHA_GO} # v5.0.0\n")
    );
}

#[test]
fn test_missing_file_is_a_failure() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let workflow = create_workflow(&root, "ci.yml", "- uses: actions/checkout@v4.2.2\n");
    let request = RunRequest {
        files: vec![root.join("missing.yml"), workflow.clone()],
        mode: fix(),
        ..RunRequest::default()
    };

    let (service, _) = MockService::new();
    let result = app::run_with(&load(&root), &request, service);

    assert!(matches!(
        result,
        Err(AppError::Pin(PinRunError::Failed { count: 1 }))
    ));
    assert_eq!(
        fs::read_to_string(&workflow).unwrap(),
        format!("- uses: actions/checkout@{SHA_V4} # v4.2.2\n")
    );
}

#[test]
fn test_config_ignore_rules_and_filters() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    fs::write(
        root.join(CONFIG_FILE_NAME),
        "version = 3\n[[ignore_actions]]\nname = \"actions/checkout\"\nref = \"main\"\n",
    )
    .unwrap();
    let content = "- uses: actions/checkout@main\n- uses: actions/setup-go@v5\n- uses: actions/checkout@v4.2.2\n";
    let workflow = create_workflow(&root, "ci.yml", content);
    let request = RunRequest {
        exclude: vec!["setup-".to_owned()],
        mode: fix(),
        ..RunRequest::default()
    };

    let (service, _) = MockService::new();
    app::run_with(&load(&root), &request, service).unwrap();

    assert_eq!(
        fs::read_to_string(&workflow).unwrap(),
        format!(
            "- uses: actions/checkout@main\n- uses: actions/setup-go@v5\n- uses: actions/checkout@{SHA_V4} # v4.2.2\n"
        )
    );
}

#[test]
fn test_configured_targets() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    fs::write(
        root.join(CONFIG_FILE_NAME),
        "version = 3\n[[files]]\npattern = \"ci/*.yml\"\n",
    )
    .unwrap();
    let ignored = create_workflow(&root, "ci.yml", "- uses: actions/checkout@v4\n");
    fs::create_dir_all(root.join("ci")).unwrap();
    let target = root.join("ci").join("build.yml");
    fs::write(&target, "- uses: actions/checkout@v4.2.2\n").unwrap();

    let (service, _) = MockService::new();
    let report = app::run_with(&load(&root), &request(fix()), service).unwrap();

    assert_eq!(report.files_scanned, 1);
    assert_eq!(
        fs::read_to_string(&ignored).unwrap(),
        "- uses: actions/checkout@v4\n"
    );
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        format!("- uses: actions/checkout@{SHA_V4} # v4.2.2\n")
    );
}

#[test]
fn test_update_moves_to_latest() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_repo(&temp_dir);
    let workflow = create_workflow(
        &root,
        "ci.yml",
        &format!("- uses: actions/checkout@{SHA_V3} # v3.5.2\n"),
    );
    let mode = Mode {
        update: true,
        ..fix()
    };

    let (service, _) = MockService::new();
    app::run_with(&load(&root), &request(mode), service).unwrap();

    assert_eq!(
        fs::read_to_string(&workflow).unwrap(),
        format!("- uses: actions/checkout@{SHA_V4} # v4.2.2\n")
    );
}
