use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Value};

use crate::domain::{FilterError, IgnoreRule, NamePattern, PatternFormat};

pub const CONFIG_FILE_NAME: &str = ".shapin.toml";

/// Config file location inside `.github/`, used when the root has none.
pub const GITHUB_CONFIG_FILE_NAME: &str = "shapin.toml";

/// The schema version written by `init` and `migrate`.
pub const CURRENT_VERSION: i64 = 3;

const DEFAULT_CONFIG: &str = r#"# shapin configuration
version = 3

# Files to process, as glob patterns relative to the repository root.
# Without any entry, .github/workflows/*.{yml,yaml}, action.{yml,yaml} and
# .github/actions/**/action.{yml,yaml} are processed.
# [[files]]
# pattern = ".github/workflows/*.yml"

# Actions that are left alone. `ref` is optional and matches either the
# ref after @ or the version comment. `format` is one of exact, glob
# (default) or regexp.
# [[ignore_actions]]
# name = "actions/*"
# ref = "main"
# format = "glob"
"#;

/// Errors that can occur when working with the config file
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("failed to parse config file: {}", path.display())]
    Edit {
        path: PathBuf,
        #[source]
        source: Box<toml_edit::TomlError>,
    },

    #[error("failed to write config file: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config version {version} in {}", path.display())]
    UnsupportedVersion { path: PathBuf, version: i64 },

    #[error("invalid pattern in config file: {}", path.display())]
    Pattern {
        path: PathBuf,
        #[source]
        source: FilterError,
    },

    #[error("invalid config file {}: {message}", path.display())]
    Validation { path: PathBuf, message: String },

    #[error("config file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("no config file found in {}", root.display())]
    NotFound { root: PathBuf },
}

// ---- TOML wire types ----

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigData {
    version: Option<i64>,
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(default)]
    ignore_actions: Vec<IgnoreEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileEntry {
    pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IgnoreEntry {
    name: String,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    format: Option<FormatData>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FormatData {
    Exact,
    Glob,
    Regexp,
}

impl From<FormatData> for PatternFormat {
    fn from(format: FormatData) -> Self {
        match format {
            FormatData::Exact => PatternFormat::Exact,
            FormatData::Glob => PatternFormat::Glob,
            FormatData::Regexp => PatternFormat::Regexp,
        }
    }
}

/// How rules were matched before `format` existed.
fn legacy_format(version: i64) -> PatternFormat {
    match version {
        1 => PatternFormat::Exact,
        2 => PatternFormat::Regexp,
        _ => PatternFormat::Glob,
    }
}

/// The loaded config file, or defaults when there is none.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Where the config was read from
    pub path: Option<PathBuf>,
    /// Target file patterns; empty means the default targets
    pub files: Vec<String>,
    pub ignore: Vec<IgnoreRule>,
}

/// Parse config file content. `path` is only used for error context.
///
/// # Errors
///
/// Returns an error if the TOML is malformed, the version is unknown, or a pattern does not compile.
pub fn parse_config(content: &str, path: &Path) -> Result<ConfigFile, ConfigFileError> {
    let data: ConfigData = toml::from_str(content).map_err(|source| ConfigFileError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    let version = data.version.unwrap_or(1);
    if !(1..=CURRENT_VERSION).contains(&version) {
        return Err(ConfigFileError::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        });
    }

    let pattern = |value: &str, format: PatternFormat| {
        NamePattern::new(value, format).map_err(|source| ConfigFileError::Pattern {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut ignore = Vec::with_capacity(data.ignore_actions.len());
    for entry in data.ignore_actions {
        if entry.format.is_some() && version < CURRENT_VERSION {
            return Err(ConfigFileError::Validation {
                path: path.to_path_buf(),
                message: format!(
                    "`format` requires version = {CURRENT_VERSION}, run `shapin migrate` first"
                ),
            });
        }
        let format = entry.format.map_or(legacy_format(version), Into::into);
        ignore.push(IgnoreRule {
            name: pattern(&entry.name, format)?,
            git_ref: entry
                .git_ref
                .as_deref()
                .map(|git_ref| pattern(git_ref, format))
                .transpose()?,
        });
    }

    Ok(ConfigFile {
        path: Some(path.to_path_buf()),
        files: data.files.into_iter().map(|f| f.pattern).collect(),
        ignore,
    })
}

/// The config file of the repository at `root`, if there is one.
#[must_use]
pub fn find_config(root: &Path) -> Option<PathBuf> {
    [
        root.join(CONFIG_FILE_NAME),
        root.join(".github").join(GITHUB_CONFIG_FILE_NAME),
    ]
    .into_iter()
    .find(|path| path.is_file())
}

/// Load the config of the repository at `root`; defaults when there is none.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<ConfigFile, ConfigFileError> {
    let Some(path) = find_config(root) else {
        debug!("No config file in {}, using defaults", root.display());
        return Ok(ConfigFile::default());
    };
    let content = fs::read_to_string(&path).map_err(|source| ConfigFileError::Read {
        path: path.clone(),
        source,
    })?;
    debug!("Loading config from {}", path.display());
    parse_config(&content, &path)
}

/// Write a default config file at the repository root.
///
/// # Errors
///
/// Returns [`ConfigFileError::AlreadyExists`] if a config file is present.
pub fn init_config(root: &Path) -> Result<PathBuf, ConfigFileError> {
    if let Some(path) = find_config(root) {
        return Err(ConfigFileError::AlreadyExists { path });
    }
    let path = root.join(CONFIG_FILE_NAME);
    fs::write(&path, DEFAULT_CONFIG).map_err(|source| ConfigFileError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Result of [`migrate_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub path: PathBuf,
    /// The schema version found before migrating
    pub from_version: i64,
}

impl Migration {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from_version != CURRENT_VERSION
    }
}

/// Rewrite the config file to the current schema version in place.
///
/// Comments and formatting are kept. Each ignore rule gets an explicit
/// `format` so that it keeps matching exactly what it matched before.
///
/// # Errors
///
/// Returns [`ConfigFileError::NotFound`] if there is no config file, or an
/// error if it cannot be read, parsed or written.
pub fn migrate_config(root: &Path) -> Result<Migration, ConfigFileError> {
    let path = find_config(root).ok_or_else(|| ConfigFileError::NotFound {
        root: root.to_path_buf(),
    })?;
    let content = fs::read_to_string(&path).map_err(|source| ConfigFileError::Read {
        path: path.clone(),
        source,
    })?;
    let (migrated, from_version) = migrate_content(&content, &path)?;

    if let Some(migrated) = migrated {
        // Refuse to write something that would not load afterwards.
        parse_config(&migrated, &path)?;
        fs::write(&path, migrated).map_err(|source| ConfigFileError::Write {
            path: path.clone(),
            source,
        })?;
        info!(
            "Migrated {} from version {from_version} to {CURRENT_VERSION}",
            path.display()
        );
    }

    Ok(Migration { path, from_version })
}

/// Returns the migrated content (None when already current) and the original version.
fn migrate_content(
    content: &str,
    path: &Path,
) -> Result<(Option<String>, i64), ConfigFileError> {
    let mut doc: DocumentMut = content.parse().map_err(|source| ConfigFileError::Edit {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    let version = match doc.get("version") {
        None => 1,
        Some(item) => item
            .as_integer()
            .ok_or_else(|| ConfigFileError::Validation {
                path: path.to_path_buf(),
                message: "`version` must be an integer".to_owned(),
            })?,
    };
    if version == CURRENT_VERSION {
        return Ok((None, version));
    }
    if !(1..CURRENT_VERSION).contains(&version) {
        return Err(ConfigFileError::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        });
    }

    let format = legacy_format(version).as_str();
    match doc.get_mut("ignore_actions") {
        Some(Item::ArrayOfTables(rules)) => {
            for rule in rules.iter_mut() {
                if !rule.contains_key("format") {
                    rule.insert("format", toml_edit::value(format));
                }
            }
        }
        Some(Item::Value(Value::Array(rules))) => {
            for rule in rules.iter_mut().filter_map(Value::as_inline_table_mut) {
                if !rule.contains_key("format") {
                    rule.insert("format", Value::from(format));
                }
            }
        }
        _ => {}
    }

    match doc.get_mut("version").and_then(Item::as_value_mut) {
        Some(value) => {
            let decor = value.decor().clone();
            *value = Value::from(CURRENT_VERSION);
            *value.decor_mut() = decor;
        }
        None => {
            doc.insert("version", toml_edit::value(CURRENT_VERSION));
        }
    }

    Ok((Some(doc.to_string()), version))
}
