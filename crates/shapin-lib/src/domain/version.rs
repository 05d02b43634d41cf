use std::cmp::Ordering;

/// What kind of ref a `uses:` version or version comment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionType {
    /// A semver-like tag, possibly partial (e.g., "v3", "v3.1", "1.2.3-rc.1")
    VersionTag,
    /// A full 40-character commit SHA
    FullCommitSha,
    /// Nothing at all
    Empty,
    /// Anything else, typically a branch name
    Other,
}

/// How precisely a version tag is written, following semver component conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPrecision {
    /// Only major version specified (e.g., "v4")
    Major,
    /// Major and minor specified (e.g., "v4.1")
    Minor,
    /// Full major.minor.patch specified (e.g., "v4.1.0")
    Patch,
}

/// Classify a version string.
///
/// A full commit SHA is checked before the tag pattern so that an all-digit
/// SHA is never mistaken for a version tag.
#[must_use]
pub fn classify(version: &str) -> VersionType {
    if version.is_empty() {
        VersionType::Empty
    } else if is_commit_sha(version) {
        VersionType::FullCommitSha
    } else if precision(version).is_some() {
        VersionType::VersionTag
    } else {
        VersionType::Other
    }
}

/// Check if a string is a full commit SHA (40 hexadecimal characters)
#[must_use]
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// True for partial version tags such as "v3" or "v3.1".
#[must_use]
pub fn is_short_tag(version: &str) -> bool {
    matches!(
        precision(version),
        Some(VersionPrecision::Major | VersionPrecision::Minor)
    )
}

/// Strip a leading 'v' or 'V' if present.
fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

/// Split "1.2.3-rc.1+build.5" into the numeric core and the suffix starting at '-' or '+'.
fn split_core(version: &str) -> (&str, &str) {
    match version.find(['-', '+']) {
        Some(idx) => version.split_at(idx),
        None => (version, ""),
    }
}

/// Detect the precision of a version tag.
/// "v4" → Major, "v4.1" → Minor, "v4.1.0" → Patch.
/// Pre-release and build suffixes are allowed but must not be empty ("v4-" is not a tag).
/// Returns None for anything that is not shaped like a version tag.
#[must_use]
pub fn precision(version: &str) -> Option<VersionPrecision> {
    let (core, suffix) = split_core(strip_v(version));

    if suffix.len() == 1
        || !suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }

    let mut count = 0usize;
    for part in core.split('.') {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        count += 1;
    }

    match count {
        1 => Some(VersionPrecision::Major),
        2 => Some(VersionPrecision::Minor),
        3 => Some(VersionPrecision::Patch),
        _ => None,
    }
}

/// Attempts to parse a version string into a semver Version.
/// Handles common formats like "v4", "v4.1", "v4.1.2", "4.1.2", "v4-beta.1".
/// Missing minor/patch components are filled with zeros before the suffix.
#[must_use]
pub fn parse_semver(version: &str) -> Option<semver::Version> {
    let precision = precision(version)?;
    let (core, suffix) = split_core(strip_v(version));

    let padded = match precision {
        VersionPrecision::Major => format!("{core}.0.0{suffix}"),
        VersionPrecision::Minor => format!("{core}.0{suffix}"),
        VersionPrecision::Patch => format!("{core}{suffix}"),
    };

    semver::Version::parse(&padded).ok()
}

/// Semver precedence: major, minor, patch, then pre-release. Build metadata is ignored.
fn precedence(a: &semver::Version, b: &semver::Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// Compare two version strings.
///
/// If both parse as semver, semver precedence decides. A semver always ranks
/// above a string that does not parse. Two non-semver strings compare lexically.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(va), Some(vb)) => precedence(&va, &vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Returns the higher of two versions. On a tie the first one is kept.
#[must_use]
pub fn higher_version<'a>(a: &'a str, b: &'a str) -> &'a str {
    if compare_versions(b, a) == Ordering::Greater {
        b
    } else {
        a
    }
}

/// True if `current` is strictly newer than `candidate`.
#[must_use]
pub fn is_newer(current: &str, candidate: &str) -> bool {
    compare_versions(current, candidate) == Ordering::Greater
}
