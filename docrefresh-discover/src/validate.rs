//! Structural document checks: metadata headers, relative links, `path:line`
//! code references.
//!
//! Only a missing required document is an ERROR. Everything found by reading
//! content is a WARNING or INFO and never affects validity.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use docrefresh_core::{DocKind, RepoKey, RepositoryInventory};
use regex::Regex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---").unwrap());
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\*\*Version:\*\*\s*(\S+)").unwrap());
static LAST_UPDATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\*\*Last Updated:\*\*\s*(\d{4}-\d{2}-\d{2})").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
// `src/foo.rs:42` needs a separator or extension before the colon.
static CODE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*[./][^`]+):(\d+)`").unwrap());

const SKIPPED_LINK_PREFIXES: [&str; 4] = ["http://", "https://", "mailto:", "#"];
const SKIPPED_REF_SCHEMES: [&str; 5] = ["http", "https", "ftp", "bolt", "neo4j"];
const DATE_KEYS: [&str; 3] = ["date:", "last_updated:", "updated:"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn letter(self) -> char {
        match self {
            Severity::Error => 'E',
            Severity::Warning => 'W',
            Severity::Info => 'I',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    RequiredDocExists,
    Readable,
    HasVersion,
    HasLastUpdated,
    LinkResolves,
    CodeRefFileExists,
    CodeRefLineValid,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rule::RequiredDocExists => "required_doc_exists",
            Rule::Readable => "readable",
            Rule::HasVersion => "has_version",
            Rule::HasLastUpdated => "has_last_updated",
            Rule::LinkResolves => "link_resolves",
            Rule::CodeRefFileExists => "code_ref_file_exists",
            Rule::CodeRefLineValid => "code_ref_line_valid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub doc_path: PathBuf,
    pub rule: Rule,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ValidationIssue {
    fn new(doc_path: &Path, rule: Rule, severity: Severity, message: String) -> Self {
        Self {
            doc_path: doc_path.to_path_buf(),
            rule,
            severity,
            message,
            line: None,
            context: None,
        }
    }

    fn at(mut self, line: usize, context: impl Into<String>) -> Self {
        self.line = Some(line);
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub repo_key: RepoKey,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn error_count(&self) -> usize {
        self.with_severity(Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.with_severity(Severity::Warning).count()
    }

    pub fn info_count(&self) -> usize {
        self.with_severity(Severity::Info).count()
    }

    /// Valid iff there are no ERROR-severity issues.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate every document in `inventory`.
pub fn validate_inventory(inventory: &RepositoryInventory) -> ValidationReport {
    let mut issues: Vec<ValidationIssue> = inventory
        .missing_required()
        .map(|doc| {
            let mut issue = ValidationIssue::new(
                &doc.path,
                Rule::RequiredDocExists,
                Severity::Error,
                format!("Required document missing: {}", doc.key()),
            );
            if !doc.purpose.is_empty() {
                issue.context = Some(doc.purpose.clone());
            }
            issue
        })
        .collect();

    for doc in inventory.existing() {
        let full = doc.full_path(&inventory.repo_path);
        if doc.kind == DocKind::Directory || full.is_dir() {
            continue;
        }
        match std::fs::read_to_string(&full) {
            Ok(content) => {
                issues.extend(validate_document(&doc.path, &content, &inventory.repo_path));
            }
            Err(e) => {
                tracing::warn!("cannot read {}: {e}", full.display());
                issues.push(ValidationIssue::new(
                    &doc.path,
                    Rule::Readable,
                    Severity::Warning,
                    format!("Cannot read file: {e}"),
                ));
            }
        }
    }

    tracing::info!(
        "{}: validation found {} issue(s)",
        inventory.repo_key,
        issues.len()
    );
    ValidationReport {
        repo_key: inventory.repo_key.clone(),
        issues,
    }
}

/// Check one document's content. `doc_path` is relative to `repo_root`.
pub fn validate_document(doc_path: &Path, content: &str, repo_root: &Path) -> Vec<ValidationIssue> {
    let mut issues = check_metadata(doc_path, content);
    issues.extend(check_links(doc_path, content, repo_root));
    issues.extend(check_code_refs(doc_path, content, repo_root));
    issues
}

/// Version from frontmatter `version:` (quotes stripped) or an inline
/// `**Version:**` marker.
pub fn extract_version(content: &str) -> Option<String> {
    if let Some(front) = frontmatter(content) {
        let found = front.lines().find_map(|line| {
            let trimmed = line.trim();
            let lower = trimmed.to_ascii_lowercase();
            lower
                .starts_with("version:")
                .then(|| trimmed["version:".len()..].trim())
                .map(|v| v.trim_matches(|c| c == '"' || c == '\'').to_owned())
        });
        if found.is_some() {
            return found;
        }
    }
    VERSION_RE
        .captures(content)
        .map(|caps| caps[1].to_owned())
}

/// Top-level `version` of `<repo>/META.yaml`, if the file exists and has one.
pub fn read_meta_version(repo_path: &Path) -> Option<String> {
    let path = repo_path.join("META.yaml");
    let raw = std::fs::read_to_string(&path).ok()?;
    let value: serde_yaml::Value = match serde_yaml::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("ignoring unparsable {}: {e}", path.display());
            return None;
        }
    };
    match value.get("version")? {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// True when the first numeric segment of `new` is greater than that of `old`.
///
/// A leading `v`/`V` is ignored. Missing or unparsable versions never count.
pub fn is_major_version_bump(old: Option<&str>, new: Option<&str>) -> bool {
    fn major(v: &str) -> Option<u64> {
        v.trim_start_matches(|c| c == 'v' || c == 'V')
            .split('.')
            .next()?
            .trim()
            .parse()
            .ok()
    }
    match (old.and_then(major), new.and_then(major)) {
        (Some(old), Some(new)) => new > old,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn frontmatter(content: &str) -> Option<&str> {
    FRONTMATTER_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn check_metadata(doc_path: &Path, content: &str) -> Vec<ValidationIssue> {
    let (has_version, has_date) = if is_yaml(doc_path) {
        yaml_metadata(content)
    } else if let Some(front) = frontmatter(content) {
        let lower = front.to_lowercase();
        (
            lower.contains("version:"),
            DATE_KEYS.iter().any(|k| lower.contains(k)),
        )
    } else {
        (
            VERSION_RE.is_match(content),
            LAST_UPDATED_RE.is_match(content),
        )
    };

    let mut issues = Vec::new();
    if !has_version {
        issues.push(ValidationIssue::new(
            doc_path,
            Rule::HasVersion,
            Severity::Warning,
            "Document missing version indicator".to_owned(),
        ));
    }
    if !has_date {
        issues.push(ValidationIssue::new(
            doc_path,
            Rule::HasLastUpdated,
            Severity::Warning,
            "Document missing last updated date".to_owned(),
        ));
    }
    issues
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// A YAML document is its own header block: look at its top-level keys.
fn yaml_metadata(content: &str) -> (bool, bool) {
    let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(content)
    else {
        return (false, false);
    };
    let has = |key: &str| map.contains_key(key);
    (
        has("version"),
        ["date", "last_updated", "updated"].iter().any(|k| has(k)),
    )
}

fn check_links(doc_path: &Path, content: &str, repo_root: &Path) -> Vec<ValidationIssue> {
    let doc_dir = repo_root
        .join(doc_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repo_root.to_path_buf());

    let mut issues = Vec::new();
    for caps in LINK_RE.captures_iter(content) {
        let (Some(whole), Some(text), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let target = target.as_str().trim();
        if SKIPPED_LINK_PREFIXES.iter().any(|p| target.starts_with(p)) {
            continue;
        }
        // Drop an optional `"title"` and the `#anchor`.
        let path_part = target
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c| c == '<' || c == '>');
        let path_part = path_part.split('#').next().unwrap_or_default();
        if path_part.is_empty() {
            continue;
        }

        let resolved = match path_part.strip_prefix('/') {
            Some(from_root) => repo_root.join(from_root),
            None => doc_dir.join(path_part),
        };
        if !resolved.exists() {
            issues.push(
                ValidationIssue::new(
                    doc_path,
                    Rule::LinkResolves,
                    Severity::Warning,
                    format!("Broken link: [{}]({target})", text.as_str()),
                )
                .at(line_number(content, whole.start()), target),
            );
        }
    }
    issues
}

fn check_code_refs(doc_path: &Path, content: &str, repo_root: &Path) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for caps in CODE_REF_RE.captures_iter(content) {
        let (Some(whole), Some(file_ref), Some(line_ref)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let file_ref = file_ref.as_str();
        if SKIPPED_REF_SCHEMES.iter().any(|s| file_ref.starts_with(s))
            || file_ref.to_lowercase().contains("localhost")
            || !(file_ref.contains('/') || file_ref.contains('.'))
        {
            continue;
        }

        let context = format!("`{file_ref}:{}`", line_ref.as_str());
        let line = line_number(content, whole.start());
        let target = repo_root.join(file_ref);
        if !target.exists() {
            issues.push(
                ValidationIssue::new(
                    doc_path,
                    Rule::CodeRefFileExists,
                    Severity::Warning,
                    format!("Code reference to non-existent file: {file_ref}"),
                )
                .at(line, context),
            );
            continue;
        }

        let Ok(wanted) = line_ref.as_str().parse::<usize>() else {
            continue;
        };
        if !target.is_file() {
            continue;
        }
        let Ok(body) = std::fs::read_to_string(&target) else {
            continue;
        };
        let line_count = body.lines().count();
        if wanted > line_count {
            issues.push(
                ValidationIssue::new(
                    doc_path,
                    Rule::CodeRefLineValid,
                    Severity::Info,
                    format!(
                        "Code reference line {wanted} exceeds file length ({line_count} lines): {file_ref}"
                    ),
                )
                .at(line, context),
            );
        }
    }
    issues
}

/// 1-based line of byte offset `pos`.
fn line_number(content: &str, pos: usize) -> usize {
    content[..pos].matches('\n').count() + 1
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
