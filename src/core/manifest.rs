//! Declared-version lookup in `package.json`, `go.mod` and `requirements.txt`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::resolver::{hierarchical_paths, Ecosystem};

static GO_MODULE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*module\s+(\S+)").expect("module directive pattern"));

/// How precisely a manifest pins a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "version", rename_all = "snake_case")]
pub enum VersionSpec {
    /// Missing, `*` or `latest`.
    Unknown,
    /// A semver or PEP 440 range such as `^1.2.0` or `>=2,<3`.
    Range(String),
    Exact(String),
}

impl VersionSpec {
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("latest") || raw == "x" {
            return VersionSpec::Unknown;
        }
        if let Some(pinned) = raw.strip_prefix("==").or_else(|| raw.strip_prefix('=')) {
            let pinned = pinned.trim();
            if !pinned.is_empty() && !is_range(pinned) {
                return VersionSpec::Exact(pinned.to_string());
            }
        }
        if is_range(raw) {
            VersionSpec::Range(raw.to_string())
        } else {
            VersionSpec::Exact(raw.to_string())
        }
    }

    /// Version to send with an advisory query. Empty means "all versions":
    /// Go module versions are not compared, and ranges cannot be.
    pub fn query_version(&self, ecosystem: Ecosystem) -> &str {
        match (self, ecosystem) {
            (_, Ecosystem::Go) => "",
            (VersionSpec::Exact(version), _) => version,
            (VersionSpec::Unknown | VersionSpec::Range(_), _) => "",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VersionSpec::Unknown => "",
            VersionSpec::Range(version) | VersionSpec::Exact(version) => version,
        }
    }
}

fn is_range(version: &str) -> bool {
    const RANGE_MARKERS: &[&str] = &["^", "~", ">", "<", "!=", " - ", "||", ",", ".x", ".*"];
    RANGE_MARKERS.iter().any(|marker| version.contains(marker))
}

/// A version found in a manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVersion {
    pub spec: VersionSpec,
    /// Module path under which the version was found; differs from the
    /// requested name for Go sub-packages.
    pub declared_as: String,
    pub manifest: PathBuf,
}

struct Manifest {
    path: PathBuf,
    ecosystem: Ecosystem,
    content: String,
}

/// Every manifest under a project root, read once.
pub struct ManifestIndex {
    manifests: Vec<Manifest>,
}

impl ManifestIndex {
    pub fn discover(root: &Path) -> Self {
        let mut manifests = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ecosystem) = manifest_ecosystem(entry.file_name().to_str()) else {
                continue;
            };
            match fs::read_to_string(entry.path()) {
                Ok(content) => manifests.push(Manifest {
                    path: entry.path().to_path_buf(),
                    ecosystem,
                    content,
                }),
                Err(err) => debug!("Skipping unreadable manifest {}: {err}", entry.path().display()),
            }
        }

        manifests.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Found {} manifest files", manifests.len());
        Self { manifests }
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// The declared version of `package`, trying each hierarchical path for
    /// Go (first hit wins) and the exact name elsewhere.
    pub fn lookup(&self, package: &str, ecosystem: Ecosystem) -> Option<DeclaredVersion> {
        let names = match ecosystem {
            Ecosystem::Go => hierarchical_paths(package, ecosystem).into_vec(),
            Ecosystem::Npm | Ecosystem::PyPI => vec![package.to_string()],
        };

        names.iter().find_map(|name| self.lookup_exact(name, ecosystem))
    }

    /// Whether `import_path` belongs to a module defined in the scanned tree.
    pub fn is_local_go_package(&self, import_path: &str) -> bool {
        self.manifests
            .iter()
            .filter(|manifest| manifest.ecosystem == Ecosystem::Go)
            .filter_map(|manifest| GO_MODULE_DIRECTIVE.captures(&manifest.content))
            .filter_map(|captures| captures.get(1))
            .any(|module| {
                let module = module.as_str();
                import_path == module
                    || import_path
                        .strip_prefix(module)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }

    fn lookup_exact(&self, name: &str, ecosystem: Ecosystem) -> Option<DeclaredVersion> {
        let pattern = version_pattern(name, ecosystem)?;

        self.manifests
            .iter()
            .filter(|manifest| manifest.ecosystem == ecosystem)
            .find_map(|manifest| {
                let captures = pattern.captures(&manifest.content)?;
                let raw = captures.get(1)?.as_str();
                Some(DeclaredVersion {
                    spec: VersionSpec::classify(raw),
                    declared_as: name.to_string(),
                    manifest: manifest.path.clone(),
                })
            })
    }
}

fn version_pattern(name: &str, ecosystem: Ecosystem) -> Option<Regex> {
    let name = regex::escape(name);
    let pattern = match ecosystem {
        Ecosystem::Npm => format!(r#""{name}"\s*:\s*"([^"]*)""#),
        Ecosystem::Go => format!(r"(?m)^\s*(?:require\s+)?{name}\s+(v[^\s]+)"),
        Ecosystem::PyPI => format!(r"(?mi)^\s*{name}\s*(?:\[[^\]]*\]\s*)?([=<>~!]=?\s*[^\s#;]+)"),
    };
    Regex::new(&pattern).ok()
}

fn manifest_ecosystem(file_name: Option<&str>) -> Option<Ecosystem> {
    match file_name? {
        "package.json" => Some(Ecosystem::Npm),
        "go.mod" => Some(Ecosystem::Go),
        "requirements.txt" => Some(Ecosystem::PyPI),
        _ => None,
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || matches!(name.as_ref(), "node_modules" | "vendor" | "__pycache__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_versions() {
        assert_eq!(VersionSpec::classify(""), VersionSpec::Unknown);
        assert_eq!(VersionSpec::classify("latest"), VersionSpec::Unknown);
        assert_eq!(VersionSpec::classify("^4.17.0"), VersionSpec::Range("^4.17.0".into()));
        assert_eq!(VersionSpec::classify(">=2.0,<3"), VersionSpec::Range(">=2.0,<3".into()));
        assert_eq!(VersionSpec::classify("1.x"), VersionSpec::Range("1.x".into()));
        assert_eq!(VersionSpec::classify("==2.25.1"), VersionSpec::Exact("2.25.1".into()));
        assert_eq!(VersionSpec::classify("4.17.21"), VersionSpec::Exact("4.17.21".into()));
    }

    #[test]
    fn query_version_is_empty_unless_pinned() {
        let exact = VersionSpec::Exact("1.0.0".into());
        assert_eq!(exact.query_version(Ecosystem::Npm), "1.0.0");
        assert_eq!(exact.query_version(Ecosystem::Go), "");
        assert_eq!(VersionSpec::Range("^1".into()).query_version(Ecosystem::Npm), "");
        assert_eq!(VersionSpec::Unknown.query_version(Ecosystem::PyPI), "");
    }

    #[test]
    fn python_pattern_does_not_match_prefixed_names() {
        let pattern = version_pattern("requests", Ecosystem::PyPI).unwrap();
        assert!(pattern.is_match("requests==2.25.1"));
        assert!(pattern.is_match("Requests[socks] >= 2.0"));
        assert!(!pattern.is_match("requests-oauthlib==1.3.0"));
    }
}
