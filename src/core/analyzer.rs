use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::advisory::{Advisory, AdvisorySource};
use super::manifest::{DeclaredVersion, ManifestIndex, VersionSpec};
use super::matcher::{find_vulnerable_calls, MatchConfidence, PackageBindings, VulnerableCall};
use super::resolver::{hierarchical_paths, Ecosystem};
use super::scanner::{FileInfo, FileScanner, ScanOptions};
use super::symbols::SymbolSet;
use crate::error::AnalysisError;
use crate::parsers::{cache::ParseCache, extract_file, FileExtraction};

const OSV_VULNERABILITY_URL: &str = "https://osv.dev/vulnerability/";

/// Python modules that ship with the interpreter and never resolve to PyPI.
const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "binascii", "bisect", "builtins",
    "bz2", "calendar", "cgi", "cmath", "codecs", "collections", "concurrent", "configparser",
    "contextlib", "contextvars", "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal",
    "difflib", "dis", "email", "enum", "errno", "fcntl", "fnmatch", "fractions", "ftplib",
    "functools", "gc", "getpass", "gettext", "glob", "gzip", "hashlib", "heapq", "hmac", "html",
    "http", "imaplib", "importlib", "inspect", "io", "ipaddress", "itertools", "json", "locale",
    "logging", "lzma", "math", "mimetypes", "multiprocessing", "numbers", "operator", "os",
    "pathlib", "pickle", "platform", "pprint", "queue", "random", "re", "secrets", "select",
    "shlex", "shutil", "signal", "smtplib", "socket", "sqlite3", "ssl", "stat", "statistics",
    "string", "struct", "subprocess", "sys", "tarfile", "tempfile", "textwrap", "threading",
    "time", "timeit", "tkinter", "traceback", "types", "typing", "unicodedata", "unittest",
    "urllib", "uuid", "warnings", "weakref", "xml", "zipfile", "zlib", "__future__",
];

#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    pub scan: ScanOptions,
    /// Retry ES-module files the grammar rejects with the regex extractor.
    pub legacy_fallback: bool,
    /// Persist extractions under the system temp dir between runs.
    pub disk_cache: bool,
}

/// An external package imported somewhere in the scanned code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDependency {
    pub name: String,
    pub ecosystem: Ecosystem,
    pub found_in: Vec<PathBuf>,
    pub declared: Option<DeclaredVersion>,
}

impl DiscoveredDependency {
    pub fn in_manifest(&self) -> bool {
        self.declared.is_some()
    }

    pub fn version(&self) -> VersionSpec {
        self.declared
            .as_ref()
            .map(|declared| declared.spec.clone())
            .unwrap_or(VersionSpec::Unknown)
    }

    /// Version sent with advisory queries; empty means every version.
    pub fn query_version(&self) -> String {
        self.version().query_version(self.ecosystem).to_string()
    }
}

/// One advisory whose symbols (or, failing that, whose package) are
/// reachable from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryHit {
    pub advisory_id: String,
    pub summary: String,
    /// Hierarchical path the advisory was found under.
    pub queried_as: String,
    /// The advisory was queried without a version and may not apply.
    pub all_versions: bool,
    pub confidence: MatchConfidence,
    pub calls: Vec<VulnerableCall>,
}

/// An advisory with no usable symbols for a package the file imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReview {
    pub advisory_id: String,
    pub summary: String,
    pub url: String,
}

impl ManualReview {
    fn for_advisory(advisory: &Advisory) -> Self {
        Self {
            advisory_id: advisory.id.clone(),
            summary: advisory.summary.clone(),
            url: format!("{OSV_VULNERABILITY_URL}{}", advisory.id),
        }
    }
}

/// Everything found for one dependency in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFinding {
    pub package: String,
    pub ecosystem: Ecosystem,
    pub version: VersionSpec,
    pub in_manifest: bool,
    pub hits: Vec<AdvisoryHit>,
    pub manual_review: Vec<ManualReview>,
}

impl PackageFinding {
    /// One entry per (call text, advisory), direct matches ahead of
    /// package-wide ones.
    pub fn vulnerable_calls(&self) -> Vec<&VulnerableCall> {
        let mut seen = HashSet::new();
        let mut calls: Vec<&VulnerableCall> = self
            .hits
            .iter()
            .flat_map(|hit| hit.calls.iter())
            .filter(|call| seen.insert((call.call.as_str(), call.advisory_id.as_str())))
            .collect();
        calls.sort_by_key(|call| call.confidence != MatchConfidence::Direct);
        calls
    }

    /// Number of distinct call texts, whatever advisories they match.
    pub fn distinct_call_count(&self) -> usize {
        self.vulnerable_calls()
            .iter()
            .map(|call| call.call.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.manual_review.is_empty()
    }

    /// Drops advisories already in `reported` and records the rest.
    fn retain_unreported(&mut self, reported: &mut HashSet<String>) {
        let fresh: HashSet<String> = self
            .hits
            .iter()
            .map(|hit| hit.advisory_id.clone())
            .chain(self.manual_review.iter().map(|review| review.advisory_id.clone()))
            .filter(|id| !reported.contains(id))
            .collect();
        self.hits.retain(|hit| fresh.contains(&hit.advisory_id));
        self.manual_review
            .retain(|review| fresh.contains(&review.advisory_id));
        reported.extend(fresh);
    }

    pub fn is_package_wide_only(&self) -> bool {
        self.hits
            .iter()
            .all(|hit| hit.confidence == MatchConfidence::PackageWide)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub findings: Vec<PackageFinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDependency {
    pub name: String,
    pub ecosystem: Ecosystem,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySummary {
    pub exact: usize,
    pub range: usize,
    pub unknown_in_manifest: usize,
    pub code_only: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub files_scanned: usize,
    pub advisories_checked: usize,
    pub dependencies: Vec<DiscoveredDependency>,
    /// Files with at least one finding, sorted by path.
    pub files: Vec<FileReport>,
    pub skipped_files: Vec<SkippedFile>,
    pub skipped_dependencies: Vec<SkippedDependency>,
}

impl ScanReport {
    pub fn vulnerable_package_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|file| file.findings.iter())
            .filter(|finding| !finding.hits.is_empty())
            .map(|finding| (finding.ecosystem, finding.package.as_str()))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn dependency_summary(&self) -> DependencySummary {
        let mut summary = DependencySummary::default();
        for dependency in &self.dependencies {
            match (dependency.in_manifest(), dependency.version()) {
                (false, _) => summary.code_only += 1,
                (true, VersionSpec::Exact(_)) => summary.exact += 1,
                (true, VersionSpec::Range(_)) => summary.range += 1,
                (true, VersionSpec::Unknown) => summary.unknown_in_manifest += 1,
            }
        }
        summary
    }
}

/// Drives a scan: discovery, extraction, dependency resolution and
/// per-dependency reachability matching.
pub struct ReachabilityAnalyzer<S> {
    source: S,
    file_scanner: FileScanner,
    parse_cache: ParseCache,
    legacy_fallback: bool,
}

impl<S: AdvisorySource + Sync> ReachabilityAnalyzer<S> {
    pub fn new(source: S, options: AnalyzerOptions) -> Self {
        let parse_cache = if options.disk_cache {
            ParseCache::new(None)
        } else {
            ParseCache::in_memory_only()
        };
        Self {
            source,
            file_scanner: FileScanner::new(options.scan),
            parse_cache,
            legacy_fallback: options.legacy_fallback,
        }
    }

    /// Scans `root_path`. Only file discovery failing is an error; every
    /// other failure is recorded in the report and the scan carries on.
    pub fn analyze(&self, root_path: &Path) -> Result<ScanReport> {
        info!("Analyzing repository: {}", root_path.display());
        let files = self.file_scanner.scan_directory(root_path)?;
        info!("Found {} source files for analysis", files.len());

        let (extractions, skipped_files) = self.extract_all(&files);
        let manifests = ManifestIndex::discover(root_path);
        let dependencies = discover_dependencies(&extractions, &manifests);
        info!("Discovered {} external dependencies", dependencies.len());

        let mut by_file: BTreeMap<PathBuf, Vec<PackageFinding>> = BTreeMap::new();
        let mut reported: HashMap<PathBuf, HashSet<String>> = HashMap::new();
        let mut skipped_dependencies = Vec::new();
        let mut advisories_checked = 0;

        for dependency in &dependencies {
            match self.analyze_dependency(dependency, &extractions) {
                Ok(analysis) => {
                    advisories_checked += analysis.advisories;
                    for (path, mut finding) in analysis.findings {
                        // Sibling Go imports resolve to the same module's advisories.
                        let seen = reported.entry(path.clone()).or_default();
                        finding.retain_unreported(seen);
                        if !finding.is_empty() {
                            by_file.entry(path).or_default().push(finding);
                        }
                    }
                }
                Err(err) => {
                    warn!("Skipping {} ({}): {err}", dependency.name, dependency.ecosystem);
                    skipped_dependencies.push(SkippedDependency {
                        name: dependency.name.clone(),
                        ecosystem: dependency.ecosystem,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(ScanReport {
            root: root_path.to_path_buf(),
            files_scanned: files.len(),
            advisories_checked,
            dependencies,
            files: by_file
                .into_iter()
                .map(|(path, findings)| FileReport { path, findings })
                .collect(),
            skipped_files,
            skipped_dependencies,
        })
    }

    fn extract_all(&self, files: &[FileInfo]) -> (Vec<FileExtraction>, Vec<SkippedFile>) {
        let results: Vec<Result<FileExtraction, AnalysisError>> = files
            .par_iter()
            .map(|file| self.extract_cached(&file.path))
            .collect();

        let mut extractions = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(extraction) => extractions.push(extraction),
                Err(err) => {
                    debug!("Skipping {}: {err}", file.path.display());
                    skipped.push(SkippedFile {
                        path: file.path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        (extractions, skipped)
    }

    fn extract_cached(&self, file_path: &Path) -> Result<FileExtraction, AnalysisError> {
        if let Some(cached) = self.parse_cache.get(file_path) {
            return Ok(cached);
        }

        let extraction = extract_file(file_path, self.legacy_fallback)?;
        if let Err(err) = self.parse_cache.store(file_path, &extraction) {
            debug!("Failed to cache {}: {err}", file_path.display());
        }
        Ok(extraction)
    }

    fn analyze_dependency(
        &self,
        dependency: &DiscoveredDependency,
        extractions: &[FileExtraction],
    ) -> Result<DependencyAnalysis, AnalysisError> {
        let ecosystem = dependency.ecosystem;
        let query_version = dependency.query_version();
        let all_versions = query_version.is_empty();
        if all_versions {
            debug!(
                "{} has no pinned version ({:?}), checking all known advisories",
                dependency.name,
                dependency.version().as_str()
            );
        }

        let files: Vec<&FileExtraction> = extractions
            .iter()
            .filter(|extraction| dependency.found_in.contains(&extraction.path))
            .collect();

        let mut findings: BTreeMap<PathBuf, PackageFinding> = BTreeMap::new();
        let mut seen_advisories = HashSet::new();

        for module_path in hierarchical_paths(&dependency.name, ecosystem).iter() {
            debug!("Checking {module_path}");
            let advisories = self.source.query(module_path, &query_version, ecosystem)?;

            for advisory in advisories {
                if !seen_advisories.insert(advisory.id.clone()) {
                    continue;
                }
                let symbols = SymbolSet::for_advisory(&advisory, module_path);
                debug!("Advisory {} with {} symbols", advisory.id, symbols.len());

                let per_file: Vec<(PathBuf, Option<AdvisoryHit>, bool)> = files
                    .par_iter()
                    .filter_map(|file| {
                        match_file(file, &advisory, &symbols, module_path, ecosystem, all_versions)
                    })
                    .collect();

                for (path, hit, needs_review) in per_file {
                    let finding = findings.entry(path).or_insert_with(|| PackageFinding {
                        package: dependency.name.clone(),
                        ecosystem,
                        version: dependency.version(),
                        in_manifest: dependency.in_manifest(),
                        hits: Vec::new(),
                        manual_review: Vec::new(),
                    });
                    if let Some(hit) = hit {
                        finding.hits.push(hit);
                    }
                    if needs_review {
                        finding.manual_review.push(ManualReview::for_advisory(&advisory));
                    }
                }
            }
        }

        Ok(DependencyAnalysis {
            advisories: seen_advisories.len(),
            findings: findings.into_iter().collect(),
        })
    }
}

struct DependencyAnalysis {
    advisories: usize,
    findings: Vec<(PathBuf, PackageFinding)>,
}

/// Matches one advisory against one file. Returns `None` when the file
/// cannot reach the package at all.
fn match_file(
    file: &FileExtraction,
    advisory: &Advisory,
    symbols: &SymbolSet,
    module_path: &str,
    ecosystem: Ecosystem,
    all_versions: bool,
) -> Option<(PathBuf, Option<AdvisoryHit>, bool)> {
    if PackageBindings::collect(&file.imports, module_path, ecosystem).is_empty() {
        return None;
    }

    let outcome = find_vulnerable_calls(&file.imports, &file.calls, module_path, ecosystem, symbols);
    let needs_review = symbols.is_empty();
    let hit = (!outcome.is_empty()).then(|| {
        let confidence = outcome.confidence;
        AdvisoryHit {
            advisory_id: advisory.id.clone(),
            summary: advisory.summary.clone(),
            queried_as: module_path.to_string(),
            all_versions,
            confidence,
            calls: outcome.into_vulnerable_calls(&advisory.id),
        }
    });

    (hit.is_some() || needs_review).then(|| (file.path.clone(), hit, needs_review))
}

/// Collects the external packages imported across all files, normalised to
/// the name each ecosystem publishes them under.
pub fn discover_dependencies(
    extractions: &[FileExtraction],
    manifests: &ManifestIndex,
) -> Vec<DiscoveredDependency> {
    let mut imported: BTreeMap<(Ecosystem, String), BTreeSet<PathBuf>> = BTreeMap::new();

    for extraction in extractions {
        let ecosystem = extraction.language.ecosystem();
        for binding in &extraction.imports {
            if let Some(name) = normalize_import_name(&binding.package_name, ecosystem) {
                imported
                    .entry((ecosystem, name))
                    .or_default()
                    .insert(extraction.path.clone());
            }
        }
    }

    imported
        .into_iter()
        .filter_map(|((ecosystem, name), files)| {
            if ecosystem == Ecosystem::Go && manifests.is_local_go_package(&name) {
                return None;
            }
            let declared = manifests.lookup(&name, ecosystem);
            if ecosystem == Ecosystem::Go && declared.is_none() && is_go_stdlib(&name) {
                return None;
            }
            Some(DiscoveredDependency {
                name,
                ecosystem,
                found_in: files.into_iter().collect(),
                declared,
            })
        })
        .collect()
}

/// Maps an import path to its package name, or `None` for relative,
/// absolute and standard-library imports.
pub fn normalize_import_name(import_path: &str, ecosystem: Ecosystem) -> Option<String> {
    let import_path = import_path.trim();
    if import_path.is_empty() || import_path.starts_with('.') || import_path.starts_with('/') {
        return None;
    }

    match ecosystem {
        Ecosystem::Npm => {
            if import_path.starts_with("node:") {
                return None;
            }
            let mut segments = import_path.split('/');
            let first = segments.next()?;
            if first.starts_with('@') {
                let name = segments.next()?;
                Some(format!("{first}/{name}"))
            } else {
                Some(first.to_string())
            }
        }
        Ecosystem::PyPI => {
            let top = import_path.split('.').next()?;
            (!PYTHON_STDLIB.contains(&top)).then(|| top.to_string())
        }
        Ecosystem::Go => Some(import_path.to_string()),
    }
}

/// Standard-library import paths have no dot in their first element.
fn is_go_stdlib(import_path: &str) -> bool {
    import_path
        .split('/')
        .next()
        .is_some_and(|first| !first.contains('.'))
}
