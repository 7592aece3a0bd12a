use serde::{Deserialize, Serialize};
use std::fmt;

/// Package naming system a dependency belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ecosystem {
    #[serde(rename = "npm")]
    Npm,
    #[serde(rename = "PyPI")]
    PyPI,
    #[serde(rename = "Go")]
    Go,
}

impl Ecosystem {
    /// Name used by the OSV database.
    pub fn osv_name(self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "PyPI",
            Ecosystem::Go => "Go",
        }
    }

    pub fn manifest_file(self) -> &'static str {
        match self {
            Ecosystem::Npm => "package.json",
            Ecosystem::PyPI => "requirements.txt",
            Ecosystem::Go => "go.mod",
        }
    }

    /// Separator between a package and its sub-modules in import paths.
    pub fn separator(self) -> char {
        match self {
            Ecosystem::Npm | Ecosystem::Go => '/',
            Ecosystem::PyPI => '.',
        }
    }

    pub fn from_osv_name(name: &str) -> Option<Self> {
        match name {
            "npm" => Some(Ecosystem::Npm),
            "PyPI" => Some(Ecosystem::PyPI),
            "Go" => Some(Ecosystem::Go),
            _ => None,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.osv_name())
    }
}

/// Ordered module paths for one package identifier, most specific first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePaths {
    pub ecosystem: Ecosystem,
    paths: Vec<String>,
}

impl CandidatePaths {
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.paths
    }
}

/// Expands a package identifier into the module paths an advisory database
/// or manifest might key it under.
///
/// Advisories are frequently filed against an enclosing module
/// (`golang.org/x/text`) while code imports a nested one
/// (`golang.org/x/text/language`), so callers walk the list in order and
/// query every level. The input itself is always the first entry.
pub fn hierarchical_paths(name: &str, ecosystem: Ecosystem) -> CandidatePaths {
    let name = name.trim();
    let paths = if name.is_empty() {
        Vec::new()
    } else {
        match ecosystem {
            Ecosystem::Go => go_paths(name),
            Ecosystem::Npm => npm_paths(name),
            Ecosystem::PyPI => python_paths(name),
        }
    };

    CandidatePaths {
        ecosystem,
        paths: dedup_in_order(paths),
    }
}

fn go_paths(import_path: &str) -> Vec<String> {
    let parts: Vec<&str> = import_path
        .split('/')
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return vec![import_path.to_string()];
    }

    (1..=parts.len())
        .rev()
        .map(|len| parts[..len].join("/"))
        .collect()
}

fn npm_paths(package_name: &str) -> Vec<String> {
    let mut paths = vec![package_name.to_string()];

    if let Some(rest) = package_name.strip_prefix('@') {
        if let Some((scope, _)) = rest.split_once('/') {
            if !scope.is_empty() {
                paths.push(format!("@{}", scope));
                paths.push(scope.to_string());
            }
        }
    } else if let Some((base, _)) = package_name.split_once('/') {
        // deep import of an unscoped package: lodash/merge -> lodash
        if !base.is_empty() {
            paths.push(base.to_string());
        }
    }

    paths
}

fn python_paths(package_name: &str) -> Vec<String> {
    let mut paths = vec![package_name.to_string()];

    if package_name.contains('-') {
        paths.push(package_name.replace('-', "_"));
    }
    if package_name.contains('_') {
        paths.push(package_name.replace('_', "-"));
    }

    if package_name.contains('.') {
        let parts: Vec<&str> = package_name.split('.').collect();
        for len in (1..parts.len()).rev() {
            paths.push(parts[..len].join("."));
        }
    }

    if package_name.contains('-') {
        paths.extend(
            package_name
                .split('-')
                .filter(|part| part.len() > 2)
                .map(str::to_string),
        );
    }

    paths
}

fn dedup_in_order(paths: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(paths.len());
    paths
        .into_iter()
        .filter(|path| !path.is_empty() && seen.insert(path.clone()))
        .collect()
}
