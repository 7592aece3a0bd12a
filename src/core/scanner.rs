use anyhow::{bail, Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::parsers::Language;

/// Dependency, build and virtualenv directories that never hold first-party code.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "vendor",
    "build",
    "dist",
    "venv",
    "env",
];

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub languages: Vec<Language>,
    /// Extra gitignore-style patterns, relative to the scan root.
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            languages: Language::ALL.to_vec(),
            exclude: Vec::new(),
            respect_gitignore: true,
        }
    }
}

pub struct FileScanner {
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Source files under `root_path`, sorted by path.
    ///
    /// Fails only if the root itself cannot be walked; unreadable entries
    /// below it are logged and skipped.
    pub fn scan_directory(&self, root_path: &Path) -> Result<Vec<FileInfo>> {
        if !root_path.is_dir() {
            bail!("{} is not a directory", root_path.display());
        }
        let ignores = self.build_ignores(root_path)?;

        let entries: Vec<DirEntry> = WalkDir::new(root_path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry, &ignores))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("Skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .collect();

        let mut files: Vec<FileInfo> = entries
            .par_iter()
            .filter_map(|entry| {
                let path = entry.path();
                let language = Language::from_path(path).ok()?;
                self.options.languages.contains(&language).then(|| FileInfo {
                    path: path.to_path_buf(),
                    language,
                })
            })
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Discovered {} source files under {}", files.len(), root_path.display());
        Ok(files)
    }

    fn build_ignores(&self, root_path: &Path) -> Result<Gitignore> {
        let mut builder = GitignoreBuilder::new(root_path);

        if self.options.respect_gitignore {
            let gitignore = root_path.join(".gitignore");
            if gitignore.is_file() {
                if let Some(err) = builder.add(&gitignore) {
                    warn!("Ignoring malformed {}: {err}", gitignore.display());
                }
            }
        }
        for pattern in &self.options.exclude {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("invalid exclude pattern '{pattern}'"))?;
        }

        builder.build().context("failed to compile ignore patterns")
    }
}

fn is_skipped(entry: &DirEntry, ignores: &Gitignore) -> bool {
    let is_dir = entry.file_type().is_dir();
    if is_dir {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.ends_with(".egg-info") || SKIPPED_DIRS.contains(&name.as_ref())
        {
            return true;
        }
    }
    // pruned directories are never descended into, so matching the entry
    // itself covers its parents
    ignores.matched(entry.path(), is_dir).is_ignore()
}
