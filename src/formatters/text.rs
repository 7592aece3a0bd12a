//! Human-readable report.
//!
//! One block per affected file, grouped by package:
//!
//! ```text
//!  src/app.js
//!   lodash@4.17.15 (1 vulnerable function)
//!     - _.merge (GHSA-p6mc-m468-83gw) line 3
//! ```
//!
//! Package-wide matches are tagged `[package-wide]`; advisories without
//! usable symbols are listed for manual review with their OSV link.

use anyhow::Result;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use crate::core::analyzer::{FileReport, PackageFinding, ScanReport};
use crate::core::{MatchConfidence, VersionSpec};

pub struct TextFormatter {
    /// Also list dependencies and skipped files.
    verbose: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn format_to_file(&self, report: &ScanReport, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.format(report)?)?;
        Ok(())
    }

    pub fn format(&self, report: &ScanReport) -> Result<String> {
        let mut out = String::new();

        writeln!(
            out,
            "Analyzed {} source {} ({} skipped)",
            report.files_scanned,
            pluralize("file", report.files_scanned),
            report.skipped_files.len()
        )?;
        self.write_dependency_summary(&mut out, report)?;

        if report.files.is_empty() {
            if report.files_scanned == 0 {
                writeln!(out, "No source files found to analyze")?;
            } else {
                writeln!(out, "No reachable vulnerabilities found")?;
                writeln!(
                    out,
                    "   Analyzed {} source files across {} external dependencies",
                    report.files_scanned,
                    report.dependencies.len()
                )?;
            }
        } else {
            let file_count = report.files.len();
            let package_count = report.vulnerable_package_count();
            writeln!(
                out,
                "Found vulnerabilities in {} {}, packages with vulnerabilities: {}",
                file_count,
                pluralize("file", file_count),
                package_count
            )?;
            writeln!(out)?;
            for file in &report.files {
                write_file(&mut out, file)?;
            }
        }

        if !report.skipped_dependencies.is_empty() {
            writeln!(out, "Dependencies not analyzed (advisory lookup failed):")?;
            for skipped in &report.skipped_dependencies {
                writeln!(out, "  - {} ({}): {}", skipped.name, skipped.ecosystem, skipped.reason)?;
            }
            writeln!(out)?;
        }

        if self.verbose && !report.skipped_files.is_empty() {
            writeln!(out, "Skipped files:")?;
            for skipped in &report.skipped_files {
                writeln!(out, "  - {}: {}", skipped.path.display(), skipped.reason)?;
            }
        }

        Ok(out)
    }

    fn write_dependency_summary(&self, out: &mut String, report: &ScanReport) -> Result<()> {
        let summary = report.dependency_summary();
        writeln!(out)?;
        writeln!(out, "External dependencies discovered: {}", report.dependencies.len())?;
        writeln!(out, "  - With exact versions (in manifests): {}", summary.exact)?;
        writeln!(out, "  - With semver ranges (in manifests): {}", summary.range)?;
        writeln!(out, "  - Unknown versions (in manifests): {}", summary.unknown_in_manifest)?;
        writeln!(out, "  - Unknown versions (code-only): {}", summary.code_only)?;

        if self.verbose {
            for dependency in &report.dependencies {
                let version = dependency.version();
                writeln!(
                    out,
                    "    {}@{} ({}) in {} {}",
                    dependency.name,
                    version_label(&version),
                    dependency.ecosystem,
                    dependency.found_in.len(),
                    pluralize("file", dependency.found_in.len())
                )?;
            }
        }
        writeln!(out)?;
        Ok(())
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(out: &mut String, file: &FileReport) -> Result<()> {
    writeln!(out, " {}", file.path.display())?;
    for finding in &file.findings {
        write_finding(out, finding)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_finding(out: &mut String, finding: &PackageFinding) -> Result<()> {
    let calls = finding.vulnerable_calls();
    let function_count = finding.distinct_call_count();
    let review_count = finding.manual_review.len();
    let package_key = format!("{}@{}", finding.package, version_label(&finding.version));

    let mut headline = format!(
        "{} vulnerable {}",
        function_count,
        pluralize("function", function_count)
    );
    if review_count > 0 {
        write!(headline, " + {} requiring manual review", review_count)?;
    }
    writeln!(out, "  {} ({})", package_key, headline)?;

    match (&finding.version, finding.in_manifest) {
        (_, false) => writeln!(out, "     not in a manifest: all known advisories checked")?,
        (VersionSpec::Range(range), true) => {
            writeln!(out, "     semver range {range}: specify an exact version for precise analysis")?
        }
        (VersionSpec::Unknown, true) => {
            writeln!(out, "     unknown version: specify an exact version for precise analysis")?
        }
        (VersionSpec::Exact(_), true) => {}
    }

    for call in calls {
        let mut line = format!("    - {} ({})", call.call, call.advisory_id);
        if call.confidence == MatchConfidence::PackageWide {
            line.push_str(" [package-wide]");
        }
        write!(line, " line {}", call.line)?;
        writeln!(out, "{line}")?;
    }

    for hit in &finding.hits {
        if !hit.queried_as.eq_ignore_ascii_case(&finding.package) {
            writeln!(out, "      {} via {}", hit.advisory_id, hit.queried_as)?;
        }
    }

    if !finding.hits.is_empty() && finding.is_package_wide_only() {
        writeln!(
            out,
            "     package is reachable but no advisory symbol is called: verify manually"
        )?;
    }

    if review_count > 0 {
        writeln!(out)?;
        writeln!(out, "   Advisories with no extracted symbols (package-wide):")?;
        for review in &finding.manual_review {
            writeln!(out, "    - {}: \"{}\"", review.advisory_id, review.summary)?;
            writeln!(out, "      {}", review.url)?;
        }
    }

    Ok(())
}

fn version_label(version: &VersionSpec) -> &str {
    match version {
        VersionSpec::Unknown => "unknown",
        VersionSpec::Range(version) | VersionSpec::Exact(version) => version,
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
