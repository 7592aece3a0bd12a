use anyhow::Result;
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::core::analyzer::ScanReport;

/// Machine-readable report: the full [`ScanReport`] plus derived totals.
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format_to_file(&self, report: &ScanReport, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.format(report)?)?;
        Ok(())
    }

    pub fn format(&self, report: &ScanReport) -> Result<String> {
        let document = json!({
            "summary": {
                "files_scanned": report.files_scanned,
                "files_with_findings": report.files.len(),
                "vulnerable_packages": report.vulnerable_package_count(),
                "advisories_checked": report.advisories_checked,
                "dependencies": report.dependency_summary(),
            },
            "report": report,
        });

        Ok(serde_json::to_string_pretty(&document)?)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}
