use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use super::resolver::Ecosystem;
use crate::error::AnalysisError;

pub const DEFAULT_OSV_ENDPOINT: &str = "https://api.osv.dev/v1";
const MAX_PAGES: usize = 10;

/// A vulnerability record in OSV schema (the subset the analysis reads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub affected: Vec<Affected>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Affected {
    #[serde(default)]
    pub package: PackageInfo,
    #[serde(default)]
    pub ecosystem_specific: EcosystemSpecific,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ecosystem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcosystemSpecific {
    #[serde(default)]
    pub imports: Vec<AffectedImport>,
}

/// Structured (import path, symbols) entry, as published for Go modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffectedImport {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl Advisory {
    /// All machine-readable affected symbols, across every affected entry.
    pub fn structured_symbols(&self) -> impl Iterator<Item = &str> {
        self.affected
            .iter()
            .flat_map(|affected| affected.ecosystem_specific.imports.iter())
            .flat_map(|import| import.symbols.iter().map(String::as_str))
    }

    pub fn affects(&self, package: &str, ecosystem: Ecosystem) -> bool {
        self.affected.iter().any(|affected| {
            affected.package.name.eq_ignore_ascii_case(package)
                && affected.package.ecosystem == ecosystem.osv_name()
        })
    }
}

/// Where advisories come from. Keyed by (package, version-or-empty, ecosystem).
pub trait AdvisorySource {
    fn query(
        &self,
        package: &str,
        version: &str,
        ecosystem: Ecosystem,
    ) -> Result<Vec<Advisory>, AnalysisError>;
}

impl<T: AdvisorySource + ?Sized> AdvisorySource for Box<T> {
    fn query(
        &self,
        package: &str,
        version: &str,
        ecosystem: Ecosystem,
    ) -> Result<Vec<Advisory>, AnalysisError> {
        (**self).query(package, version, ecosystem)
    }
}

#[derive(Debug, Clone)]
pub struct OsvClientSettings {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for OsvClientSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OSV_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Serialize)]
struct OsvQuery<'a> {
    package: OsvPackage<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

#[derive(Deserialize)]
struct OsvResponse {
    #[serde(default)]
    vulns: Vec<Advisory>,
    #[serde(default)]
    next_page_token: Option<String>,
}

enum QueryFailure {
    Retryable(String),
    Fatal(String),
}

/// Blocking client for the OSV `/query` endpoint.
///
/// Every attempt is bounded by the configured timeout; transport errors,
/// 429 and 5xx responses are retried with exponential backoff.
pub struct OsvClient {
    client: reqwest::blocking::Client,
    settings: OsvClientSettings,
}

impl OsvClient {
    pub fn new(settings: OsvClientSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("reachscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, settings })
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.settings.endpoint.trim_end_matches('/'))
    }

    fn send_once(&self, request: &OsvQuery<'_>) -> Result<OsvResponse, QueryFailure> {
        let response = self
            .client
            .post(self.query_url())
            .json(request)
            .send()
            .map_err(|e| QueryFailure::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<OsvResponse>()
                .map_err(|e| QueryFailure::Fatal(format!("invalid response body: {e}")));
        }

        let message = format!("OSV API returned {status}");
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(QueryFailure::Retryable(message))
        } else {
            Err(QueryFailure::Fatal(message))
        }
    }

    fn send_with_retry(&self, request: &OsvQuery<'_>) -> Result<OsvResponse, String> {
        let mut delay = self.settings.backoff;
        let mut attempt = 0;

        loop {
            match self.send_once(request) {
                Ok(response) => return Ok(response),
                Err(QueryFailure::Retryable(message)) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        package = request.package.name,
                        attempt,
                        "advisory query failed ({}), retrying in {:?}",
                        message,
                        delay
                    );
                    std::thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(QueryFailure::Retryable(message)) | Err(QueryFailure::Fatal(message)) => {
                    return Err(message)
                }
            }
        }
    }
}

impl AdvisorySource for OsvClient {
    fn query(
        &self,
        package: &str,
        version: &str,
        ecosystem: Ecosystem,
    ) -> Result<Vec<Advisory>, AnalysisError> {
        debug!("Querying OSV for {}@{} ({})", package, version, ecosystem);

        let mut request = OsvQuery {
            package: OsvPackage {
                name: package,
                ecosystem: ecosystem.osv_name(),
            },
            version: Some(version).filter(|v| !v.is_empty()),
            page_token: None,
        };

        let mut advisories = Vec::new();
        for _ in 0..MAX_PAGES {
            let response =
                self.send_with_retry(&request)
                    .map_err(|message| AnalysisError::AdvisoryQueryError {
                        package: package.to_string(),
                        ecosystem: ecosystem.to_string(),
                        message,
                    })?;
            advisories.extend(response.vulns);

            match response.next_page_token {
                Some(token) if !token.is_empty() => request.page_token = Some(token),
                _ => break,
            }
        }

        Ok(advisories)
    }
}

/// Advisories held in memory, optionally loaded from an OSV JSON export.
///
/// Versions are not evaluated: every advisory naming the package is
/// returned, as for an unknown-version online query.
#[derive(Debug, Clone, Default)]
pub struct StaticAdvisorySource {
    advisories: Vec<Advisory>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AdvisoryFile {
    List(Vec<Advisory>),
    Wrapped { vulns: Vec<Advisory> },
    Single(Advisory),
}

impl StaticAdvisorySource {
    pub fn new(advisories: Vec<Advisory>) -> Self {
        Self { advisories }
    }

    /// Accepts a JSON array of advisories, an OSV `{"vulns": [...]}`
    /// response, or a single advisory object.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read advisories from {}", path.display()))?;
        let parsed: AdvisoryFile = serde_json::from_str(&data)
            .with_context(|| format!("invalid advisory JSON in {}", path.display()))?;

        let advisories = match parsed {
            AdvisoryFile::List(list) => list,
            AdvisoryFile::Wrapped { vulns } => vulns,
            AdvisoryFile::Single(advisory) => vec![advisory],
        };
        Ok(Self::new(advisories))
    }

    pub fn len(&self) -> usize {
        self.advisories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisories.is_empty()
    }
}

impl AdvisorySource for StaticAdvisorySource {
    fn query(
        &self,
        package: &str,
        _version: &str,
        ecosystem: Ecosystem,
    ) -> Result<Vec<Advisory>, AnalysisError> {
        Ok(self
            .advisories
            .iter()
            .filter(|advisory| advisory.affects(package, ecosystem))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisory(id: &str, package: &str, ecosystem: &str) -> Advisory {
        Advisory {
            id: id.to_string(),
            affected: vec![Affected {
                package: PackageInfo {
                    name: package.to_string(),
                    ecosystem: ecosystem.to_string(),
                },
                ecosystem_specific: EcosystemSpecific {
                    imports: vec![AffectedImport {
                        path: package.to_string(),
                        symbols: vec!["Parse".to_string(), "Tokenizer.Next".to_string()],
                    }],
                },
            }],
            ..Default::default()
        }
    }

    #[test]
    fn static_source_filters_by_package_and_ecosystem() {
        let source = StaticAdvisorySource::new(vec![
            advisory("GO-1", "golang.org/x/net", "Go"),
            advisory("GHSA-1", "lodash", "npm"),
        ]);

        let hits = source.query("golang.org/x/net", "", Ecosystem::Go).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "GO-1");

        assert!(source.query("lodash", "", Ecosystem::PyPI).unwrap().is_empty());
    }

    #[test]
    fn structured_symbols_are_flattened() {
        let adv = advisory("GO-1", "golang.org/x/net", "Go");
        let symbols: Vec<_> = adv.structured_symbols().collect();
        assert_eq!(symbols, vec!["Parse", "Tokenizer.Next"]);
    }

    #[test]
    fn osv_json_with_missing_fields_deserializes() {
        let json = r#"{"vulns":[{"id":"GHSA-x","summary":"s","affected":[{"package":{"name":"lodash","ecosystem":"npm"}}]}]}"#;
        let response: OsvResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.vulns.len(), 1);
        assert!(response.vulns[0].details.is_empty());
        assert!(response.next_page_token.is_none());
    }
}
