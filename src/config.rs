//! `reachscan.toml` loading.
//!
//! Every key is optional; command-line flags override whatever the file sets.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::advisory::{OsvClientSettings, DEFAULT_OSV_ENDPOINT};
use crate::parsers::Language;

pub const CONFIG_FILENAME: &str = "reachscan.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "languages",
    "exclude",
    "respect_gitignore",
    "legacy_fallback",
    "disk_cache",
    "advisories",
];
const KNOWN_ADVISORY_KEYS: &[&str] = &["endpoint", "timeout_secs", "max_retries", "backoff_ms"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
    #[error("Unknown language '{name}' (expected javascript, typescript, tsx, python or go)")]
    UnknownLanguage { name: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Empty means every supported language.
    pub languages: Vec<String>,
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
    pub legacy_fallback: bool,
    pub disk_cache: bool,
    pub advisories: AdvisoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            exclude: Vec::new(),
            respect_gitignore: true,
            legacy_fallback: false,
            disk_cache: false,
            advisories: AdvisoryConfig::default(),
        }
    }
}

impl Config {
    pub fn languages(&self) -> Result<Vec<Language>, ConfigError> {
        parse_languages(&self.languages)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OSV_ENDPOINT.to_string(),
            timeout_secs: 10,
            max_retries: 2,
            backoff_ms: 250,
        }
    }
}

impl AdvisoryConfig {
    pub fn client_settings(&self) -> OsvClientSettings {
        OsvClientSettings {
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Parses language names; an empty list selects every language.
pub fn parse_languages<S: AsRef<str>>(names: &[S]) -> Result<Vec<Language>, ConfigError> {
    let mut languages = Vec::new();
    for name in names.iter().map(AsRef::as_ref) {
        if name.trim().is_empty() {
            continue;
        }
        let language = Language::from_name(name).ok_or_else(|| ConfigError::UnknownLanguage {
            name: name.to_string(),
        })?;
        if !languages.contains(&language) {
            languages.push(language);
        }
    }

    if languages.is_empty() {
        return Ok(Language::ALL.to_vec());
    }
    // `.ts` and `.tsx` are one language as far as users are concerned
    if languages.contains(&Language::TypeScript) && !languages.contains(&Language::Tsx) {
        languages.push(Language::Tsx);
    }
    Ok(languages)
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    // A relative start such as "." cannot be popped past the working directory.
    let mut current = start_dir
        .canonicalize()
        .unwrap_or_else(|_| start_dir.to_path_buf());
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_config(path: &Path) -> Result<ConfigResult, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    let warnings = detect_unknown_keys(&content);

    Ok(ConfigResult { config, warnings })
}

/// Loads the nearest `reachscan.toml` at or above `start_dir`, or defaults.
pub fn load_config_or_default(start_dir: &Path) -> Result<ConfigResult, ConfigError> {
    match find_config_file(start_dir) {
        Some(path) => load_config(&path),
        None => Ok(ConfigResult::default()),
    }
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    if let Some(toml::Value::Table(advisories)) = table.get("advisories") {
        for key in advisories.keys() {
            if !KNOWN_ADVISORY_KEYS.contains(&key.as_str()) {
                warnings.push(format!("Unknown config option in [advisories]: '{}'", key));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
languages = ["python", "go"]
exclude = ["tests/fixtures/**"]
legacy_fallback = true

[advisories]
timeout_secs = 3
"#,
        )
        .unwrap();

        let result = load_config(&config_path).unwrap();
        let config = result.config;

        assert!(result.warnings.is_empty());
        assert_eq!(config.languages().unwrap(), vec![Language::Python, Language::Go]);
        assert_eq!(config.exclude, vec!["tests/fixtures/**"]);
        assert!(config.legacy_fallback);
        assert!(config.respect_gitignore);
        assert_eq!(config.advisories.timeout_secs, 3);
        assert_eq!(config.advisories.max_retries, 2);
        assert_eq!(config.advisories.endpoint, DEFAULT_OSV_ENDPOINT);
    }

    #[test]
    fn unknown_keys_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "colour = true\n[advisories]\nretries = 4\n").unwrap();

        let result = load_config(&config_path).unwrap();
        assert_eq!(result.config, Config::default());
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[1].contains("[advisories]"));
    }

    #[test]
    fn error_on_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "this is not valid { toml }").unwrap();

        match load_config(&config_path) {
            Err(ConfigError::ParseError { path, message }) => {
                assert_eq!(path, config_path);
                assert!(!message.is_empty());
            }
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn config_is_found_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("services").join("api");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "disk_cache = true\n").unwrap();

        let result = load_config_or_default(&nested).unwrap();
        assert!(result.config.disk_cache);
    }

    #[test]
    fn language_lists() {
        assert_eq!(parse_languages::<&str>(&[]).unwrap(), Language::ALL.to_vec());
        assert_eq!(
            parse_languages(&["ts"]).unwrap(),
            vec![Language::TypeScript, Language::Tsx]
        );
        assert!(matches!(
            parse_languages(&["cobol"]),
            Err(ConfigError::UnknownLanguage { .. })
        ));
    }
}
