use std::path::PathBuf;

/// Failures raised while analysing a single file or dependency.
///
/// None of these abort a scan: the analyzer logs them and moves on to the
/// next (file, dependency) pair. Only file discovery failing is fatal, and
/// that surfaces as an `anyhow::Error` from the analyzer itself.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("unsupported language for '{path}' (extension: {extension:?})")]
    UnsupportedLanguage { path: PathBuf, extension: String },

    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{language} grammar rejected '{path}'")]
    ParseError { path: PathBuf, language: String },

    #[error("failed to load {language} grammar: {message}")]
    GrammarError { language: String, message: String },

    #[error("advisory query for {package} ({ecosystem}) failed: {message}")]
    AdvisoryQueryError {
        package: String,
        ecosystem: String,
        message: String,
    },
}

impl AnalysisError {
    /// Whether the error concerns a single file (and therefore only that
    /// file is skipped).
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            AnalysisError::UnsupportedLanguage { .. }
                | AnalysisError::ReadError { .. }
                | AnalysisError::ParseError { .. }
        )
    }
}
