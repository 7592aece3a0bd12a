pub mod cache;
pub mod common;
pub mod go;
pub mod javascript;
pub mod legacy;
pub mod python;
pub mod typescript;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use tree_sitter::Node as TSNode;

use crate::core::calls::dedup_calls;
use crate::core::imports::dedup_bindings;
use crate::core::{CallSite, Ecosystem, ImportBinding};
use crate::error::AnalysisError;
use common::{read_source, TreeSitterParser};

/// Source languages with a grammar-backed extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Go,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Tsx,
        Language::Python,
        Language::Go,
    ];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "py" | "pyi" => Some(Language::Python),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::from_extension(extension).ok_or_else(|| AnalysisError::UnsupportedLanguage {
            path: path.to_path_buf(),
            extension: extension.to_string(),
        })
    }

    /// Parses a user-facing language name (`--languages`, config file).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Some(Language::JavaScript),
            "typescript" | "ts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "python" | "py" => Some(Language::Python),
            "go" | "golang" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Python => "python",
            Language::Go => "go",
        }
    }

    pub fn ecosystem(self) -> Ecosystem {
        match self {
            Language::JavaScript | Language::TypeScript | Language::Tsx => Ecosystem::Npm,
            Language::Python => Ecosystem::PyPI,
            Language::Go => Ecosystem::Go,
        }
    }

    pub fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::JavaScript => tree_sitter_javascript::language(),
            Language::TypeScript => tree_sitter_typescript::language_typescript(),
            Language::Tsx => tree_sitter_typescript::language_tsx(),
            Language::Python => tree_sitter_python::language(),
            Language::Go => tree_sitter_go::language(),
        }
    }

    pub fn is_es_module(self) -> bool {
        self.ecosystem() == Ecosystem::Npm
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the matcher needs from one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub path: PathBuf,
    pub language: Language,
    pub imports: Vec<ImportBinding>,
    pub calls: Vec<CallSite>,
    /// Produced by the regex extractor after the grammar rejected the file.
    pub via_fallback: bool,
}

/// Per-language extraction over a parsed tree.
pub trait LanguageParser {
    fn extract_imports(&self, root: TSNode, source: &[u8], file_path: &Path) -> Vec<ImportBinding>;
    fn extract_calls(&self, root: TSNode, source: &[u8]) -> Vec<CallSite>;
    fn language(&self) -> Language;
}

pub struct ParserFactory;

impl ParserFactory {
    pub fn get_parser(language: Language) -> Box<dyn LanguageParser + Send + Sync> {
        match language {
            Language::JavaScript => Box::new(javascript::JavaScriptParser),
            Language::TypeScript | Language::Tsx => {
                Box::new(typescript::TypeScriptParser::new(language))
            }
            Language::Python => Box::new(python::PythonParser),
            Language::Go => Box::new(go::GoParser),
        }
    }
}

/// Parses `source` as `language` and extracts deduplicated imports and calls.
pub fn extract_source(
    file_path: &Path,
    language: Language,
    source: &str,
) -> Result<FileExtraction, AnalysisError> {
    let mut parser = TreeSitterParser::new(language)?;
    let tree = parser.parse_source(file_path, source)?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let extractor = ParserFactory::get_parser(language);
    let imports = dedup_bindings(extractor.extract_imports(root, bytes, file_path));
    let calls = dedup_calls(extractor.extract_calls(root, bytes));

    Ok(FileExtraction {
        path: file_path.to_path_buf(),
        language: extractor.language(),
        imports,
        calls,
        via_fallback: false,
    })
}

/// Reads and extracts one file. With `legacy_fallback`, ES-module files the
/// grammar rejects are retried with the regex extractor.
pub fn extract_file(file_path: &Path, legacy_fallback: bool) -> Result<FileExtraction, AnalysisError> {
    let language = Language::from_path(file_path)?;
    let source = read_source(file_path)?;

    match extract_source(file_path, language, &source) {
        Err(AnalysisError::ParseError { .. }) if legacy_fallback && language.is_es_module() => {
            debug!("Falling back to regex extraction for {}", file_path.display());
            Ok(legacy::extract(file_path, language, &source))
        }
        result => result,
    }
}
