use std::path::Path;
use tree_sitter::Node as TSNode;

use super::javascript::{extract_es_calls, extract_es_imports};
use super::{Language, LanguageParser};
use crate::core::{CallSite, ImportBinding};

/// TypeScript and TSX share the ES-module rules; the TypeScript grammar adds
/// `import x = require("p")`, which the shared extractor handles.
pub struct TypeScriptParser {
    language: Language,
}

impl TypeScriptParser {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl LanguageParser for TypeScriptParser {
    fn extract_imports(&self, root: TSNode, source: &[u8], file_path: &Path) -> Vec<ImportBinding> {
        extract_es_imports(root, source, file_path)
    }

    fn extract_calls(&self, root: TSNode, source: &[u8]) -> Vec<CallSite> {
        extract_es_calls(root, source)
    }

    fn language(&self) -> Language {
        self.language
    }
}
