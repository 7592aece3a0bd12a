use std::path::Path;
use tree_sitter::Node as TSNode;

use super::common::{
    extract_text, find_children_by_kind, render_callee, string_literal_value, walk_tree,
    CalleeShape,
};
use super::{Language, LanguageParser};
use crate::core::{CallSite, ImportBinding, ImportForm};

const GO_CALLEE: CalleeShape = CalleeShape {
    identifier_kind: "identifier",
    member_kind: "selector_expression",
    object_field: "operand",
    member_field: "field",
    wrapper_kinds: &["parenthesized_expression"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GoNode {
    ImportSpec,
    Call,
    Other,
}

impl GoNode {
    fn classify(kind: &str) -> Self {
        match kind {
            "import_spec" => GoNode::ImportSpec,
            "call_expression" => GoNode::Call,
            _ => GoNode::Other,
        }
    }
}

pub struct GoParser;

impl LanguageParser for GoParser {
    fn extract_imports(&self, root: TSNode, source: &[u8], file_path: &Path) -> Vec<ImportBinding> {
        let mut bindings = Vec::new();

        // import_spec only occurs inside import declarations, grouped or not
        for declaration in find_children_by_kind(root, "import_declaration") {
            walk_tree(declaration, |node| match GoNode::classify(node.kind()) {
                GoNode::ImportSpec => {
                    if let Some(binding) = process_import_spec(node, source, file_path) {
                        bindings.push(binding);
                    }
                }
                GoNode::Call | GoNode::Other => {}
            });
        }

        bindings
    }

    fn extract_calls(&self, root: TSNode, source: &[u8]) -> Vec<CallSite> {
        let mut calls = Vec::new();

        walk_tree(root, |node| match GoNode::classify(node.kind()) {
            GoNode::Call => {
                if let Some(call) = node
                    .child_by_field_name("function")
                    .and_then(|callee| render_callee(callee, source, &GO_CALLEE))
                {
                    calls.push(call);
                }
            }
            GoNode::ImportSpec | GoNode::Other => {}
        });

        calls
    }

    fn language(&self) -> Language {
        Language::Go
    }
}

fn process_import_spec(spec: TSNode, source: &[u8], file_path: &Path) -> Option<ImportBinding> {
    let path = spec.child_by_field_name("path")?;
    let path = string_literal_value(&path, source);
    if path.is_empty() {
        return None;
    }

    let Some(name) = spec.child_by_field_name("name") else {
        let aliases = default_package_names(&path);
        return Some(ImportBinding::new(
            path,
            aliases,
            ImportForm::GoImport,
            file_path,
        ));
    };

    let (aliases, form) = match name.kind() {
        "dot" => (Vec::new(), ImportForm::GoDot),
        "blank_identifier" => (Vec::new(), ImportForm::GoBlank),
        _ => (
            vec![extract_text(&name, source).to_string()],
            ImportForm::GoAliased,
        ),
    };
    Some(ImportBinding::new(path, aliases, form, file_path))
}

/// Identifiers an unaliased import is likely referenced by.
///
/// The package clause of the imported code is not available, so this
/// follows the usual conventions: the last path element, skipping a major
/// version suffix (`/v2`, `.v3`), with `go-` / `-go` affixes and hyphens
/// removed when they would not form an identifier.
pub fn default_package_names(import_path: &str) -> Vec<String> {
    let mut segments = import_path.rsplit('/');
    let mut base = segments.next().unwrap_or(import_path);
    if is_major_version(base) {
        if let Some(previous) = segments.next() {
            base = previous;
        }
    }
    if let Some((stem, suffix)) = base.rsplit_once('.') {
        if is_major_version(suffix) {
            base = stem;
        }
    }

    let mut candidates = vec![base.to_string()];
    let trimmed = base
        .strip_prefix("go-")
        .or_else(|| base.strip_suffix("-go"))
        .unwrap_or(base);
    candidates.push(trimmed.to_string());
    candidates.push(trimmed.replace(['-', '.'], ""));
    candidates.push(base.replace(['-', '.'], ""));

    let mut names: Vec<String> = Vec::new();
    for candidate in candidates {
        if is_identifier(&candidate) && !names.contains(&candidate) {
            names.push(candidate);
        }
    }
    if names.is_empty() {
        names.push(base.to_string());
    }
    names
}

fn is_major_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_follow_go_conventions() {
        assert_eq!(default_package_names("net/http"), vec!["http"]);
        assert_eq!(default_package_names("github.com/go-redis/redis/v8"), vec!["redis"]);
        assert_eq!(default_package_names("gopkg.in/yaml.v3"), vec!["yaml"]);
        assert_eq!(
            default_package_names("github.com/pelletier/go-toml"),
            vec!["toml", "gotoml"]
        );
        assert_eq!(
            default_package_names("github.com/olivere/elastic-go"),
            vec!["elastic", "elasticgo"]
        );
    }

    #[test]
    fn version_suffix_detection() {
        assert!(is_major_version("v2"));
        assert!(is_major_version("v10"));
        assert!(!is_major_version("v"));
        assert!(!is_major_version("vendor"));
    }
}
