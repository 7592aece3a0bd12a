use std::path::Path;
use tree_sitter::Node as TSNode;

use super::common::{extract_text, find_child_by_kind, render_callee, walk_tree, CalleeShape};
use super::{Language, LanguageParser};
use crate::core::{CallSite, ImportBinding, ImportForm};

const PY_CALLEE: CalleeShape = CalleeShape {
    identifier_kind: "identifier",
    member_kind: "attribute",
    object_field: "object",
    member_field: "attribute",
    wrapper_kinds: &["await", "parenthesized_expression"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PyNode {
    Import,
    ImportFrom,
    Call,
    Other,
}

impl PyNode {
    fn classify(kind: &str) -> Self {
        match kind {
            "import_statement" => PyNode::Import,
            "import_from_statement" => PyNode::ImportFrom,
            "call" => PyNode::Call,
            _ => PyNode::Other,
        }
    }
}

pub struct PythonParser;

impl LanguageParser for PythonParser {
    fn extract_imports(&self, root: TSNode, source: &[u8], file_path: &Path) -> Vec<ImportBinding> {
        let mut bindings = Vec::new();

        walk_tree(root, |node| match PyNode::classify(node.kind()) {
            PyNode::Import => process_import(node, source, file_path, &mut bindings),
            PyNode::ImportFrom => process_import_from(node, source, file_path, &mut bindings),
            PyNode::Call | PyNode::Other => {}
        });

        bindings
    }

    fn extract_calls(&self, root: TSNode, source: &[u8]) -> Vec<CallSite> {
        let mut calls = Vec::new();

        walk_tree(root, |node| match PyNode::classify(node.kind()) {
            PyNode::Call => {
                if let Some(call) = node
                    .child_by_field_name("function")
                    .and_then(|callee| render_callee(callee, source, &PY_CALLEE))
                {
                    calls.push(call);
                }
            }
            PyNode::Import | PyNode::ImportFrom | PyNode::Other => {}
        });

        calls
    }

    fn language(&self) -> Language {
        Language::Python
    }
}

fn field_children<'t>(node: TSNode<'t>, field: &str) -> Vec<TSNode<'t>> {
    let mut cursor = node.walk();
    let children = node.children_by_field_name(field, &mut cursor).collect();
    children
}

/// `import a.b.c` binds both the dotted path and its head, since calls
/// render as `a.member`. `import a.b.c as x` binds only `x`.
fn process_import(
    import_node: TSNode,
    source: &[u8],
    file_path: &Path,
    bindings: &mut Vec<ImportBinding>,
) {
    for name in field_children(import_node, "name") {
        match name.kind() {
            "dotted_name" => {
                let module = extract_text(&name, source);
                let mut aliases = vec![module.to_string()];
                if let Some((head, _)) = module.split_once('.') {
                    aliases.push(head.to_string());
                }
                bindings.push(ImportBinding::new(
                    module,
                    aliases,
                    ImportForm::PyImport,
                    file_path,
                ));
            }
            "aliased_import" => {
                let module = name.child_by_field_name("name");
                let alias = name.child_by_field_name("alias");
                if let (Some(module), Some(alias)) = (module, alias) {
                    bindings.push(ImportBinding::new(
                        extract_text(&module, source),
                        vec![extract_text(&alias, source).to_string()],
                        ImportForm::PyImportAs,
                        file_path,
                    ));
                }
            }
            _ => {}
        }
    }
}

fn process_import_from(
    import_node: TSNode,
    source: &[u8],
    file_path: &Path,
    bindings: &mut Vec<ImportBinding>,
) {
    let Some(module) = import_node.child_by_field_name("module_name") else {
        return;
    };
    let module = extract_text(&module, source);

    if find_child_by_kind(import_node, "wildcard_import").is_some() {
        bindings.push(ImportBinding::new(
            module,
            Vec::new(),
            ImportForm::PyWildcard,
            file_path,
        ));
        return;
    }

    let mut plain = Vec::new();
    for name in field_children(import_node, "name") {
        match name.kind() {
            "dotted_name" => plain.push(extract_text(&name, source).to_string()),
            "aliased_import" => {
                if let Some(alias) = name.child_by_field_name("alias") {
                    bindings.push(ImportBinding::new(
                        module,
                        vec![extract_text(&alias, source).to_string()],
                        ImportForm::PyFromImportAs,
                        file_path,
                    ));
                }
            }
            _ => {}
        }
    }

    if !plain.is_empty() {
        bindings.push(ImportBinding::new(
            module,
            plain,
            ImportForm::PyFromImport,
            file_path,
        ));
    }
}
