use std::path::Path;
use tree_sitter::Node as TSNode;

use super::common::{
    extract_text, find_child_by_kind, find_children_by_kind, named_children, render_callee,
    string_literal_value, walk_tree, CalleeShape,
};
use super::{Language, LanguageParser};
use crate::core::{CallSite, ImportBinding, ImportForm};

pub(crate) const ES_CALLEE: CalleeShape = CalleeShape {
    identifier_kind: "identifier",
    member_kind: "member_expression",
    object_field: "object",
    member_field: "property",
    wrapper_kinds: &["await_expression", "non_null_expression", "parenthesized_expression"],
};

/// Node kinds the ES-module extractors act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EsNode {
    ImportStatement,
    VariableDeclarator,
    CallExpression,
    Other,
}

impl EsNode {
    pub(crate) fn classify(kind: &str) -> Self {
        match kind {
            "import_statement" => EsNode::ImportStatement,
            "variable_declarator" => EsNode::VariableDeclarator,
            "call_expression" => EsNode::CallExpression,
            _ => EsNode::Other,
        }
    }
}

pub struct JavaScriptParser;

impl LanguageParser for JavaScriptParser {
    fn extract_imports(&self, root: TSNode, source: &[u8], file_path: &Path) -> Vec<ImportBinding> {
        extract_es_imports(root, source, file_path)
    }

    fn extract_calls(&self, root: TSNode, source: &[u8]) -> Vec<CallSite> {
        extract_es_calls(root, source)
    }

    fn language(&self) -> Language {
        Language::JavaScript
    }
}

/// Import bindings shared by JavaScript and TypeScript: ES `import`
/// statements anywhere in the tree and `require()` calls bound by a
/// variable declarator.
pub(crate) fn extract_es_imports(
    root: TSNode,
    source: &[u8],
    file_path: &Path,
) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();

    walk_tree(root, |node| match EsNode::classify(node.kind()) {
        EsNode::ImportStatement => process_import(node, source, file_path, &mut bindings),
        EsNode::VariableDeclarator => process_require(node, source, file_path, &mut bindings),
        EsNode::CallExpression | EsNode::Other => {}
    });

    bindings
}

pub(crate) fn extract_es_calls(root: TSNode, source: &[u8]) -> Vec<CallSite> {
    let mut calls = Vec::new();

    walk_tree(root, |node| match EsNode::classify(node.kind()) {
        EsNode::CallExpression => {
            if let Some(call) = node
                .child_by_field_name("function")
                .and_then(|callee| render_callee(callee, source, &ES_CALLEE))
            {
                calls.push(call);
            }
        }
        EsNode::ImportStatement | EsNode::VariableDeclarator | EsNode::Other => {}
    });

    calls
}

fn process_import(
    import_node: TSNode,
    source: &[u8],
    file_path: &Path,
    bindings: &mut Vec<ImportBinding>,
) {
    // TypeScript's `import x = require("p")` carries no `source` field
    if let Some(clause) = find_child_by_kind(import_node, "import_require_clause") {
        let alias = find_child_by_kind(clause, "identifier");
        let module = find_child_by_kind(clause, "string");
        if let (Some(alias), Some(module)) = (alias, module) {
            bindings.push(ImportBinding::new(
                string_literal_value(&module, source),
                vec![extract_text(&alias, source).to_string()],
                ImportForm::TsImportRequire,
                file_path,
            ));
        }
        return;
    }

    let Some(module) = import_node.child_by_field_name("source") else {
        return;
    };
    let package = string_literal_value(&module, source);

    let Some(clause) = find_child_by_kind(import_node, "import_clause") else {
        bindings.push(ImportBinding::new(
            package,
            Vec::new(),
            ImportForm::EsSideEffect,
            file_path,
        ));
        return;
    };

    for part in named_children(clause) {
        match part.kind() {
            "identifier" => bindings.push(ImportBinding::new(
                package.clone(),
                vec![extract_text(&part, source).to_string()],
                ImportForm::EsDefault,
                file_path,
            )),
            "namespace_import" => {
                if let Some(alias) = find_child_by_kind(part, "identifier") {
                    bindings.push(ImportBinding::new(
                        package.clone(),
                        vec![extract_text(&alias, source).to_string()],
                        ImportForm::EsNamespace,
                        file_path,
                    ));
                }
            }
            "named_imports" => {
                let aliases: Vec<String> = find_children_by_kind(part, "import_specifier")
                    .into_iter()
                    .filter_map(|specifier| {
                        specifier
                            .child_by_field_name("alias")
                            .or_else(|| specifier.child_by_field_name("name"))
                    })
                    .map(|local| extract_text(&local, source).to_string())
                    .collect();
                if !aliases.is_empty() {
                    bindings.push(ImportBinding::new(
                        package.clone(),
                        aliases,
                        ImportForm::EsNamed,
                        file_path,
                    ));
                }
            }
            _ => {}
        }
    }
}

fn process_require(
    declarator: TSNode,
    source: &[u8],
    file_path: &Path,
    bindings: &mut Vec<ImportBinding>,
) {
    let (Some(name), Some(value)) = (
        declarator.child_by_field_name("name"),
        declarator.child_by_field_name("value"),
    ) else {
        return;
    };

    // `const merge = require("lodash").merge` binds a single export
    if value.kind() == "member_expression" {
        let required = value
            .child_by_field_name("object")
            .and_then(|object| required_module(object, source));
        if let (Some(package), "identifier") = (required, name.kind()) {
            bindings.push(ImportBinding::new(
                package,
                vec![extract_text(&name, source).to_string()],
                ImportForm::RequireDestructured,
                file_path,
            ));
        }
        return;
    }

    let Some(package) = required_module(value, source) else {
        return;
    };

    match name.kind() {
        "identifier" => bindings.push(ImportBinding::new(
            package,
            vec![extract_text(&name, source).to_string()],
            ImportForm::RequireBinding,
            file_path,
        )),
        "object_pattern" => {
            let aliases = destructured_names(name, source);
            if !aliases.is_empty() {
                bindings.push(ImportBinding::new(
                    package,
                    aliases,
                    ImportForm::RequireDestructured,
                    file_path,
                ));
            }
        }
        _ => {}
    }
}

/// Module name of a `require("p")` call with a literal argument.
fn required_module(call: TSNode, source: &[u8]) -> Option<String> {
    if call.kind() != "call_expression" {
        return None;
    }
    let function = call.child_by_field_name("function")?;
    if function.kind() != "identifier" || extract_text(&function, source) != "require" {
        return None;
    }
    let arguments = call.child_by_field_name("arguments")?;
    let module = named_children(arguments).into_iter().next()?;
    matches!(module.kind(), "string" | "template_string")
        .then(|| string_literal_value(&module, source))
        .filter(|name| !name.is_empty())
}

/// Local names introduced by `{ a, b: c, d = 1 }`.
fn destructured_names(pattern: TSNode, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();

    for property in named_children(pattern) {
        let local = match property.kind() {
            "shorthand_property_identifier_pattern" | "shorthand_property_identifier" => {
                Some(property)
            }
            "pair_pattern" | "pair" => property
                .child_by_field_name("value")
                .filter(|value| value.kind() == "identifier"),
            "object_assignment_pattern" => property.child_by_field_name("left"),
            _ => None,
        };
        if let Some(local) = local {
            names.push(extract_text(&local, source).to_string());
        }
    }

    names
}
