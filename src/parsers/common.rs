use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tree_sitter::{Node as TSNode, Parser, Tree};

use super::Language;
use crate::core::CallSite;
use crate::error::AnalysisError;

/// A tree-sitter parser bound to one grammar.
///
/// Each extraction owns its parser, source buffer and tree; all three are
/// dropped when the extraction returns, whichever way it exits.
pub struct TreeSitterParser {
    parser: Parser,
    language: Language,
}

impl TreeSitterParser {
    pub fn new(language: Language) -> Result<Self, AnalysisError> {
        let mut parser = Parser::new();
        parser
            .set_language(language.grammar())
            .map_err(|e| AnalysisError::GrammarError {
                language: language.as_str().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { parser, language })
    }

    /// Parses `source`, rejecting content the grammar could not make sense of.
    pub fn parse_source(&mut self, file_path: &Path, source: &str) -> Result<Tree, AnalysisError> {
        let parse_error = || AnalysisError::ParseError {
            path: file_path.to_path_buf(),
            language: self.language.as_str().to_string(),
        };

        let tree = self.parser.parse(source, None).ok_or_else(parse_error)?;
        if tree.root_node().has_error() {
            return Err(parse_error());
        }
        Ok(tree)
    }
}

/// Buffered read sized to the file, as source files are read whole.
pub fn read_source(file_path: &Path) -> Result<String, AnalysisError> {
    let read_error = |source| AnalysisError::ReadError {
        path: file_path.to_path_buf(),
        source,
    };

    let file = File::open(file_path).map_err(read_error)?;
    let file_size = file.metadata().map_err(read_error)?.len() as usize;

    let mut reader = BufReader::with_capacity(file_size.clamp(1, 8192), file);
    let mut content = String::with_capacity(file_size);
    reader.read_to_string(&mut content).map_err(read_error)?;
    Ok(content)
}

pub fn extract_text<'a>(node: &TSNode, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.byte_range()]).unwrap_or("")
}

/// Text of a string literal node without its surrounding quotes.
pub fn string_literal_value(node: &TSNode, source: &[u8]) -> String {
    let text = extract_text(node, source);
    let trimmed = text
        .strip_prefix(['"', '\'', '`'])
        .and_then(|rest| rest.strip_suffix(['"', '\'', '`']));
    trimmed.unwrap_or(text).to_string()
}

pub fn find_child_by_kind<'t>(node: TSNode<'t>, kind: &str) -> Option<TSNode<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

pub fn find_children_by_kind<'t>(node: TSNode<'t>, kind: &str) -> Vec<TSNode<'t>> {
    let mut cursor = node.walk();
    let children = node
        .children(&mut cursor)
        .filter(|child| child.kind() == kind)
        .collect();
    children
}

pub fn named_children<'t>(node: TSNode<'t>) -> Vec<TSNode<'t>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// Pre-order walk over every node. Iterative, so deeply nested files
/// cannot overflow the stack.
pub fn walk_tree<'t>(root: TSNode<'t>, mut visit: impl FnMut(TSNode<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// How a grammar spells member access in callee position.
pub struct CalleeShape {
    pub identifier_kind: &'static str,
    pub member_kind: &'static str,
    pub object_field: &'static str,
    pub member_field: &'static str,
    /// Single-operand wrappers (`await`, parentheses, `!`) that are looked
    /// through before the callee or an object is classified.
    pub wrapper_kinds: &'static [&'static str],
}

fn unwrap_callee<'a>(mut node: TSNode<'a>, shape: &CalleeShape) -> Option<TSNode<'a>> {
    while shape.wrapper_kinds.contains(&node.kind()) {
        node = node.named_child(0)?;
    }
    Some(node)
}

/// Renders the callee of a call node as a [`CallSite`]: `name` for a bare
/// identifier, `object.member` for member access whose chain bottoms out in
/// an identifier. Anything else (calls on call results, subscripts, `this`)
/// has no canonical form and yields `None`.
pub fn render_callee(callee: TSNode, source: &[u8], shape: &CalleeShape) -> Option<CallSite> {
    let line = callee.start_position().row + 1;
    let callee = unwrap_callee(callee, shape)?;

    if callee.kind() == shape.identifier_kind {
        let name = extract_text(&callee, source);
        return (!name.is_empty()).then(|| CallSite::bare(name, line));
    }

    if callee.kind() != shape.member_kind {
        return None;
    }

    let member = callee.child_by_field_name(shape.member_field)?;
    let member = extract_text(&member, source);

    let mut object = unwrap_callee(callee.child_by_field_name(shape.object_field)?, shape)?;
    while object.kind() == shape.member_kind {
        object = unwrap_callee(object.child_by_field_name(shape.object_field)?, shape)?;
    }
    if object.kind() != shape.identifier_kind {
        return None;
    }

    let object = extract_text(&object, source);
    if object.is_empty() || member.is_empty() {
        return None;
    }
    Some(CallSite::qualified(object, member, line))
}
