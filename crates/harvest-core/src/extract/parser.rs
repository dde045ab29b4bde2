//! Java parsing into a tagged declaration tree.
//!
//! tree-sitter does the parsing; this module keeps only what method
//! extraction needs (names, spans, modifiers, parameters) and drops the
//! concrete syntax tree afterwards. Files whose tree contains error or
//! missing nodes are rejected whole.

use serde::Serialize;
use tree_sitter::{Node, Parser, Point};

use crate::errors::{HarvestError, HarvestResult};

/// Inclusive 1-based line range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn line_count(&self) -> usize {
        (self.end_line + 1).saturating_sub(self.start_line)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    Method,
    Constructor,
}

impl CallableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallableKind::Method => "method",
            CallableKind::Constructor => "constructor",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// Whitespace-normalized source text, e.g. `final List<String> names`.
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub modifiers: Vec<String>,
    /// Record components; empty for every other kind.
    pub params: Vec<Parameter>,
    pub span: Span,
    pub members: Vec<Declaration>,
}

#[derive(Clone, Debug)]
pub struct CallableDecl {
    pub name: String,
    pub modifiers: Vec<String>,
    pub type_parameters: Option<String>,
    /// `None` for constructors.
    pub return_type: Option<String>,
    pub params: Vec<Parameter>,
    pub span: Span,
    /// `None` for abstract, interface and native declarations.
    pub body: Option<Span>,
    /// The body holds a statement or declaration, not just comments.
    pub body_has_code: bool,
    pub well_formed: bool,
    /// Local and anonymous classes declared inside the body.
    pub nested: Vec<Declaration>,
}

impl CallableDecl {
    /// Header without annotations or body:
    /// `public static <T> List<T> copy(List<T> src, int n)`.
    pub fn signature(&self) -> String {
        let mut parts: Vec<&str> = self.modifiers.iter().map(String::as_str).collect();
        if let Some(tp) = &self.type_parameters {
            parts.push(tp);
        }
        if let Some(rt) = &self.return_type {
            parts.push(rt);
        }
        let params = self
            .params
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let head = parts.join(" ");
        if head.is_empty() {
            format!("{}({})", self.name, params)
        } else {
            format!("{} {}({})", head, self.name, params)
        }
    }
}

#[derive(Clone, Debug)]
pub enum Declaration {
    Type(TypeDecl),
    Method(CallableDecl),
    Constructor(CallableDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Type(t) => &t.name,
            Declaration::Method(c) | Declaration::Constructor(c) => &c.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Type(t) => t.span,
            Declaration::Method(c) | Declaration::Constructor(c) => c.span,
        }
    }

    pub fn modifiers(&self) -> &[String] {
        match self {
            Declaration::Type(t) => &t.modifiers,
            Declaration::Method(c) | Declaration::Constructor(c) => &c.modifiers,
        }
    }

    pub fn params(&self) -> &[Parameter] {
        match self {
            Declaration::Type(t) => &t.params,
            Declaration::Method(c) | Declaration::Constructor(c) => &c.params,
        }
    }

    pub fn children(&self) -> &[Declaration] {
        match self {
            Declaration::Type(t) => &t.members,
            Declaration::Method(c) | Declaration::Constructor(c) => &c.nested,
        }
    }

    pub fn as_callable(&self) -> Option<(CallableKind, &CallableDecl)> {
        match self {
            Declaration::Type(_) => None,
            Declaration::Method(c) => Some((CallableKind::Method, c)),
            Declaration::Constructor(c) => Some((CallableKind::Constructor, c)),
        }
    }
}

/// Declarations of one source file.
#[derive(Clone, Debug)]
pub struct ParsedUnit {
    pub path: String,
    pub declarations: Vec<Declaration>,
}

impl ParsedUnit {
    /// Methods and constructors in pre-order: a declaration precedes the
    /// callables nested inside it.
    pub fn callables(&self) -> Vec<(CallableKind, &CallableDecl)> {
        let mut out = Vec::new();
        let mut stack: Vec<&Declaration> = self.declarations.iter().rev().collect();
        while let Some(decl) = stack.pop() {
            if let Some(callable) = decl.as_callable() {
                out.push(callable);
            }
            stack.extend(decl.children().iter().rev());
        }
        out
    }
}

pub fn parse_java(source: &str, path: &str) -> HarvestResult<ParsedUnit> {
    let parse_error = |message: String| HarvestError::Parse {
        path: path.to_string(),
        message,
    };

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| parse_error(format!("failed to set language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| parse_error("parser returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
        return Err(parse_error(format!("syntax error near line {line}")));
    }

    Ok(ParsedUnit {
        path: path.to_string(),
        declarations: collect_declarations(root, source),
    })
}

fn first_error_line(root: Node) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Declarations below `node`, skipping through non-declaration nodes
/// (field initializers, statements, expressions) to reach anonymous and
/// local classes.
fn collect_declarations(node: Node, src: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut stack = named_children_rev(node);
    while let Some(child) = stack.pop() {
        match child.kind() {
            "class_declaration" => out.push(type_decl(child, TypeKind::Class, src)),
            "interface_declaration" => out.push(type_decl(child, TypeKind::Interface, src)),
            "enum_declaration" => out.push(type_decl(child, TypeKind::Enum, src)),
            "record_declaration" => out.push(type_decl(child, TypeKind::Record, src)),
            "annotation_type_declaration" => {
                out.push(type_decl(child, TypeKind::Annotation, src))
            }
            "method_declaration" => out.push(Declaration::Method(callable_decl(child, src))),
            "constructor_declaration" | "compact_constructor_declaration" => {
                out.push(Declaration::Constructor(callable_decl(child, src)))
            }
            _ => stack.extend(named_children_rev(child)),
        }
    }
    out
}

fn named_children_rev(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let mut children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.reverse();
    children
}

fn type_decl(node: Node, kind: TypeKind, src: &str) -> Declaration {
    let members = node
        .child_by_field_name("body")
        .map(|body| collect_declarations(body, src))
        .unwrap_or_default();
    Declaration::Type(TypeDecl {
        kind,
        name: field_text(node, "name", src).unwrap_or_default(),
        modifiers: modifiers(node, src),
        params: parameters(node, src),
        span: Span {
            start_line: line_of(declaration_start(node)),
            end_line: line_of(node.end_position()),
        },
        members,
    })
}

fn callable_decl(node: Node, src: &str) -> CallableDecl {
    let body_node = node.child_by_field_name("body");
    let return_type = field_text(node, "type", src).map(|rt| {
        match field_text(node, "dimensions", src) {
            Some(dims) => format!("{rt}{dims}"),
            None => rt,
        }
    });
    CallableDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        modifiers: modifiers(node, src),
        type_parameters: field_text(node, "type_parameters", src),
        return_type,
        params: parameters(node, src),
        span: Span {
            start_line: line_of(declaration_start(node)),
            end_line: line_of(node.end_position()),
        },
        body: body_node.map(|b| Span {
            start_line: line_of(b.start_position()),
            end_line: line_of(b.end_position()),
        }),
        body_has_code: body_node.is_some_and(block_has_code),
        well_formed: !node.has_error(),
        nested: body_node
            .map(|b| collect_declarations(b, src))
            .unwrap_or_default(),
    }
}

/// Bare `;` statements are anonymous nodes, so they do not count.
fn block_has_code(block: Node) -> bool {
    let mut cursor = block.walk();
    let found = block
        .named_children(&mut cursor)
        .any(|child| !matches!(child.kind(), "line_comment" | "block_comment"));
    found
}

fn is_annotation_or_comment(kind: &str) -> bool {
    matches!(
        kind,
        "annotation" | "marker_annotation" | "line_comment" | "block_comment"
    )
}

/// Position of the first token that is neither an annotation nor a comment.
fn declaration_start(node: Node) -> Point {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifiers" {
            let mut inner = child.walk();
            let keyword = child
                .children(&mut inner)
                .find(|m| !is_annotation_or_comment(m.kind()));
            if let Some(keyword) = keyword {
                return keyword.start_position();
            }
        } else if !is_annotation_or_comment(child.kind()) {
            return child.start_position();
        }
    }
    node.start_position()
}

fn modifiers(node: Node, src: &str) -> Vec<String> {
    let mut cursor = node.walk();
    let Some(mods) = node.children(&mut cursor).find(|c| c.kind() == "modifiers") else {
        return Vec::new();
    };
    let mut inner = mods.walk();
    let keywords = mods
        .children(&mut inner)
        .filter(|m| !is_annotation_or_comment(m.kind()))
        .map(|m| text(m, src).to_string())
        .collect();
    keywords
}

fn parameters(node: Node, src: &str) -> Vec<Parameter> {
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    let params = list
        .named_children(&mut cursor)
        .filter_map(|p| {
            let name = match p.kind() {
                "formal_parameter" => field_text(p, "name", src)?,
                "spread_parameter" => {
                    let mut inner = p.walk();
                    let declarator = p
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "variable_declarator")?;
                    field_text(declarator, "name", src)?
                }
                "receiver_parameter" => "this".to_string(),
                _ => return None,
            };
            Some(Parameter {
                name,
                text: normalize_whitespace(text(p, src)),
            })
        })
        .collect();
    params
}

fn field_text(node: Node, field: &str, src: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| normalize_whitespace(text(n, src)))
        .filter(|t| !t.is_empty())
}

fn text<'s>(node: Node, src: &'s str) -> &'s str {
    src.get(node.byte_range()).unwrap_or("")
}

fn line_of(point: Point) -> usize {
    point.row + 1
}

pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
