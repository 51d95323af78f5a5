//! Walker for C and C++ sources; the variant is chosen by extension and
//! only selects the grammar, the walk is shared.

use crate::indexer::extract::{EdgeInput, LanguageParser, ParsedFile, SymbolInput};
use crate::model::{EdgeType, Location, SymbolKind};
use tree_sitter::{Node, Parser};

pub struct CParser {
    parser: Parser,
}

impl CParser {
    pub fn new(cpp: bool) -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        if cpp {
            parser.set_language(&tree_sitter_cpp::LANGUAGE.into())?;
        } else {
            parser.set_language(&tree_sitter_c::LANGUAGE.into())?;
        }
        Ok(Self { parser })
    }
}

impl LanguageParser for CParser {
    fn parse_file(&mut self, source: &str) -> ParsedFile {
        let mut output = ParsedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return output;
        };
        let ctx = Context {
            container: None,
            owner: None,
            in_class: false,
            fn_depth: 0,
        };
        walk_node(tree.root_node(), &ctx, source, &mut output);
        output
    }
}

#[derive(Clone)]
struct Context {
    container: Option<String>,
    owner: Option<String>,
    in_class: bool,
    fn_depth: usize,
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    match node.kind() {
        "preproc_include" => {
            handle_include(node, source, output);
            return;
        }
        "preproc_def" | "preproc_function_def" => {
            handle_define(node, ctx, source, output);
            return;
        }
        "namespace_definition" => {
            handle_namespace(node, ctx, source, output);
            return;
        }
        "class_specifier" => {
            handle_record(node, ctx, source, output, SymbolKind::Class, "class");
            return;
        }
        "struct_specifier" => {
            handle_record(node, ctx, source, output, SymbolKind::Interface, "struct");
            return;
        }
        "union_specifier" => {
            handle_record(node, ctx, source, output, SymbolKind::Type, "union");
            return;
        }
        "enum_specifier" => {
            handle_enum(node, ctx, source, output);
            return;
        }
        "function_definition" => {
            handle_function(node, ctx, source, output, true);
            return;
        }
        "declaration" => {
            handle_declaration(node, ctx, source, output);
            return;
        }
        "field_declaration" => {
            handle_field(node, ctx, source, output);
            return;
        }
        "call_expression" => {
            handle_call(node, ctx, source, output);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, output);
    }
}

fn handle_include(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let Some(path) = node.child_by_field_name("path") else {
        return;
    };
    let header = node_text(path, source)
        .trim_matches(|ch| ch == '"' || ch == '<' || ch == '>')
        .to_string();
    output.edges.push(EdgeInput {
        edge_type: EdgeType::Imports,
        from: None,
        to: header,
        location: Some(span(node)),
    });
}

fn handle_define(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Constant,
        name: name.clone(),
        location: span(node),
        signature: Some(first_line(&node_text(node, source))),
        docstring: comment_above(node, source),
        parent: ctx.container.clone(),
        exported: true,
    });
}

fn handle_namespace(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        // Anonymous namespace: walk the body in the current context.
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                walk_node(child, ctx, source, output);
            }
        }
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Namespace,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("namespace {name}")),
        docstring: comment_above(node, source),
        parent: ctx.container.clone(),
        exported: true,
    });
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name);
    next_ctx.in_class = false;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
    }
}

fn handle_record(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    output: &mut ParsedFile,
    kind: SymbolKind,
    keyword: &str,
) {
    let Some(name) = field_text(node, "name", source) else {
        // Anonymous record in a typedef or field; nothing to name.
        return;
    };
    // A specifier without a body is a reference to the type, not its
    // definition.
    if node.child_by_field_name("body").is_none() {
        return;
    }
    let bases = base_class_names(node, source);
    let mut signature = format!("{keyword} {name}");
    if !bases.is_empty() {
        signature.push_str(&format!(" extends {}", bases.join(", ")));
    }
    output.symbols.push(SymbolInput {
        kind,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: comment_above(node, source),
        parent: ctx.container.clone(),
        exported: true,
    });
    for base in &bases {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Extends,
            from: Some(name.clone()),
            to: base.clone(),
            location: Some(span(node)),
        });
    }
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name.clone());
    next_ctx.owner = Some(name);
    next_ctx.in_class = true;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
    }
}

fn handle_enum(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    if node.child_by_field_name("body").is_none() {
        return;
    }
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Enum,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("enum {name}")),
        docstring: comment_above(node, source),
        parent: ctx.container.clone(),
        exported: true,
    });
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if child.kind() == "enumerator" {
                if let Some(member) = field_text(child, "name", source) {
                    output.symbols.push(SymbolInput {
                        kind: SymbolKind::Constant,
                        name: member.clone(),
                        location: span(child),
                        signature: Some(format!("{name}::{member}")),
                        docstring: None,
                        parent: Some(name.clone()),
                        exported: false,
                    });
                }
            }
        }
    }
}

fn handle_function(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    output: &mut ParsedFile,
    has_body: bool,
) {
    let Some(declarator) = node.child_by_field_name("declarator") else {
        return;
    };
    let Some((name, params)) = function_declarator_parts(declarator, source) else {
        return;
    };
    let kind = if ctx.in_class {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    let return_type = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    output.symbols.push(SymbolInput {
        kind,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("{return_type} {name}{params}").trim().to_string()),
        docstring: comment_above(node, source),
        parent: ctx.container.clone(),
        exported: true,
    });
    if has_body {
        let mut next_ctx = ctx.clone();
        next_ctx.owner = Some(name);
        next_ctx.fn_depth += 1;
        if let Some(body) = node.child_by_field_name("body") {
            walk_node(body, &next_ctx, source, output);
        }
    }
}

/// A declaration whose declarator is a function declarator is a prototype.
/// Bare record and enum definitions also arrive wrapped in a declaration
/// node, so non-function declarations descend into their children.
fn handle_declaration(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let is_prototype = node
        .child_by_field_name("declarator")
        .map(contains_function_declarator)
        .unwrap_or(false);
    if is_prototype {
        handle_function(node, ctx, source, output, false);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, output);
    }
}

fn handle_field(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    if !ctx.in_class {
        return;
    }
    let Some(declarator) = node.child_by_field_name("declarator") else {
        return;
    };
    // Method prototypes inside the class body.
    if contains_function_declarator(declarator) {
        if let Some((name, params)) = function_declarator_parts(declarator, source) {
            output.symbols.push(SymbolInput {
                kind: SymbolKind::Method,
                name: name.clone(),
                location: span(node),
                signature: Some(format!("{name}{params}")),
                docstring: comment_above(node, source),
                parent: ctx.container.clone(),
                exported: true,
            });
        }
        return;
    }
    let Some(name) = declarator_identifier(declarator, source) else {
        return;
    };
    let type_text = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Property,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("{type_text} {name}").trim().to_string()),
        docstring: None,
        parent: ctx.container.clone(),
        exported: true,
    });
}

fn handle_call(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(owner) = &ctx.owner else {
        return;
    };
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let callee = match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "field_expression" => function
            .child_by_field_name("field")
            .map(|f| node_text(f, source)),
        "qualified_identifier" => function
            .child_by_field_name("name")
            .map(|n| node_text(n, source)),
        _ => None,
    };
    if let Some(callee) = callee {
        if callee != *owner {
            output.edges.push(EdgeInput {
                edge_type: EdgeType::Calls,
                from: Some(owner.clone()),
                to: callee,
                location: Some(span(node)),
            });
        }
    }
}

fn base_class_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "base_class_clause" {
            let mut inner = child.walk();
            for base in child.named_children(&mut inner) {
                if matches!(base.kind(), "type_identifier" | "qualified_identifier") {
                    names.push(node_text(base, source));
                }
            }
        }
    }
    names
}

fn contains_function_declarator(node: Node<'_>) -> bool {
    if node.kind() == "function_declarator" {
        return true;
    }
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "function_declarator" {
            return true;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    false
}

fn function_declarator_parts(node: Node<'_>, source: &str) -> Option<(String, String)> {
    let mut current = node;
    loop {
        match current.kind() {
            "function_declarator" => {
                let name = current
                    .child_by_field_name("declarator")
                    .and_then(|d| declarator_identifier(d, source))?;
                let params = current
                    .child_by_field_name("parameters")
                    .map(|p| node_text(p, source))
                    .unwrap_or_else(|| "()".to_string());
                return Some((name, params));
            }
            "pointer_declarator" | "reference_declarator" => {
                current = current.child_by_field_name("declarator").or_else(|| {
                    let mut cursor = current.walk();
                    current.named_children(&mut cursor).last()
                })?;
            }
            _ => {
                let mut cursor = current.walk();
                let next = current
                    .named_children(&mut cursor)
                    .find(|c| contains_function_declarator(*c))?;
                current = next;
            }
        }
    }
}

fn declarator_identifier(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "destructor_name" => {
            Some(node_text(node, source))
        }
        "qualified_identifier" => node
            .child_by_field_name("name")
            .and_then(|n| declarator_identifier(n, source)),
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if let Some(name) = declarator_identifier(child, source) {
                    return Some(name);
                }
            }
            None
        }
    }
}

/// Block or line comment immediately above the declaration.
fn comment_above(node: Node<'_>, source: &str) -> Option<String> {
    let prev = node.prev_sibling()?;
    if prev.kind() != "comment" || prev.end_position().row + 1 < node.start_position().row {
        return None;
    }
    let raw = node_text(prev, source);
    if raw.starts_with("/*") {
        return Some(crate::indexer::typescript::clean_block_comment(&raw));
    }
    if raw.starts_with("//") {
        let mut lines = vec![raw.trim_start_matches('/').trim().to_string()];
        let mut current = prev;
        let mut expected_row = prev.start_position().row;
        while let Some(before) = current.prev_sibling() {
            if before.kind() != "comment" || before.end_position().row + 1 != expected_row {
                break;
            }
            let text = node_text(before, source);
            if !text.starts_with("//") {
                break;
            }
            lines.push(text.trim_start_matches('/').trim().to_string());
            expected_row = before.start_position().row;
            current = before;
        }
        lines.reverse();
        return Some(lines.join("\n"));
    }
    None
}

fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    let text = node_text(child, source);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or_default()
        .to_string()
}

fn span(node: Node<'_>) -> Location {
    Location::new(
        node.start_position().row as i64 + 1,
        node.start_position().column as i64,
        node.end_position().row as i64 + 1,
        node.end_position().column as i64,
    )
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}
