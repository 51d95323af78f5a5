use crate::indexer::extract::{EdgeInput, LanguageParser, ParsedFile, SymbolInput};
use crate::model::{EdgeType, Location, SymbolKind};
use tree_sitter::{Node, Parser};

pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl LanguageParser for GoParser {
    fn parse_file(&mut self, source: &str) -> ParsedFile {
        let mut output = ParsedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return output;
        };
        let ctx = Context {
            container: None,
            owner: None,
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
    fn_depth: usize,
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    match node.kind() {
        "package_clause" => {
            handle_package(node, source, output);
            return;
        }
        "import_declaration" => {
            handle_import(node, source, output);
            return;
        }
        "function_declaration" => {
            handle_function(node, ctx, source, output);
            return;
        }
        "method_declaration" => {
            handle_method(node, ctx, source, output);
            return;
        }
        "type_declaration" => {
            handle_type_declaration(node, ctx, source, output);
            return;
        }
        "var_declaration" | "const_declaration" => {
            handle_var_declaration(node, ctx, source, output);
            return;
        }
        "short_var_declaration" => {
            handle_short_var(node, ctx, source, output);
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

fn handle_package(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let Some(name_node) = node.named_child(0) else {
        return;
    };
    let name = node_text(name_node, source);
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Module,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("package {name}")),
        docstring: godoc_above(node, source),
        parent: None,
        exported: true,
    });
}

fn handle_import(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "import_spec" {
            if let Some(path) = current.child_by_field_name("path") {
                output.edges.push(EdgeInput {
                    edge_type: EdgeType::Imports,
                    from: None,
                    to: strip_quotes(&node_text(path, source)),
                    location: Some(span(current)),
                });
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn handle_function(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Function,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("func {name}{params}")),
        docstring: godoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_exported(&name),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_method(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    let receiver_type = node
        .child_by_field_name("receiver")
        .and_then(|receiver| receiver_type_name(receiver, source));
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    let signature = match &receiver_type {
        Some(recv) => format!("func ({recv}) {name}{params}"),
        None => format!("func {name}{params}"),
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Method,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: godoc_above(node, source),
        parent: receiver_type,
        exported: is_exported(&name),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_type_declaration(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        let type_node = spec.child_by_field_name("type");
        let (kind, keyword) = match type_node.map(|t| t.kind()) {
            Some("struct_type") => (SymbolKind::Class, "struct"),
            Some("interface_type") => (SymbolKind::Interface, "interface"),
            _ => (SymbolKind::Type, "type"),
        };
        output.symbols.push(SymbolInput {
            kind,
            name: name.clone(),
            location: span(spec),
            signature: Some(format!("type {name} {keyword}")),
            docstring: godoc_above(node, source),
            parent: ctx.container.clone(),
            exported: is_exported(&name),
        });
        if let Some(type_node) = type_node {
            match type_node.kind() {
                "struct_type" => emit_struct_fields(type_node, &name, source, output),
                "interface_type" => emit_interface_methods(type_node, &name, source, output),
                _ => {}
            }
        }
    }
}

fn emit_struct_fields(node: Node<'_>, owner: &str, source: &str, output: &mut ParsedFile) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "field_declaration" {
            let type_text = current
                .child_by_field_name("type")
                .map(|t| node_text(t, source))
                .unwrap_or_default();
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                if child.kind() == "field_identifier" {
                    let name = node_text(child, source);
                    output.symbols.push(SymbolInput {
                        kind: SymbolKind::Property,
                        name: name.clone(),
                        location: span(child),
                        signature: Some(format!("{name} {type_text}")),
                        docstring: None,
                        parent: Some(owner.to_string()),
                        exported: is_exported(&name),
                    });
                }
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn emit_interface_methods(node: Node<'_>, owner: &str, source: &str, output: &mut ParsedFile) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if matches!(current.kind(), "method_elem" | "method_spec") {
            if let Some(name_node) = current.child_by_field_name("name") {
                let name = node_text(name_node, source);
                let params = current
                    .child_by_field_name("parameters")
                    .map(|p| node_text(p, source))
                    .unwrap_or_else(|| "()".to_string());
                output.symbols.push(SymbolInput {
                    kind: SymbolKind::Method,
                    name: name.clone(),
                    location: span(current),
                    signature: Some(format!("{name}{params}")),
                    docstring: None,
                    parent: Some(owner.to_string()),
                    exported: is_exported(&name),
                });
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn handle_var_declaration(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    if ctx.fn_depth > 0 {
        return;
    }
    let is_const = node.kind() == "const_declaration";
    let keyword = if is_const { "const" } else { "var" };
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if matches!(current.kind(), "var_spec" | "const_spec") {
            let type_text = current
                .child_by_field_name("type")
                .map(|t| node_text(t, source))
                .unwrap_or_default();
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                if child.kind() == "identifier" {
                    let name = node_text(child, source);
                    output.symbols.push(SymbolInput {
                        kind: if is_const {
                            SymbolKind::Constant
                        } else {
                            SymbolKind::Variable
                        },
                        name: name.clone(),
                        location: span(child),
                        signature: Some(format!("{keyword} {name} {type_text}").trim().to_string()),
                        docstring: None,
                        parent: ctx.container.clone(),
                        exported: is_exported(&name),
                    });
                }
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn handle_short_var(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    let mut cursor = left.walk();
    for child in left.named_children(&mut cursor) {
        if child.kind() != "identifier" {
            continue;
        }
        let name = node_text(child, source);
        if name == "_" {
            continue;
        }
        output.symbols.push(SymbolInput {
            kind: SymbolKind::Variable,
            name: name.clone(),
            location: span(child),
            signature: Some(first_line(&node_text(node, source))),
            docstring: None,
            parent: ctx.owner.clone(),
            exported: false,
        });
    }
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
        "selector_expression" => function
            .child_by_field_name("field")
            .map(|f| node_text(f, source)),
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

fn receiver_type_name(receiver: Node<'_>, source: &str) -> Option<String> {
    let mut stack = vec![receiver];
    while let Some(current) = stack.pop() {
        if current.kind() == "type_identifier" {
            return Some(node_text(current, source));
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    None
}

/// Go convention: exported iff the first letter is uppercase.
fn is_exported(name: &str) -> bool {
    name.chars().next().map(|ch| ch.is_uppercase()).unwrap_or(false)
}

/// Contiguous `//` lines directly above the declaration.
fn godoc_above(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling()?;
    let mut expected_row = node.start_position().row;
    loop {
        if current.kind() != "comment" || current.end_position().row + 1 != expected_row {
            break;
        }
        let text = node_text(current, source);
        if !text.starts_with("//") {
            break;
        }
        lines.push(text.trim_start_matches("//").trim().to_string());
        expected_row = current.start_position().row;
        match current.prev_sibling() {
            Some(prev) => current = prev,
            None => break,
        }
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

fn strip_quotes(raw: &str) -> String {
    raw.trim_matches(|ch| ch == '"' || ch == '`').to_string()
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
