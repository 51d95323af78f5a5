use crate::indexer::extract::{EdgeInput, LanguageParser, ParsedFile, SymbolInput};
use crate::model::{EdgeType, Location, SymbolKind};
use tree_sitter::{Node, Parser};

pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_rust::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl LanguageParser for RustParser {
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
        "mod_item" => {
            handle_mod(node, ctx, source, output);
            return;
        }
        "struct_item" => {
            handle_struct(node, ctx, source, output);
            return;
        }
        "enum_item" => {
            handle_enum(node, ctx, source, output);
            return;
        }
        "trait_item" => {
            handle_trait(node, ctx, source, output);
            return;
        }
        "impl_item" => {
            handle_impl(node, ctx, source, output);
            return;
        }
        "function_item" => {
            handle_function(node, ctx, source, output, SymbolKind::Function);
            return;
        }
        "const_item" | "static_item" => {
            handle_const(node, ctx, source, output);
            return;
        }
        "type_item" => {
            handle_type_alias(node, ctx, source, output);
            return;
        }
        "use_declaration" => {
            handle_use(node, source, output);
            return;
        }
        "let_declaration" => {
            handle_let(node, ctx, source, output);
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

fn handle_mod(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Module,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("mod {name}")),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
    }
}

fn handle_struct(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Class,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("struct {name}")),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for field in body.named_children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let Some(field_name) = field_text(field, "name", source) else {
                continue;
            };
            let type_text = field
                .child_by_field_name("type")
                .map(|t| node_text(t, source))
                .unwrap_or_default();
            output.symbols.push(SymbolInput {
                kind: SymbolKind::Property,
                name: field_name.clone(),
                location: span(field),
                signature: Some(format!("{field_name}: {type_text}")),
                docstring: None,
                parent: Some(name.clone()),
                exported: is_pub(field, source),
            });
        }
    }
}

fn handle_enum(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Enum,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("enum {name}")),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for variant in body.named_children(&mut cursor) {
            if variant.kind() != "enum_variant" {
                continue;
            }
            let Some(variant_name) = field_text(variant, "name", source) else {
                continue;
            };
            output.symbols.push(SymbolInput {
                kind: SymbolKind::Constant,
                name: variant_name.clone(),
                location: span(variant),
                signature: Some(format!("{name}::{variant_name}")),
                docstring: None,
                parent: Some(name.clone()),
                exported: false,
            });
        }
    }
}

fn handle_trait(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Interface,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("trait {name}")),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name.clone());
    next_ctx.owner = Some(name);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if matches!(child.kind(), "function_item" | "function_signature_item") {
                handle_function(child, &next_ctx, source, output, SymbolKind::Method);
            }
        }
    }
}

/// The impl type becomes the owner of every `fn` declared inside.
fn handle_impl(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(type_name) = node
        .child_by_field_name("type")
        .map(|t| base_type_name(t, source))
    else {
        return;
    };
    if let Some(trait_node) = node.child_by_field_name("trait") {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Implements,
            from: Some(type_name.clone()),
            to: base_type_name(trait_node, source),
            location: Some(span(node)),
        });
    }
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(type_name.clone());
    next_ctx.owner = Some(type_name);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "function_item" => {
                    handle_function(child, &next_ctx, source, output, SymbolKind::Method)
                }
                "const_item" => handle_const(child, &next_ctx, source, output),
                _ => {}
            }
        }
    }
}

fn handle_function(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    output: &mut ParsedFile,
    kind: SymbolKind,
) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    output.symbols.push(SymbolInput {
        kind,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("fn {name}{params}")),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_const(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let keyword = if node.kind() == "static_item" {
        "static"
    } else {
        "const"
    };
    let type_text = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Constant,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("{keyword} {name}: {type_text}")),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
}

fn handle_type_alias(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Type,
        name: name.clone(),
        location: span(node),
        signature: Some(first_line(&node_text(node, source))),
        docstring: rustdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: is_pub(node, source),
    });
}

fn handle_use(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let Some(argument) = node.child_by_field_name("argument") else {
        return;
    };
    output.edges.push(EdgeInput {
        edge_type: EdgeType::Imports,
        from: None,
        to: node_text(argument, source),
        location: Some(span(node)),
    });
}

/// Identifier patterns only; destructuring stays anonymous.
fn handle_let(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(pattern) = node.child_by_field_name("pattern") else {
        return;
    };
    if pattern.kind() != "identifier" {
        return;
    }
    let name = node_text(pattern, source);
    if name == "_" {
        return;
    }
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Variable,
        name: name.clone(),
        location: span(node),
        signature: Some(first_line(&node_text(node, source))),
        docstring: None,
        parent: ctx.owner.clone(),
        exported: false,
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
        "scoped_identifier" => function
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

/// Strips generics and references down to the base type identifier.
fn base_type_name(node: Node<'_>, source: &str) -> String {
    match node.kind() {
        "type_identifier" => node_text(node, source),
        "generic_type" => node
            .child_by_field_name("type")
            .map(|t| base_type_name(t, source))
            .unwrap_or_else(|| node_text(node, source)),
        "scoped_type_identifier" | "scoped_identifier" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_else(|| node_text(node, source)),
        "reference_type" => node
            .named_child(node.named_child_count().saturating_sub(1))
            .map(|t| base_type_name(t, source))
            .unwrap_or_else(|| node_text(node, source)),
        _ => first_line(&node_text(node, source)),
    }
}

fn is_pub(node: Node<'_>, source: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return node_text(child, source).starts_with("pub");
        }
    }
    false
}

/// Contiguous `///` line comments directly above the item.
fn rustdoc_above(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling()?;
    let mut expected_row = node.start_position().row;
    loop {
        if current.kind() != "line_comment" || current.end_position().row + 1 != expected_row {
            break;
        }
        let text = node_text(current, source);
        if !text.starts_with("///") {
            break;
        }
        lines.push(text.trim_start_matches("///").trim().to_string());
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
