use crate::indexer::extract::{EdgeInput, LanguageParser, ParsedFile, SymbolInput};
use crate::model::{EdgeType, Location, SymbolKind};
use tree_sitter::{Node, Parser};

pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_java::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl LanguageParser for JavaParser {
    fn parse_file(&mut self, source: &str) -> ParsedFile {
        let mut output = ParsedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return output;
        };
        let ctx = Context {
            container: None,
            owner: None,
            in_interface: false,
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
    /// Interface members default to public when no modifier is written.
    in_interface: bool,
    fn_depth: usize,
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    match node.kind() {
        "package_declaration" => {
            handle_package(node, source, output);
            return;
        }
        "import_declaration" => {
            handle_import(node, source, output);
            return;
        }
        "class_declaration" => {
            handle_class(node, ctx, source, output);
            return;
        }
        "interface_declaration" => {
            handle_interface(node, ctx, source, output);
            return;
        }
        "enum_declaration" => {
            handle_enum(node, ctx, source, output);
            return;
        }
        "method_declaration" => {
            handle_method(node, ctx, source, output);
            return;
        }
        "constructor_declaration" => {
            handle_constructor(node, ctx, source, output);
            return;
        }
        "field_declaration" => {
            handle_field(node, ctx, source, output);
            return;
        }
        "local_variable_declaration" => {
            handle_local_variable(node, ctx, source, output);
        }
        "method_invocation" => {
            handle_invocation(node, ctx, source, output);
        }
        "object_creation_expression" => {
            handle_instantiation(node, ctx, source, output);
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
        kind: SymbolKind::Namespace,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("package {name}")),
        docstring: None,
        parent: None,
        exported: true,
    });
}

fn handle_import(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if matches!(child.kind(), "scoped_identifier" | "identifier") {
            output.edges.push(EdgeInput {
                edge_type: EdgeType::Imports,
                from: None,
                to: node_text(child, source),
                location: Some(span(node)),
            });
            return;
        }
    }
}

fn handle_class(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let extends = node
        .child_by_field_name("superclass")
        .and_then(|superclass| superclass.named_child(0).map(|t| base_type(t, source)));
    let implements = super_interface_names(node, source);

    let mut signature = format!("class {name}");
    if let Some(base) = &extends {
        signature.push_str(&format!(" extends {base}"));
    }
    if !implements.is_empty() {
        signature.push_str(&format!(" implements {}", implements.join(", ")));
    }

    output.symbols.push(SymbolInput {
        kind: SymbolKind::Class,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: javadoc_above(node, source),
        parent: ctx.container.clone(),
        exported: has_modifier(node, source, "public"),
    });
    if let Some(base) = &extends {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Extends,
            from: Some(name.clone()),
            to: base.clone(),
            location: Some(span(node)),
        });
    }
    for target in &implements {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Implements,
            from: Some(name.clone()),
            to: target.clone(),
            location: Some(span(node)),
        });
    }

    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name.clone());
    next_ctx.owner = Some(name);
    next_ctx.in_interface = false;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
    }
}

fn handle_interface(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let extends = extends_interface_names(node, source);
    let mut signature = format!("interface {name}");
    if !extends.is_empty() {
        signature.push_str(&format!(" extends {}", extends.join(", ")));
    }
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Interface,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: javadoc_above(node, source),
        parent: ctx.container.clone(),
        exported: has_modifier(node, source, "public"),
    });
    for target in &extends {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Extends,
            from: Some(name.clone()),
            to: target.clone(),
            location: Some(span(node)),
        });
    }

    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name.clone());
    next_ctx.owner = Some(name);
    next_ctx.in_interface = true;
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
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Enum,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("enum {name}")),
        docstring: javadoc_above(node, source),
        parent: ctx.container.clone(),
        exported: has_modifier(node, source, "public"),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name.clone());
    next_ctx.owner = Some(name.clone());
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if child.kind() == "enum_constant" {
                if let Some(constant) = field_text(child, "name", source) {
                    output.symbols.push(SymbolInput {
                        kind: SymbolKind::Constant,
                        name: constant.clone(),
                        location: span(child),
                        signature: Some(format!("{name}.{constant}")),
                        docstring: None,
                        parent: Some(name.clone()),
                        exported: false,
                    });
                }
            } else {
                walk_node(child, &next_ctx, source, output);
            }
        }
    }
}

fn handle_method(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    let return_type = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    let exported = if has_modifier_block(node) {
        has_modifier(node, source, "public")
    } else {
        // No modifier block at all: interface members default to public.
        ctx.in_interface
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Method,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("{return_type} {name}{params}").trim().to_string()),
        docstring: javadoc_above(node, source),
        parent: ctx.container.clone(),
        exported,
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_constructor(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Constructor,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("{name}{params}")),
        docstring: javadoc_above(node, source),
        parent: ctx.container.clone(),
        exported: has_modifier(node, source, "public"),
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_field(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let type_text = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    let is_static = has_modifier(node, source, "static");
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name) = field_text(declarator, "name", source) else {
            continue;
        };
        output.symbols.push(SymbolInput {
            kind: if is_static {
                SymbolKind::Constant
            } else {
                SymbolKind::Property
            },
            name: name.clone(),
            location: span(declarator),
            signature: Some(format!("{type_text} {name}").trim().to_string()),
            docstring: None,
            parent: ctx.container.clone(),
            exported: has_modifier(node, source, "public"),
        });
    }
}

fn handle_local_variable(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    if ctx.fn_depth == 0 {
        return;
    }
    let type_text = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name) = field_text(declarator, "name", source) else {
            continue;
        };
        output.symbols.push(SymbolInput {
            kind: SymbolKind::Variable,
            name: name.clone(),
            location: span(declarator),
            signature: Some(format!("{type_text} {name}").trim().to_string()),
            docstring: None,
            parent: ctx.owner.clone(),
            exported: false,
        });
    }
}

fn handle_invocation(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(owner) = &ctx.owner else {
        return;
    };
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    if name != *owner {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Calls,
            from: Some(owner.clone()),
            to: name,
            location: Some(span(node)),
        });
    }
}

fn handle_instantiation(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(owner) = &ctx.owner else {
        return;
    };
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    output.edges.push(EdgeInput {
        edge_type: EdgeType::Instantiates,
        from: Some(owner.clone()),
        to: base_type(type_node, source),
        location: Some(span(node)),
    });
}

fn super_interface_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "super_interfaces" {
            collect_type_names(child, source, &mut names);
        }
    }
    names
}

fn extends_interface_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "extends_interfaces" {
            collect_type_names(child, source, &mut names);
        }
    }
    names
}

fn collect_type_names(node: Node<'_>, source: &str, names: &mut Vec<String>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "type_identifier" {
            names.push(node_text(current, source));
            continue;
        }
        let mut cursor = current.walk();
        let mut children: Vec<Node<'_>> = current.named_children(&mut cursor).collect();
        children.reverse();
        stack.extend(children);
    }
}

fn base_type(node: Node<'_>, source: &str) -> String {
    match node.kind() {
        "type_identifier" => node_text(node, source),
        "generic_type" | "scoped_type_identifier" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "type_identifier" {
                    return node_text(child, source);
                }
            }
            node_text(node, source)
        }
        _ => node_text(node, source),
    }
}

fn has_modifier_block(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| c.kind() == "modifiers");
    result
}

fn has_modifier(node: Node<'_>, source: &str, modifier: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifiers" {
            return node_text(child, source)
                .split_whitespace()
                .any(|word| word == modifier);
        }
    }
    false
}

/// Javadoc block immediately above the declaration.
fn javadoc_above(node: Node<'_>, source: &str) -> Option<String> {
    let prev = node.prev_sibling()?;
    if !matches!(prev.kind(), "block_comment" | "comment") {
        return None;
    }
    let raw = node_text(prev, source);
    if !raw.starts_with("/**") {
        return None;
    }
    Some(crate::indexer::typescript::clean_block_comment(&raw))
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
