//! Walker for TypeScript, TSX and JavaScript sources. One grammar variant
//! per extension; the walk itself is shared.

use crate::indexer::extract::{EdgeInput, LanguageParser, ParsedFile, SymbolInput};
use crate::model::{EdgeType, Location, SymbolKind};
use tree_sitter::{Node, Parser};

pub struct TypeScriptParser {
    parser: Parser,
}

impl TypeScriptParser {
    pub fn for_extension(ext: &str) -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        match ext {
            "tsx" | "jsx" => parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?,
            "js" | "mjs" | "cjs" => {
                parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?
            }
            _ => parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?,
        }
        Ok(Self { parser })
    }
}

impl LanguageParser for TypeScriptParser {
    fn parse_file(&mut self, source: &str) -> ParsedFile {
        let mut output = ParsedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return output;
        };
        let ctx = Context {
            container: None,
            owner: None,
            fn_depth: 0,
            in_export: false,
        };
        walk_node(tree.root_node(), &ctx, source, &mut output);
        output
    }
}

#[derive(Clone)]
struct Context {
    /// Name of the lexically enclosing symbol, if any.
    container: Option<String>,
    /// Nearest named symbol; source of structural reference edges.
    owner: Option<String>,
    fn_depth: usize,
    in_export: bool,
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    match node.kind() {
        "export_statement" => {
            handle_export(node, ctx, source, output);
            return;
        }
        "import_statement" => {
            handle_import(node, source, output);
            return;
        }
        "class_declaration" | "abstract_class_declaration" => {
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
        "type_alias_declaration" => {
            handle_type_alias(node, ctx, source, output);
            return;
        }
        "function_declaration" | "generator_function_declaration" => {
            handle_function(node, ctx, source, output);
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            handle_variable_declaration(node, ctx, source, output);
            return;
        }
        "internal_module" | "module" => {
            handle_namespace(node, ctx, source, output);
            return;
        }
        "call_expression" => {
            handle_call(node, ctx, source, output);
        }
        "new_expression" => {
            handle_new(node, ctx, source, output);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, output);
    }
}

fn handle_export(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    // Re-exports carry a source specifier and behave like imports.
    if let Some(source_node) = node.child_by_field_name("source") {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Imports,
            from: None,
            to: strip_quotes(&node_text(source_node, source)),
            location: Some(span(node)),
        });
        return;
    }
    let mut next_ctx = ctx.clone();
    next_ctx.in_export = true;
    if let Some(declaration) = node.child_by_field_name("declaration") {
        walk_node(declaration, &next_ctx, source, output);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, &next_ctx, source, output);
    }
}

fn handle_import(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    output.edges.push(EdgeInput {
        edge_type: EdgeType::Imports,
        from: None,
        to: strip_quotes(&node_text(source_node, source)),
        location: Some(span(node)),
    });
}

fn handle_class(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    if ctx.fn_depth > 0 {
        return;
    }
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    let extends = heritage_targets(node, "extends_clause", source);
    let implements = heritage_targets(node, "implements_clause", source);

    let mut signature = format!("class {name}");
    if let Some(first) = extends.first() {
        signature.push_str(&format!(" extends {first}"));
    }
    if !implements.is_empty() {
        signature.push_str(&format!(" implements {}", implements.join(", ")));
    }

    output.symbols.push(SymbolInput {
        kind: SymbolKind::Class,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: ctx.in_export,
    });

    for target in &extends {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Extends,
            from: Some(name.clone()),
            to: target.clone(),
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
    next_ctx.in_export = false;
    if let Some(body) = node.child_by_field_name("body") {
        walk_class_body(body, &next_ctx, source, output);
    }
}

fn walk_class_body(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "method_definition" => handle_method(child, ctx, source, output),
            "public_field_definition" | "field_definition" => {
                handle_field(child, ctx, source, output)
            }
            _ => walk_node(child, ctx, source, output),
        }
    }
}

fn handle_method(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    let kind = if name == "constructor" {
        SymbolKind::Constructor
    } else {
        SymbolKind::Method
    };
    output.symbols.push(SymbolInput {
        kind,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("{name}{params}")),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: false,
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_field(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    // Arrow-function valued fields behave like methods.
    let is_function = node
        .child_by_field_name("value")
        .map(|value| matches!(value.kind(), "arrow_function" | "function_expression"))
        .unwrap_or(false);
    let type_text = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source));
    let signature = match &type_text {
        Some(t) => format!("{name}{t}"),
        None => name.clone(),
    };
    output.symbols.push(SymbolInput {
        kind: if is_function {
            SymbolKind::Method
        } else {
            SymbolKind::Property
        },
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: false,
    });
    if let Some(value) = node.child_by_field_name("value") {
        let mut next_ctx = ctx.clone();
        next_ctx.owner = Some(name);
        next_ctx.fn_depth += 1;
        walk_node(value, &next_ctx, source, output);
    }
}

fn handle_interface(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    let extends = interface_extends_targets(node, source);
    let mut signature = format!("interface {name}");
    if !extends.is_empty() {
        signature.push_str(&format!(" extends {}", extends.join(", ")));
    }
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Interface,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: ctx.in_export,
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
    next_ctx.container = Some(name);
    next_ctx.in_export = false;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "property_signature" => {
                    let Some(prop) = named_child_text(child, "name", source) else {
                        continue;
                    };
                    let type_text = child
                        .child_by_field_name("type")
                        .map(|t| node_text(t, source))
                        .unwrap_or_default();
                    output.symbols.push(SymbolInput {
                        kind: SymbolKind::Property,
                        name: prop.clone(),
                        location: span(child),
                        signature: Some(format!("{prop}{type_text}")),
                        docstring: None,
                        parent: next_ctx.container.clone(),
                        exported: false,
                    });
                }
                "method_signature" => {
                    let Some(method) = named_child_text(child, "name", source) else {
                        continue;
                    };
                    let params = child
                        .child_by_field_name("parameters")
                        .map(|p| node_text(p, source))
                        .unwrap_or_else(|| "()".to_string());
                    output.symbols.push(SymbolInput {
                        kind: SymbolKind::Method,
                        name: method.clone(),
                        location: span(child),
                        signature: Some(format!("{method}{params}")),
                        docstring: None,
                        parent: next_ctx.container.clone(),
                        exported: false,
                    });
                }
                _ => {}
            }
        }
    }
}

fn handle_enum(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Enum,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("enum {name}")),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: ctx.in_export,
    });
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let member = match child.kind() {
                "enum_assignment" => child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source)),
                "property_identifier" => Some(node_text(child, source)),
                _ => None,
            };
            if let Some(member) = member {
                output.symbols.push(SymbolInput {
                    kind: SymbolKind::Constant,
                    name: member.clone(),
                    location: span(child),
                    signature: Some(format!("{name}.{member}")),
                    docstring: None,
                    parent: Some(name.clone()),
                    exported: false,
                });
            }
        }
    }
}

fn handle_type_alias(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Type,
        name: name.clone(),
        location: span(node),
        signature: Some(first_line(&node_text(node, source))),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: ctx.in_export,
    });
}

fn handle_function(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    if ctx.fn_depth > 0 {
        // Nested function declarations stay local.
        walk_body_for_references(node, ctx, source, output);
        return;
    }
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source))
        .unwrap_or_else(|| "()".to_string());
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Function,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("function {name}{params}")),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: ctx.in_export,
    });
    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_variable_declaration(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    output: &mut ParsedFile,
) {
    if ctx.fn_depth > 0 {
        walk_body_for_references(node, ctx, source, output);
        return;
    }
    let is_const = node
        .child(0)
        .map(|token| token.kind() == "const")
        .unwrap_or(false);
    let keyword = if is_const { "const" } else { "let" };
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        if name_node.kind() != "identifier" {
            continue;
        }
        let name = node_text(name_node, source);
        let value = declarator.child_by_field_name("value");
        let is_function = value
            .map(|v| matches!(v.kind(), "arrow_function" | "function_expression" | "generator_function"))
            .unwrap_or(false);
        let kind = if is_function {
            SymbolKind::Function
        } else if is_const {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };
        let signature = if is_function {
            let params = value
                .and_then(|v| v.child_by_field_name("parameters"))
                .map(|p| node_text(p, source))
                .unwrap_or_else(|| "()".to_string());
            format!("{keyword} {name} = {params} =>")
        } else {
            let type_text = declarator
                .child_by_field_name("type")
                .map(|t| node_text(t, source))
                .unwrap_or_default();
            format!("{keyword} {name}{type_text}")
        };
        output.symbols.push(SymbolInput {
            kind,
            name: name.clone(),
            location: span(declarator),
            signature: Some(signature),
            docstring: jsdoc_above(node, source),
            parent: ctx.container.clone(),
            exported: ctx.in_export,
        });
        if let Some(value) = value {
            let mut next_ctx = ctx.clone();
            next_ctx.owner = Some(name);
            next_ctx.fn_depth += 1;
            walk_node(value, &next_ctx, source, output);
        }
    }
}

fn handle_namespace(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name) = named_child_text(node, "name", source) else {
        return;
    };
    let kind = if node.kind() == "internal_module" {
        SymbolKind::Namespace
    } else {
        SymbolKind::Module
    };
    output.symbols.push(SymbolInput {
        kind,
        name: name.clone(),
        location: span(node),
        signature: Some(format!("namespace {name}")),
        docstring: jsdoc_above(node, source),
        parent: ctx.container.clone(),
        exported: ctx.in_export,
    });
    let mut next_ctx = ctx.clone();
    next_ctx.container = Some(name.clone());
    next_ctx.owner = Some(name);
    next_ctx.in_export = false;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
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
        "member_expression" => function
            .child_by_field_name("property")
            .map(|p| node_text(p, source)),
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

fn handle_new(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(owner) = &ctx.owner else {
        return;
    };
    let Some(constructor) = node.child_by_field_name("constructor") else {
        return;
    };
    if constructor.kind() == "identifier" {
        output.edges.push(EdgeInput {
            edge_type: EdgeType::Instantiates,
            from: Some(owner.clone()),
            to: node_text(constructor, source),
            location: Some(span(node)),
        });
    }
}

/// Descends into a nested scope only to pick up reference edges; no
/// symbols are emitted below function depth.
fn walk_body_for_references(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    match node.kind() {
        "call_expression" => handle_call(node, ctx, source, output),
        "new_expression" => handle_new(node, ctx, source, output),
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_body_for_references(child, ctx, source, output);
    }
}

// ----------------------------------------------------------------------
// Heritage helpers

fn heritage_targets(node: Node<'_>, clause_kind: &str, source: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "class_heritage" {
            let mut inner = child.walk();
            let mut saw_clause = false;
            for clause in child.named_children(&mut inner) {
                if clause.kind() == clause_kind {
                    targets.extend(clause_targets(clause, source));
                    saw_clause = true;
                }
            }
            // The JavaScript grammar puts the superclass expression
            // directly under class_heritage.
            if !saw_clause && clause_kind == "extends_clause" {
                let mut inner = child.walk();
                for value in child.named_children(&mut inner) {
                    let text = node_text(value, source);
                    if !text.is_empty() {
                        targets.push(text);
                        break;
                    }
                }
            }
        } else if child.kind() == clause_kind {
            targets.extend(clause_targets(child, source));
        }
    }
    targets
}

fn interface_extends_targets(node: Node<'_>, source: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if matches!(child.kind(), "extends_clause" | "extends_type_clause") {
            targets.extend(clause_targets(child, source));
        }
    }
    targets
}

fn clause_targets(node: Node<'_>, source: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if matches!(child.kind(), "type_arguments" | "type_parameters") {
            continue;
        }
        let text = node_text(child, source);
        if !text.is_empty() {
            targets.push(text);
        }
    }
    targets
}

// ----------------------------------------------------------------------
// Small shared helpers

fn named_child_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
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

fn strip_quotes(raw: &str) -> String {
    raw.trim_matches(|ch| ch == '"' || ch == '\'' || ch == '`')
        .to_string()
}

/// JSDoc block immediately above the declaration (or its wrapping export
/// statement).
fn jsdoc_above(node: Node<'_>, source: &str) -> Option<String> {
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };
    let prev = anchor.prev_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    let raw = node_text(prev, source);
    if !raw.starts_with("/**") {
        return None;
    }
    Some(clean_block_comment(&raw))
}

pub(crate) fn clean_block_comment(raw: &str) -> String {
    let inner = raw
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/");
    inner
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
