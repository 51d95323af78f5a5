use crate::indexer::extract::{EdgeInput, LanguageParser, ParsedFile, SymbolInput};
use crate::model::{EdgeType, Location, SymbolKind};
use tree_sitter::{Node, Parser};

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl LanguageParser for PythonParser {
    fn parse_file(&mut self, source: &str) -> ParsedFile {
        let mut output = ParsedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return output;
        };
        let ctx = Context {
            class_stack: Vec::new(),
            owner: None,
            fn_depth: 0,
        };
        walk_node(tree.root_node(), &ctx, source, &mut output);
        output
    }
}

#[derive(Clone)]
struct Context {
    class_stack: Vec<String>,
    owner: Option<String>,
    fn_depth: usize,
}

impl Context {
    fn container(&self) -> Option<String> {
        self.class_stack.last().cloned()
    }

    fn top_level(&self) -> bool {
        self.class_stack.is_empty() && self.fn_depth == 0
    }
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    match node.kind() {
        "decorated_definition" => {
            // Descend past the decorators to the wrapped definition.
            if let Some(definition) = node.child_by_field_name("definition") {
                walk_node(definition, ctx, source, output);
            }
            return;
        }
        "class_definition" => {
            handle_class(node, ctx, source, output);
            return;
        }
        "function_definition" => {
            handle_function(node, ctx, source, output);
            return;
        }
        "import_statement" => {
            handle_import(node, source, output);
            return;
        }
        "import_from_statement" => {
            handle_import_from(node, source, output);
            return;
        }
        "assignment" => {
            handle_assignment(node, ctx, source, output);
        }
        "call" => {
            handle_call(node, ctx, source, output);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, output);
    }
}

fn handle_class(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    let bases = superclass_names(node, source);
    let mut signature = format!("class {name}");
    if !bases.is_empty() {
        signature.push_str(&format!("({})", bases.join(", ")));
        signature.push_str(&format!(" extends {}", bases.join(", ")));
    }
    output.symbols.push(SymbolInput {
        kind: SymbolKind::Class,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: body_docstring(node, source),
        parent: ctx.container(),
        exported: ctx.top_level(),
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
    next_ctx.class_stack.push(name.clone());
    next_ctx.owner = Some(name);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
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
    let in_class = !ctx.class_stack.is_empty();
    let kind = if in_class && ctx.fn_depth == 0 {
        if name == "__init__" {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        }
    } else {
        SymbolKind::Function
    };
    let signature = if kind == SymbolKind::Function {
        format!("def {name}{params}")
    } else {
        format!("{name}{params}")
    };
    output.symbols.push(SymbolInput {
        kind,
        name: name.clone(),
        location: span(node),
        signature: Some(signature),
        docstring: body_docstring(node, source),
        parent: ctx.container(),
        exported: ctx.top_level(),
    });

    let mut next_ctx = ctx.clone();
    next_ctx.owner = Some(name);
    next_ctx.fn_depth += 1;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
    }
}

fn handle_assignment(node: Node<'_>, ctx: &Context, source: &str, output: &mut ParsedFile) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    match left.kind() {
        "identifier" if ctx.fn_depth == 0 => {
            let name = node_text(left, source);
            let kind = if is_screaming_case(&name) {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            output.symbols.push(SymbolInput {
                kind,
                name: name.clone(),
                location: span(node),
                signature: Some(first_line(&node_text(node, source))),
                docstring: None,
                parent: ctx.container(),
                exported: ctx.top_level(),
            });
        }
        // self.attr = … inside a method declares an instance attribute.
        "attribute" => {
            let object = left.child_by_field_name("object");
            let is_self = object
                .map(|o| node_text(o, source) == "self")
                .unwrap_or(false);
            if !is_self || ctx.class_stack.is_empty() {
                return;
            }
            let Some(attr) = left.child_by_field_name("attribute") else {
                return;
            };
            let name = node_text(attr, source);
            output.symbols.push(SymbolInput {
                kind: if is_screaming_case(&name) {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Variable
                },
                name,
                location: span(node),
                signature: Some(first_line(&node_text(node, source))),
                docstring: None,
                parent: ctx.container(),
                exported: false,
            });
        }
        _ => {}
    }
}

fn handle_import(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let module = match child.kind() {
            "dotted_name" => Some(node_text(child, source)),
            "aliased_import" => child
                .child_by_field_name("name")
                .map(|n| node_text(n, source)),
            _ => None,
        };
        if let Some(module) = module {
            output.edges.push(EdgeInput {
                edge_type: EdgeType::Imports,
                from: None,
                to: module,
                location: Some(span(node)),
            });
        }
    }
}

fn handle_import_from(node: Node<'_>, source: &str, output: &mut ParsedFile) {
    let Some(module) = node.child_by_field_name("module_name") else {
        return;
    };
    output.edges.push(EdgeInput {
        edge_type: EdgeType::Imports,
        from: None,
        to: node_text(module, source),
        location: Some(span(node)),
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
        "attribute" => function
            .child_by_field_name("attribute")
            .map(|a| node_text(a, source)),
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

fn superclass_names(node: Node<'_>, source: &str) -> Vec<String> {
    let Some(superclasses) = node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut cursor = superclasses.walk();
    for child in superclasses.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => names.push(node_text(child, source)),
            "attribute" => {
                if let Some(attr) = child.child_by_field_name("attribute") {
                    names.push(node_text(attr, source));
                }
            }
            _ => {}
        }
    }
    names
}

/// First expression of the body, when it is a string literal.
fn body_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = node_text(string, source);
    Some(unquote_string(&raw))
}

fn unquote_string(raw: &str) -> String {
    let trimmed = raw
        .trim_start_matches("r\"\"\"")
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''")
        .trim_matches(|ch| ch == '"' || ch == '\'');
    trimmed.trim().to_string()
}

fn is_screaming_case(name: &str) -> bool {
    name.chars().any(|ch| ch.is_ascii_uppercase())
        && name
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
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
