use crate::error::{GraphError, Result};
use crate::indexer::extract::{
    end_line, is_simple_call_target, line_count, node_text, start_line, syntax_error, CallInput,
    ExtractedFile, ImportInput, LanguageExtractor, SymbolInput, SymbolKind, TempId,
};
use crate::util;
use anyhow::Context as _;
use std::path::Path;
use tree_sitter::{Node, Parser};

const MAX_SIGNATURE_BYTES: usize = 200;

pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser
            .set_language(&language.into())
            .context("load python grammar")?;
        Ok(Self { parser })
    }
}

impl LanguageExtractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractedFile> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| GraphError::parse(rel_path, "parser produced no tree"))?;
        let root = tree.root_node();
        if let Some(err) = syntax_error(rel_path, root) {
            return Err(err);
        }

        let module_name = module_name_from_rel_path(rel_path);
        let leaf = module_name
            .rsplit('.')
            .next()
            .unwrap_or(module_name.as_str())
            .to_string();
        let mut builder = Builder::new(source);
        let module_id = builder.push(SymbolInput {
            temp_id: 0,
            parent: None,
            kind: SymbolKind::Module,
            name: leaf,
            signature: None,
            start_line: 1,
            end_line: line_count(source),
            start_byte: 0,
            end_byte: source.len() as i64,
        });
        let ctx = Context {
            scope: module_id,
            owner: module_id,
            in_class_body: false,
            at_module_level: true,
        };
        let package = base_package_parts(rel_path, &module_name);
        walk_children(root, ctx, &package, &mut builder);
        Ok(builder.output)
    }

    fn import_candidates(&self, _importing_file: &str, module: &str, name: &str) -> Vec<String> {
        if module.is_empty() || module.starts_with('.') {
            return Vec::new();
        }
        let base = module.replace('.', "/");
        let mut candidates = vec![
            format!("{base}.py"),
            format!("{base}.pyi"),
            format!("{base}/__init__.py"),
        ];
        if !name.is_empty() && name != "*" {
            candidates.push(format!("{base}/{name}.py"));
            candidates.push(format!("{base}/{name}/__init__.py"));
        }
        candidates
    }
}

#[derive(Clone, Copy)]
struct Context {
    /// Parent for declarations.
    scope: TempId,
    /// Symbol call sites are attributed to.
    owner: TempId,
    in_class_body: bool,
    at_module_level: bool,
}

struct Builder<'s> {
    source: &'s str,
    next_id: TempId,
    output: ExtractedFile,
}

impl<'s> Builder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            next_id: 0,
            output: ExtractedFile::default(),
        }
    }

    fn push(&mut self, mut symbol: SymbolInput) -> TempId {
        let id = self.next_id;
        self.next_id += 1;
        symbol.temp_id = id;
        self.output.symbols.push(symbol);
        id
    }

    fn push_node(
        &mut self,
        parent: TempId,
        kind: SymbolKind,
        name: String,
        node: Node<'_>,
        signature: Option<String>,
    ) -> TempId {
        self.push(SymbolInput {
            temp_id: 0,
            parent: Some(parent),
            kind,
            name,
            signature,
            start_line: start_line(node),
            end_line: end_line(node),
            start_byte: node.start_byte() as i64,
            end_byte: node.end_byte() as i64,
        })
    }

    fn text(&self, node: Node<'_>) -> String {
        node_text(node, self.source)
    }
}

fn walk_children(node: Node<'_>, ctx: Context, package: &[String], b: &mut Builder<'_>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, package, b);
    }
}

fn walk_node(node: Node<'_>, ctx: Context, package: &[String], b: &mut Builder<'_>) {
    match node.kind() {
        "class_definition" => handle_class(node, ctx, package, b),
        "function_definition" => handle_function(node, ctx, package, b),
        "import_statement" | "import_from_statement" => handle_import(node, package, b),
        "expression_statement" if ctx.at_module_level => {
            handle_module_assignment(node, ctx, b);
            walk_children(node, ctx, package, b);
        }
        "call" => {
            record_call(node, ctx, b);
            walk_children(node, ctx, package, b);
        }
        _ => walk_children(node, ctx, package, b),
    }
}

fn handle_class(node: Node<'_>, ctx: Context, package: &[String], b: &mut Builder<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = b.text(name_node);
    if name.is_empty() {
        return;
    }
    // base-class expressions run in the enclosing scope
    if let Some(bases) = node.child_by_field_name("superclasses") {
        walk_children(bases, ctx, package, b);
    }
    let id = b.push_node(ctx.scope, SymbolKind::Class, name, node, None);
    let inner = Context {
        scope: id,
        owner: id,
        in_class_body: true,
        at_module_level: false,
    };
    if let Some(body) = node.child_by_field_name("body") {
        walk_children(body, inner, package, b);
    }
}

fn handle_function(node: Node<'_>, ctx: Context, package: &[String], b: &mut Builder<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = b.text(name_node);
    if name.is_empty() {
        return;
    }
    let kind = if ctx.in_class_body {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    // default values are evaluated at definition time
    if let Some(params) = node.child_by_field_name("parameters") {
        walk_children(params, ctx, package, b);
    }
    let signature = extract_signature(node, b.source);
    let id = b.push_node(ctx.scope, kind, name, node, signature);
    let inner = Context {
        scope: id,
        owner: id,
        in_class_body: false,
        at_module_level: false,
    };
    if let Some(body) = node.child_by_field_name("body") {
        walk_children(body, inner, package, b);
    }
}

fn handle_module_assignment(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    let Some(assignment) = node.named_child(0) else {
        return;
    };
    if assignment.kind() != "assignment" {
        return;
    }
    let Some(left) = assignment.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    let name = b.text(left);
    if name.is_empty() {
        return;
    }
    b.push_node(ctx.scope, SymbolKind::Variable, name, assignment, None);
}

fn record_call(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let callee = b.text(function);
    if !is_simple_call_target(&callee) {
        return;
    }
    b.output.calls.push(CallInput {
        source: ctx.owner,
        callee,
        line: start_line(node),
    });
}

fn handle_import(node: Node<'_>, package: &[String], b: &mut Builder<'_>) {
    let line = start_line(node);
    let mut cursor = node.walk();
    match node.kind() {
        "import_statement" => {
            for child in node.children_by_field_name("name", &mut cursor) {
                let (module, alias) = match child.kind() {
                    "aliased_import" => {
                        let module = child
                            .child_by_field_name("name")
                            .map(|n| b.text(n))
                            .unwrap_or_default();
                        let alias = child.child_by_field_name("alias").map(|n| b.text(n));
                        (module, alias)
                    }
                    _ => (b.text(child), None),
                };
                if module.is_empty() {
                    continue;
                }
                let name = module.rsplit('.').next().unwrap_or(&module).to_string();
                // `import a.b` binds the dotted path itself
                let binding = alias.or_else(|| (name != module).then(|| module.clone()));
                b.output.imports.push(ImportInput {
                    module,
                    name,
                    binding,
                    line,
                });
            }
        }
        _ => {
            let Some(module_node) = node.child_by_field_name("module_name") else {
                return;
            };
            let raw_module = b.text(module_node);
            let module = absolutize_module(&raw_module, package).unwrap_or(raw_module);
            for child in node.children_by_field_name("name", &mut cursor) {
                let (name, alias) = match child.kind() {
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| b.text(n))
                            .unwrap_or_default();
                        let alias = child.child_by_field_name("alias").map(|n| b.text(n));
                        (name, alias)
                    }
                    _ => (b.text(child), None),
                };
                if name.is_empty() {
                    continue;
                }
                b.output.imports.push(ImportInput {
                    module: module.clone(),
                    name,
                    binding: alias,
                    line,
                });
            }
        }
    }
}

fn extract_signature(node: Node<'_>, source: &str) -> Option<String> {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| node_text(n, source));
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, source));
    let raw = match (params, return_type) {
        (Some(p), Some(r)) => format!("{p} -> {r}"),
        (Some(p), None) => p,
        _ => return None,
    };
    Some(util::truncate_str_bytes(
        &util::squash_whitespace(&raw),
        MAX_SIGNATURE_BYTES,
    ))
}

pub fn module_name_from_rel_path(rel_path: &str) -> String {
    let path = Path::new(rel_path);
    let mut parts: Vec<String> = path
        .components()
        .filter_map(|comp| comp.as_os_str().to_str().map(|s| s.to_string()))
        .collect();
    let file = parts.pop().unwrap_or_default();
    let stem = Path::new(&file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&file)
        .to_string();
    if stem != "__init__" {
        parts.push(stem);
    }
    if parts.is_empty() {
        "__init__".to_string()
    } else {
        parts.join(".")
    }
}

fn base_package_parts(rel_path: &str, module_name: &str) -> Vec<String> {
    let is_init = Path::new(rel_path)
        .file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name == "__init__.py" || name == "__init__.pyi");
    let parts: Vec<&str> = module_name
        .split('.')
        .filter(|part| !part.is_empty() && *part != "__init__")
        .collect();
    let keep = if is_init {
        parts.len()
    } else {
        parts.len().saturating_sub(1)
    };
    parts[..keep].iter().map(|part| part.to_string()).collect()
}

/// Rewrite a relative module (`.sibling`, `..pkg.mod`) against the importing
/// file's package. `None` when it climbs above the repository root.
fn absolutize_module(candidate: &str, base_package: &[String]) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with('.') {
        return Some(trimmed.to_string());
    }
    let dot_count = trimmed.chars().take_while(|ch| *ch == '.').count();
    let rest = &trimmed[dot_count..];
    let up = dot_count.saturating_sub(1);
    if up > base_package.len() {
        return None;
    }
    let mut parts: Vec<String> = base_package.to_vec();
    let keep = parts.len().saturating_sub(up);
    parts.truncate(keep);
    for segment in rest.split('.').filter(|part| !part.is_empty()) {
        parts.push(segment.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}
