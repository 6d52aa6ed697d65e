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
const RESOLVE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

pub struct JavascriptExtractor {
    parser: Parser,
}

impl JavascriptExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_javascript::LANGUAGE;
        parser
            .set_language(&language.into())
            .context("load javascript grammar")?;
        Ok(Self { parser })
    }
}

impl LanguageExtractor for JavascriptExtractor {
    fn language(&self) -> &'static str {
        "javascript"
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

        let mut builder = Builder::new(source);
        let module_id = builder.push(SymbolInput {
            temp_id: 0,
            parent: None,
            kind: SymbolKind::Module,
            name: module_stem(rel_path),
            signature: None,
            start_line: 1,
            end_line: line_count(source),
            start_byte: 0,
            end_byte: source.len() as i64,
        });
        let ctx = Context {
            scope: module_id,
            owner: module_id,
            at_module_level: true,
        };
        walk_children(root, ctx, &mut builder);
        Ok(builder.output)
    }

    fn import_candidates(&self, importing_file: &str, module: &str, _name: &str) -> Vec<String> {
        // bare specifiers point into node_modules, which is never scanned
        if !module.starts_with('.') {
            return Vec::new();
        }
        let Some(base) = util::join_rel(util::parent_dir(importing_file), module) else {
            return Vec::new();
        };
        let has_extension = Path::new(&base)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| RESOLVE_EXTENSIONS.contains(&ext));
        if has_extension {
            return vec![base];
        }
        let mut candidates: Vec<String> = RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| format!("{base}.{ext}"))
            .collect();
        candidates.push(format!("{base}/index.js"));
        candidates
    }
}

#[derive(Clone, Copy)]
struct Context {
    scope: TempId,
    owner: TempId,
    at_module_level: bool,
}

impl Context {
    fn nested(self, id: TempId) -> Self {
        Context {
            scope: id,
            owner: id,
            at_module_level: false,
        }
    }
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

    fn import(&mut self, module: &str, name: String, binding: Option<String>, line: i64) {
        if name.is_empty() {
            return;
        }
        self.output.imports.push(ImportInput {
            module: module.to_string(),
            name,
            binding,
            line,
        });
    }
}

fn is_function_value(kind: &str) -> bool {
    matches!(
        kind,
        "function" | "function_expression" | "arrow_function" | "generator_function"
    )
}

fn walk_children(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, b);
    }
}

fn walk_node(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            match node.child_by_field_name("name") {
                Some(name_node) => {
                    let name = b.text(name_node);
                    handle_function(node, node, name, SymbolKind::Function, ctx, b);
                }
                None => walk_children(node, Context { at_module_level: false, ..ctx }, b),
            }
        }
        "class_declaration" | "class" => handle_class(node, ctx, b),
        "lexical_declaration" | "variable_declaration" => handle_declaration(node, ctx, b),
        "import_statement" => handle_import(node, b),
        "call_expression" | "new_expression" => {
            record_call(node, ctx, b);
            walk_children(node, ctx, b);
        }
        kind if is_function_value(kind) => {
            // anonymous callbacks: calls stay with the enclosing symbol
            walk_children(node, Context { at_module_level: false, ..ctx }, b);
        }
        _ => walk_children(node, ctx, b),
    }
}

/// `span` covers the whole declaration, `function` is the node holding
/// parameters and body (they differ for `const f = () => {}`).
fn handle_function(
    span: Node<'_>,
    function: Node<'_>,
    name: String,
    kind: SymbolKind,
    ctx: Context,
    b: &mut Builder<'_>,
) {
    if name.is_empty() {
        return;
    }
    let signature = extract_signature(function, b.source);
    if let Some(params) = function.child_by_field_name("parameters") {
        walk_children(params, ctx, b);
    }
    let id = b.push_node(ctx.scope, kind, name, span, signature);
    if let Some(body) = function.child_by_field_name("body") {
        walk_node(body, ctx.nested(id), b);
    }
}

fn handle_class(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    let name = node
        .child_by_field_name("name")
        .map(|n| b.text(n))
        .unwrap_or_default();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "class_heritage" {
            walk_children(child, ctx, b);
        }
    }
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    if name.is_empty() {
        walk_children(body, Context { at_module_level: false, ..ctx }, b);
        return;
    }
    let id = b.push_node(ctx.scope, SymbolKind::Class, name, node, None);
    let class_ctx = ctx.nested(id);
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_definition" => {
                let name = member
                    .child_by_field_name("name")
                    .map(|n| b.text(n))
                    .unwrap_or_default();
                if is_plain_member_name(&name) {
                    handle_function(member, member, name, SymbolKind::Method, class_ctx, b);
                } else {
                    walk_children(member, class_ctx, b);
                }
            }
            "field_definition" => {
                let name = member
                    .child_by_field_name("property")
                    .map(|n| b.text(n))
                    .unwrap_or_default();
                let value = member.child_by_field_name("value");
                match value {
                    Some(value) if is_function_value(value.kind()) && is_plain_member_name(&name) => {
                        handle_function(member, value, name, SymbolKind::Method, class_ctx, b);
                    }
                    Some(value) => walk_node(value, class_ctx, b),
                    None => {}
                }
            }
            _ => walk_node(member, class_ctx, b),
        }
    }
}

fn is_plain_member_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('[') && !name.starts_with('"') && !name.starts_with('\'')
}

fn handle_declaration(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let value = declarator.child_by_field_name("value");
        if let Some(value) = value {
            if name_node.kind() == "identifier" && is_function_value(value.kind()) {
                let name = b.text(name_node);
                handle_function(declarator, value, name, SymbolKind::Function, ctx, b);
                continue;
            }
            if ctx.at_module_level && handle_require(name_node, value, b) {
                continue;
            }
        }
        if ctx.at_module_level && name_node.kind() == "identifier" {
            let name = b.text(name_node);
            if !name.is_empty() {
                b.push_node(ctx.scope, SymbolKind::Variable, name, declarator, None);
            }
        }
        if let Some(value) = value {
            walk_node(value, ctx, b);
        }
    }
}

/// `const x = require('./m')` and `const { a, b: c } = require('./m')`.
fn handle_require(binding: Node<'_>, value: Node<'_>, b: &mut Builder<'_>) -> bool {
    if value.kind() != "call_expression" {
        return false;
    }
    let is_require = value
        .child_by_field_name("function")
        .is_some_and(|f| b.text(f) == "require");
    if !is_require {
        return false;
    }
    let Some(module) = value
        .child_by_field_name("arguments")
        .and_then(|args| args.named_child(0))
        .filter(|arg| arg.kind() == "string")
        .and_then(|arg| unquote_string_literal(&b.text(arg)))
    else {
        return false;
    };
    let line = start_line(value);
    match binding.kind() {
        "identifier" => {
            let alias = b.text(binding);
            b.import(&module, module_stem(&module), Some(alias), line);
        }
        "object_pattern" => {
            let mut cursor = binding.walk();
            for prop in binding.named_children(&mut cursor) {
                match prop.kind() {
                    "shorthand_property_identifier_pattern" => {
                        let name = b.text(prop);
                        b.import(&module, name, None, line);
                    }
                    "pair_pattern" => {
                        let name = prop.child_by_field_name("key").map(|n| b.text(n));
                        let alias = prop.child_by_field_name("value").map(|n| b.text(n));
                        if let Some(name) = name {
                            b.import(&module, name, alias, line);
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => return false,
    }
    true
}

fn record_call(node: Node<'_>, ctx: Context, b: &mut Builder<'_>) {
    let Some(target) = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))
    else {
        return;
    };
    let callee = b.text(target);
    if !is_simple_call_target(&callee) {
        return;
    }
    b.output.calls.push(CallInput {
        source: ctx.owner,
        callee,
        line: start_line(node),
    });
}

fn handle_import(node: Node<'_>, b: &mut Builder<'_>) {
    let Some(module) = node
        .child_by_field_name("source")
        .and_then(|n| unquote_string_literal(&b.text(n)))
    else {
        return;
    };
    if module.is_empty() {
        return;
    }
    let line = start_line(node);
    let mut cursor = node.walk();
    let clause = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "import_clause");
    let Some(clause) = clause else {
        // side-effect import
        b.import(&module, module_stem(&module), None, line);
        return;
    };
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                let name = b.text(child);
                b.import(&module, name, None, line);
            }
            "namespace_import" => {
                let alias = child.named_child(0).map(|n| b.text(n));
                b.import(&module, module_stem(&module), alias, line);
            }
            "named_imports" => {
                let mut spec_cursor = child.walk();
                for spec in child.named_children(&mut spec_cursor) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let Some(name) = spec.child_by_field_name("name").map(|n| b.text(n)) else {
                        continue;
                    };
                    let alias = spec.child_by_field_name("alias").map(|n| b.text(n));
                    b.import(&module, name, alias, line);
                }
            }
            _ => {}
        }
    }
}

fn extract_signature(node: Node<'_>, source: &str) -> Option<String> {
    let raw = match node.child_by_field_name("parameters") {
        Some(params) => node_text(params, source),
        None => format!("({})", node_text(node.child_by_field_name("parameter")?, source)),
    };
    if raw.is_empty() {
        return None;
    }
    Some(util::truncate_str_bytes(
        &util::squash_whitespace(&raw),
        MAX_SIGNATURE_BYTES,
    ))
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' || first == '`' {
        let last = trimmed.chars().last()?;
        if last == first {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    None
}

/// Last path segment without its extension: `./lib/utils.js` -> `utils`.
fn module_stem(specifier: &str) -> String {
    let trimmed = specifier.trim_end_matches('/');
    Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(rel_path: &str, source: &str) -> ExtractedFile {
        JavascriptExtractor::new()
            .unwrap()
            .extract(rel_path, source)
            .unwrap()
    }

    #[test]
    fn extracts_functions_classes_and_methods() {
        let source = "\
export function parse(text) {
  return tokenize(text);
}

export class Store {
  save(item) {
    this.validate(item);
  }
  validate = (item) => check(item);
}

const format = (value) => String(value);
const LIMIT = 10;
";
        let file = extract("web/store.js", source);
        let symbols: Vec<(&str, &str, Option<TempId>)> = file
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind.as_str(), s.parent))
            .collect();
        assert_eq!(
            symbols,
            vec![
                ("store", "module", None),
                ("parse", "function", Some(0)),
                ("Store", "class", Some(0)),
                ("save", "method", Some(2)),
                ("validate", "method", Some(2)),
                ("format", "function", Some(0)),
                ("LIMIT", "variable", Some(0)),
            ]
        );
        assert_eq!(file.symbols[1].signature.as_deref(), Some("(text)"));

        let calls: Vec<(TempId, &str)> = file
            .calls
            .iter()
            .map(|c| (c.source, c.callee.as_str()))
            .collect();
        assert_eq!(
            calls,
            vec![
                (1, "tokenize"),
                (3, "this.validate"),
                (4, "check"),
                (5, "String"),
            ]
        );
    }

    #[test]
    fn callbacks_attribute_calls_to_enclosing_symbol() {
        let source = "\
function main() {
  items.forEach((item) => { render(item); });
}
setup();
";
        let file = extract("app.js", source);
        let calls: Vec<(TempId, &str, i64)> = file
            .calls
            .iter()
            .map(|c| (c.source, c.callee.as_str(), c.line))
            .collect();
        assert_eq!(
            calls,
            vec![(1, "items.forEach", 2), (1, "render", 2), (0, "setup", 4)]
        );
    }

    #[test]
    fn parses_import_forms() {
        let source = "\
import helper from './utils.js';
import { parse, format as fmt } from '../lib/text';
import * as api from './api';
import './polyfill';
const fs = require('fs');
const { join } = require('./paths');
";
        let file = extract("web/app.js", source);
        let imports: Vec<(&str, &str, Option<&str>)> = file
            .imports
            .iter()
            .map(|i| (i.module.as_str(), i.name.as_str(), i.binding.as_deref()))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("./utils.js", "helper", None),
                ("../lib/text", "parse", None),
                ("../lib/text", "format", Some("fmt")),
                ("./api", "api", Some("api")),
                ("./polyfill", "polyfill", None),
                ("fs", "fs", Some("fs")),
                ("./paths", "join", None),
            ]
        );
        assert!(file.symbols.iter().all(|s| s.name != "fs" && s.name != "join"));
    }

    #[test]
    fn candidates_resolve_relative_specifiers() {
        let extractor = JavascriptExtractor::new().unwrap();
        assert_eq!(
            extractor.import_candidates("web/app.js", "./utils.js", "helper"),
            vec!["web/utils.js"]
        );
        assert_eq!(
            extractor.import_candidates("web/app.js", "../lib/text", "parse"),
            vec![
                "lib/text.js",
                "lib/text.jsx",
                "lib/text.mjs",
                "lib/text.cjs",
                "lib/text/index.js",
            ]
        );
        assert!(extractor.import_candidates("web/app.js", "react", "useState").is_empty());
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = JavascriptExtractor::new()
            .unwrap()
            .extract("bad.js", "function (\n")
            .unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
    }
}
