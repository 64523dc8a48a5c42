//! Turns a parsed source file into an ordered list of [`ContextFragment`]s.

use std::collections::HashSet;

use tree_sitter::{Node, Tree};

use crate::adapter::{CaptureMatch, CaptureTag, LanguageAdapter};
use crate::fragment::{ContextFragment, FragmentKind};
use crate::languages::DeclarationKind;

const DEFAULT_CONTEXT_THRESHOLD: usize = 10;
const DEFAULT_CONTEXT_PADDING: usize = 5;

/// A comment node reduced to its line span and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSpan {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

impl CommentSpan {
    fn from_node(node: Node<'_>, source: &str) -> Self {
        Self {
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            text: node_text(node, source).to_owned(),
        }
    }
}

/// The node a declaration fragment is cut from, and the node that names it.
///
/// They differ only for export wrappers: the wrapper spans the fragment while the
/// wrapped declaration determines kind and identifier.
#[derive(Debug, Clone, Copy)]
pub struct Governing<'tree> {
    pub node: Node<'tree>,
    pub declaration: Node<'tree>,
}

/// Resolve the governing node of a capture match.
///
/// Export wrappers win; otherwise a name paired with a body or value resolves to the
/// name's parent. Anything else is a partial capture and yields `None`.
#[must_use]
pub fn resolve_governing<'tree>(m: &CaptureMatch<'tree>) -> Option<Governing<'tree>> {
    if let Some(export) = m.get(CaptureTag::Export) {
        return Some(Governing {
            node: export,
            declaration: m.get(CaptureTag::Exported).unwrap_or(export),
        });
    }
    let name = m.get(CaptureTag::Name)?;
    if !(m.has(CaptureTag::Body) || m.has(CaptureTag::Value)) {
        return None;
    }
    let parent = name.parent()?;
    Some(Governing {
        node: parent,
        declaration: parent,
    })
}

/// Comments ending one or two lines above `start_line`, joined in source order.
#[must_use]
pub fn nearby_comments(comments: &[CommentSpan], start_line: usize) -> String {
    comments
        .iter()
        .filter(|c| c.end_line < start_line && start_line - c.end_line <= 2)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub struct ContextExtractor {
    /// Primary fragments longer than this many lines also get a context window.
    context_threshold: usize,
    context_padding: usize,
}

impl Default for ContextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_THRESHOLD, DEFAULT_CONTEXT_PADDING)
    }
}

impl ContextExtractor {
    #[must_use]
    pub fn new(context_threshold: usize, context_padding: usize) -> Self {
        Self {
            context_threshold,
            context_padding,
        }
    }

    /// Extract fragments from `source`. The last fragment is always the whole file.
    #[must_use]
    pub fn extract(
        &self,
        source: &str,
        path: &str,
        adapter: &dyn LanguageAdapter,
    ) -> Vec<ContextFragment> {
        let mut fragments = Vec::new();
        match adapter.parse(source) {
            Some(tree) => self.extract_structural(source, &tree, adapter, &mut fragments),
            None => tracing::debug!(
                path,
                language = %adapter.kind(),
                "parse failed, keeping whole-file fragment only"
            ),
        }
        fragments.push(ContextFragment::whole_file(source));
        fragments
    }

    fn extract_structural(
        &self,
        source: &str,
        tree: &Tree,
        adapter: &dyn LanguageAdapter,
        out: &mut Vec<ContextFragment>,
    ) {
        let matches = adapter.capture(tree.root_node(), source);

        let mut comments: Vec<CommentSpan> = matches
            .iter()
            .filter_map(|m| m.get(CaptureTag::Comment))
            .map(|n| CommentSpan::from_node(n, source))
            .collect();
        comments.sort_by_key(|c| c.start_line);

        let covered = exported_nodes(&matches, adapter);
        let mut seen = HashSet::new();
        let mut module_facts_done = false;

        for m in &matches {
            let Some(governing) = resolve_governing(m) else {
                continue;
            };
            if !m.has(CaptureTag::Export) && covered.contains(&governing.node.id()) {
                continue;
            }
            if !seen.insert(governing.node.id()) {
                continue;
            }
            let Some(kind) = adapter.declaration_kind(governing.declaration.kind()) else {
                continue;
            };

            let node = governing.node;
            let identifier = adapter.name_of(governing.declaration, source);
            let start_line = node.start_position().row;
            let end_line = node.end_position().row;

            let leading = nearby_comments(&comments, start_line);
            let text = if leading.is_empty() {
                node_text(node, source).to_owned()
            } else {
                format!("{leading}\n{}", node_text(node, source))
            };
            let primary_lines = text.lines().count();
            out.push(ContextFragment::new(
                FragmentKind::Declaration(kind),
                text,
                identifier.as_str(),
                start_line,
                end_line,
            ));

            if kind.is_callable_scope() {
                let body = m
                    .get(CaptureTag::Body)
                    .or_else(|| governing.declaration.child_by_field_name("body"));
                if let Some(body) = body {
                    summarize_body(body, source, adapter, &identifier, start_line, end_line, out);
                }
            }

            if let Some((parent_kind, parent)) = enclosing_scope(node, adapter) {
                out.push(ContextFragment::new(
                    FragmentKind::Hierarchy,
                    format!(
                        "{kind} {identifier} is defined in {parent_kind} {}",
                        adapter.name_of(parent, source)
                    ),
                    identifier.as_str(),
                    start_line,
                    end_line,
                ));
            }

            if !module_facts_done {
                module_facts_done = true;
                module_facts(&matches, source, adapter, out);
            }

            if primary_lines > self.context_threshold && kind.wants_context_window() {
                out.push(self.context_window(source, kind, &identifier, start_line, end_line));
            }
        }
    }

    fn context_window(
        &self,
        source: &str,
        kind: DeclarationKind,
        identifier: &str,
        start_line: usize,
        end_line: usize,
    ) -> ContextFragment {
        let lines: Vec<&str> = source.split('\n').collect();
        let last = lines.len().saturating_sub(1);
        let from = start_line.saturating_sub(self.context_padding).min(last);
        let to = end_line.saturating_add(self.context_padding).min(last);
        ContextFragment::new(
            FragmentKind::Context(kind),
            lines[from..=to].join("\n"),
            identifier,
            from,
            to,
        )
    }
}

/// Node ids claimed by export wrappers, so the plain declaration match is skipped.
fn exported_nodes(matches: &[CaptureMatch<'_>], adapter: &dyn LanguageAdapter) -> HashSet<usize> {
    let mut covered = HashSet::new();
    for m in matches.iter().filter(|m| m.has(CaptureTag::Export)) {
        let Some(exported) = m.get(CaptureTag::Exported) else {
            continue;
        };
        covered.insert(exported.id());
        if adapter.declaration_kind(exported.kind()) == Some(DeclarationKind::Variable) {
            let mut cursor = exported.walk();
            covered.extend(exported.named_children(&mut cursor).map(|c| c.id()));
        }
    }
    covered
}

fn summarize_body(
    body: Node<'_>,
    source: &str,
    adapter: &dyn LanguageAdapter,
    identifier: &str,
    start_line: usize,
    end_line: usize,
    out: &mut Vec<ContextFragment>,
) {
    let mut calls = UniqueList::default();
    let mut conditions = Vec::new();
    let mut handlers = Vec::new();

    for m in adapter.capture(body, source) {
        if let Some(callee) = m.get(CaptureTag::CalledFunction) {
            calls.push(node_text(callee, source));
        } else if let (Some(object), Some(property)) =
            (m.get(CaptureTag::Object), m.get(CaptureTag::Property))
        {
            calls.push(&format!(
                "{}.{}",
                node_text(object, source),
                node_text(property, source)
            ));
        }
        if let Some(condition) = m.get(CaptureTag::IfCondition) {
            conditions.push(format!("if ({})", strip_outer_parens(condition, source)));
        }
        if let Some(param) = m.get(CaptureTag::ErrorParam) {
            handlers.push(format!("try/catch({})", node_text(param, source)));
        }
    }

    let summaries = [
        (FragmentKind::FunctionCalls, "calls", calls.items.join(", ")),
        (FragmentKind::ControlFlow, "control flow", conditions.join("; ")),
        (FragmentKind::ErrorHandling, "error handling", handlers.join("; ")),
    ];
    for (kind, label, listed) in summaries {
        if listed.is_empty() {
            continue;
        }
        out.push(ContextFragment::new(
            kind,
            format!("Function {identifier} {label}: {listed}"),
            identifier,
            start_line,
            end_line,
        ));
    }
}

fn enclosing_scope<'tree>(
    node: Node<'tree>,
    adapter: &dyn LanguageAdapter,
) -> Option<(DeclarationKind, Node<'tree>)> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(kind) = adapter
            .declaration_kind(ancestor.kind())
            .filter(|k| k.is_callable_scope())
        {
            return Some((kind, ancestor));
        }
        current = ancestor.parent();
    }
    None
}

/// File-level import and export summaries, both spanning `0,0`.
fn module_facts(
    matches: &[CaptureMatch<'_>],
    source: &str,
    adapter: &dyn LanguageAdapter,
    out: &mut Vec<ContextFragment>,
) {
    let mut imports = UniqueList::default();
    let mut exports = UniqueList::default();
    for m in matches {
        if let Some(src) = m.get(CaptureTag::ImportSource) {
            imports.push(node_text(src, source).trim_matches(['"', '\'', '`']));
        }
        for tag in [CaptureTag::ImportName, CaptureTag::DefaultImport] {
            if let Some(name) = m.get(tag) {
                imports.push(node_text(name, source));
            }
        }
        if let Some(exported) = m.get(CaptureTag::Exported)
            && adapter.is_exportable(exported.kind())
        {
            exports.push(&adapter.name_of(exported, source));
        }
    }

    if !imports.items.is_empty() {
        out.push(ContextFragment::new(
            FragmentKind::Imports,
            format!("Module imports: {}", imports.items.join(", ")),
            "imports",
            0,
            0,
        ));
    }
    if !exports.items.is_empty() {
        out.push(ContextFragment::new(
            FragmentKind::Exports,
            format!("Module exports: {}", exports.items.join(", ")),
            "exports",
            0,
            0,
        ));
    }
}

/// Insertion-ordered set of strings.
#[derive(Default)]
struct UniqueList {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl UniqueList {
    fn push(&mut self, item: &str) {
        if !item.is_empty() && self.seen.insert(item.to_owned()) {
            self.items.push(item.to_owned());
        }
    }
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn strip_outer_parens<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    let text = node_text(node, source);
    if node.kind() != "parenthesized_expression" {
        return text;
    }
    text.strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .map_or(text, str::trim)
}
