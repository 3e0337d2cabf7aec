//! GB-002: aDOT graph parsing.
//!
//! Reads the brace-delimited body of a solver graph:
//! - `ID [name=..., predicate=..., k=v]` declares a node
//! - `NAME [module=..., entry_func=...]` binds a function name
//! - `A -> B [edge=..., on_predicate_value=true|false]` declares an edge
//!
//! Lines outside the body are header material. Parsing fails closed: the
//! first bad line aborts with its line number.

use super::error::CompileError;
use super::types::*;
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:strict\s+)?(?:di)?graph\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex")
});

static EDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*->\s*(\d+)\s*(?:\[(.*)\])?\s*;?$").expect("valid regex")
});

static DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)\s*(?:\[(.*)\])?\s*;?$").expect("valid regex")
});

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// An edge waiting for both endpoints to be declared.
struct PendingEdge {
    source: u32,
    target: u32,
    edge: String,
    on_predicate_value: Option<bool>,
    props: IndexMap<String, String>,
    line: usize,
}

/// Parse an aDOT file from disk.
pub fn parse_graph_file(path: &Path) -> Result<ParsedGraph, CompileError> {
    let content = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    parse_graph(&content)
}

/// Program name from the header, without parsing the body.
pub fn peek_program_name(text: &str) -> Option<String> {
    let mut name = None;
    for line in text.lines().map(str::trim) {
        if let Some(caps) = HEADER_RE.captures(line) {
            name = Some(caps[1].to_string());
        }
        if line.contains('{') {
            break;
        }
    }
    name
}

/// Parse an aDOT graph from a string.
pub fn parse_graph(text: &str) -> Result<ParsedGraph, CompileError> {
    let mut name = None;
    let mut nodes: Vec<Node> = Vec::new();
    let mut seen: FxHashMap<u32, usize> = FxHashMap::default();
    let mut lookup = FunctionLookup::new();
    let mut pending: Vec<PendingEdge> = Vec::new();

    let mut inside_body = false;
    let mut closed = false;
    let mut last_line = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if !inside_body {
            if let Some(caps) = HEADER_RE.captures(line) {
                name = Some(caps[1].to_string());
            }
            if line.contains('{') {
                inside_body = true;
            }
            continue;
        }

        if line.starts_with("//") {
            continue;
        }
        if closes_body(line) {
            closed = true;
            break;
        }

        if let Some(caps) = EDGE_RE.captures(line) {
            let source = parse_id(&caps[1], line_no)?;
            let target = parse_id(&caps[2], line_no)?;
            let mut props = parse_props(caps.get(3).map_or("", |m| m.as_str()), line_no)?;
            let edge = props
                .shift_remove("edge")
                .ok_or_else(|| CompileError::malformed(line_no, "edge has no `edge` property"))?;
            let on_predicate_value = match props.shift_remove("on_predicate_value") {
                Some(v) => Some(parse_bool(&v, line_no)?),
                None => None,
            };
            if let Some(entry_func) = props.shift_remove("entry_func") {
                let binding = FunctionBinding {
                    entry_func,
                    module: props.shift_remove("module"),
                    line: line_no,
                };
                bind(&mut lookup, &edge, binding)?;
            }
            pending.push(PendingEdge {
                source,
                target,
                edge,
                on_predicate_value,
                props,
                line: line_no,
            });
        } else if let Some(caps) = DECL_RE.captures(line) {
            let ident = &caps[1];
            let mut props = parse_props(caps.get(2).map_or("", |m| m.as_str()), line_no)?;
            if ident.bytes().all(|b| b.is_ascii_digit()) {
                let id = parse_id(ident, line_no)?;
                if let Some(first) = seen.insert(id, line_no) {
                    return Err(CompileError::malformed(
                        line_no,
                        format!("node {} already declared at line {}", id, first),
                    ));
                }
                let node_name = props
                    .shift_remove("name")
                    .or_else(|| props.shift_remove("label"))
                    .unwrap_or_else(|| id.to_string());
                nodes.push(Node {
                    id,
                    tag: NodeTag::from_name(&node_name),
                    name: node_name,
                    children: Vec::new(),
                    edges: Vec::new(),
                    predicate: props.shift_remove("predicate"),
                    props,
                    line: line_no,
                });
            } else {
                let entry_func = props.shift_remove("entry_func").ok_or_else(|| {
                    CompileError::malformed(
                        line_no,
                        format!("`{}` is neither a node nor a function binding", ident),
                    )
                })?;
                let binding = FunctionBinding {
                    entry_func,
                    module: props.shift_remove("module"),
                    line: line_no,
                };
                bind(&mut lookup, ident, binding)?;
            }
        } else {
            return Err(CompileError::malformed(
                line_no,
                format!("unrecognized declaration `{}`", line),
            ));
        }
    }

    let eof = last_line.max(1);
    if !inside_body {
        return Err(CompileError::malformed(eof, "graph body never opens with `{`"));
    }
    if !closed {
        return Err(CompileError::malformed(eof, "graph body is not closed with `}`"));
    }

    // Arena in ascending id order
    nodes.sort_by_key(|n| n.id);
    let ids: FxHashMap<u32, NodeIndex> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id, NodeIndex(i)))
        .collect();

    for p in pending {
        let source = *ids.get(&p.source).ok_or_else(|| {
            CompileError::malformed(p.line, format!("edge from undeclared node {}", p.source))
        })?;
        let target = *ids.get(&p.target).ok_or_else(|| {
            CompileError::malformed(p.line, format!("edge to undeclared node {}", p.target))
        })?;
        let node = &mut nodes[source.0];
        node.children.push(target);
        node.edges.push(Edge {
            edge: p.edge,
            target,
            on_predicate_value: p.on_predicate_value,
            props: p.props,
            line: p.line,
        });
    }

    let entry = find_tagged(&nodes, NodeTag::Input, "INPUT")?;
    let terminal = find_tagged(&nodes, NodeTag::Finalized, "FINALIZED")?;

    Ok(ParsedGraph {
        name,
        nodes,
        lookup,
        entry,
        terminal,
        ids,
    })
}

fn parse_id(text: &str, line: usize) -> Result<u32, CompileError> {
    text.parse::<u32>()
        .map_err(|_| CompileError::malformed(line, format!("node id `{}` out of range", text)))
}

fn parse_bool(text: &str, line: usize) -> Result<bool, CompileError> {
    match text {
        "true" | "True" | "TRUE" | "1" => Ok(true),
        "false" | "False" | "FALSE" | "0" => Ok(false),
        other => Err(CompileError::malformed(
            line,
            format!("on_predicate_value must be true or false, got `{}`", other),
        )),
    }
}

/// True when the line holds a `}` outside any quoted value.
fn closes_body(line: &str) -> bool {
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return true,
            _ => {}
        }
    }
    false
}

/// Split `k=v, k="v, w"` into an ordered map.
fn parse_props(text: &str, line: usize) -> Result<IndexMap<String, String>, CompileError> {
    let mut props = IndexMap::new();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(CompileError::malformed(line, "unterminated quoted value"));
    }
    parts.push(current);

    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| CompileError::malformed(line, format!("property `{}` has no value", part)))?;
        let key = key.trim();
        if !KEY_RE.is_match(key) {
            return Err(CompileError::malformed(
                line,
                format!("invalid property key `{}`", key),
            ));
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        if props.insert(key.to_string(), value.to_string()).is_some() {
            return Err(CompileError::malformed(
                line,
                format!("property `{}` given twice", key),
            ));
        }
    }
    Ok(props)
}

/// Register a binding; identical re-bindings are accepted, conflicting ones are not.
fn bind(lookup: &mut FunctionLookup, name: &str, binding: FunctionBinding) -> Result<(), CompileError> {
    if let Some(existing) = lookup.get(name) {
        if existing.entry_func == binding.entry_func && existing.module == binding.module {
            return Ok(());
        }
        return Err(CompileError::malformed(
            binding.line,
            format!(
                "`{}` already bound to `{}` at line {}",
                name, existing.entry_func, existing.line
            ),
        ));
    }
    lookup.insert(name.to_string(), binding);
    Ok(())
}

fn find_tagged(nodes: &[Node], tag: NodeTag, label: &'static str) -> Result<NodeIndex, CompileError> {
    let mut found: Option<(NodeIndex, u32)> = None;
    for (i, node) in nodes.iter().enumerate() {
        if node.tag != tag {
            continue;
        }
        if let Some((_, first)) = found {
            return Err(CompileError::DuplicateTag {
                tag: label,
                first,
                second: node.id,
            });
        }
        found = Some((NodeIndex(i), node.id));
    }
    found
        .map(|(idx, _)| idx)
        .ok_or(CompileError::MissingEntryOrTerminal { tag: label })
}
