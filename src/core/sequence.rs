//! GB-005: Call-sequence construction.
//!
//! Walks nodes in ascending id order and their edges in declaration order,
//! producing one CallRecord per edge. A node with three outgoing edges yields
//! three records, one per branch instantiation of the dispatch.

use super::error::{CompileError, FunctionRole};
use super::profile::Profile;
use super::types::*;

/// Build the ordered call sequence for a parsed graph.
pub fn build_call_sequence(
    graph: &ParsedGraph,
    profile: &Profile,
) -> Result<Vec<CallRecord>, CompileError> {
    let mut records = Vec::new();

    for (i, node) in graph.nodes.iter().enumerate() {
        for edge in &node.edges {
            let processor = resolve(graph, profile, &edge.edge, FunctionRole::Processor, edge.line)?;

            let (predicate, gate) = match edge.on_predicate_value {
                Some(value) => {
                    let key = node.predicate.as_deref().ok_or_else(|| {
                        CompileError::malformed(
                            edge.line,
                            format!(
                                "edge `{}` is gated but node {} declares no predicate",
                                edge.edge, node.id
                            ),
                        )
                    })?;
                    let predicate = resolve(graph, profile, key, FunctionRole::Predicate, edge.line)?;
                    (predicate, Gate::from_declared(Some(value)))
                }
                None => {
                    let placeholder = FunctionRef {
                        name: profile.placeholder_predicate.clone(),
                        module: processor.module.clone(),
                    };
                    (placeholder, Gate::Always)
                }
            };

            records.push(CallRecord {
                node_id: node.id,
                node: NodeIndex(i),
                target: edge.target,
                processor,
                predicate,
                gate,
                terminal: edge.target == graph.terminal,
                in_cycle: false,
            });
        }
    }

    Ok(records)
}

/// Look up an edge/predicate name, falling back only when the profile allows it.
fn resolve(
    graph: &ParsedGraph,
    profile: &Profile,
    key: &str,
    role: FunctionRole,
    line: usize,
) -> Result<FunctionRef, CompileError> {
    match graph.lookup.get(key) {
        Some(binding) => Ok(FunctionRef {
            name: binding.entry_func.clone(),
            module: binding
                .module
                .clone()
                .unwrap_or_else(|| profile.default_module.clone()),
        }),
        None if profile.allow_unresolved => Ok(FunctionRef {
            name: profile.unresolved_name.clone(),
            module: profile.default_module.clone(),
        }),
        None => Err(CompileError::UnresolvedFunctionName {
            name: key.to_string(),
            role,
            line,
        }),
    }
}
