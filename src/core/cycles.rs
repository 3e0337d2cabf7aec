//! GB-006: Cycle detection over the flattened call sequence.
//!
//! A child of node N that already has a record at or before N's last record
//! is a back-reference. Records from the earliest back-referenced position
//! through N's last record form a loop body, except entry-node records and
//! terminal records not gated on `false`.

use super::types::*;
use rustc_hash::FxHashMap;

/// A detected loop range, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CycleRange {
    /// Node whose child closes the loop
    pub node_id: u32,

    /// Node the back-reference points at
    pub target_id: u32,

    pub start: usize,
    pub end: usize,
}

/// First and last record position per node.
fn record_spans(records: &[CallRecord]) -> FxHashMap<NodeIndex, (usize, usize)> {
    let mut spans: FxHashMap<NodeIndex, (usize, usize)> = FxHashMap::default();
    for (pos, r) in records.iter().enumerate() {
        spans
            .entry(r.node)
            .and_modify(|span| span.1 = pos)
            .or_insert((pos, pos));
    }
    spans
}

/// Back-reference for one node, if any.
///
/// Returns `None` when no child of the node has a record at or before the
/// node's last record, so there is no loop for this node.
fn back_reference(
    graph: &ParsedGraph,
    spans: &FxHashMap<NodeIndex, (usize, usize)>,
    node: NodeIndex,
) -> Option<CycleRange> {
    if node == graph.entry {
        return None;
    }
    let &(_, last) = spans.get(&node)?;

    // Earliest back-reference wins: widest loop body
    let (start, target) = graph
        .node(node)
        .children
        .iter()
        .filter_map(|child| {
            spans
                .get(child)
                .map(|&(first, _)| (first, *child))
                .filter(|&(first, _)| first <= last)
        })
        .min_by_key(|&(first, _)| first)?;

    Some(CycleRange {
        node_id: graph.node(node).id,
        target_id: graph.node(target).id,
        start,
        end: last,
    })
}

/// Whether a record inside a cycle range belongs to the loop body.
fn joins_loop(graph: &ParsedGraph, record: &CallRecord) -> bool {
    if record.node == graph.entry {
        return false;
    }
    !record.terminal || record.gate == Gate::OnFalse
}

/// Mark `in_cycle` on every record covered by a back-reference.
/// Returns the detected ranges in node order.
pub fn detect_cycles(graph: &ParsedGraph, records: &mut [CallRecord]) -> Vec<CycleRange> {
    let spans = record_spans(records);
    let mut ranges = Vec::new();

    for i in 0..graph.nodes.len() {
        if let Some(range) = back_reference(graph, &spans, NodeIndex(i)) {
            for record in &mut records[range.start..=range.end] {
                if joins_loop(graph, record) {
                    record.in_cycle = true;
                }
            }
            ranges.push(range);
        }
    }

    ranges
}
