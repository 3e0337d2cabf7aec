//! GB-007: Segment partitioning and resource collection.
//!
//! Contiguous runs of in-cycle records become one loop each; every other
//! record is a straight-line call. The resource collector then walks all
//! segments and keeps the first occurrence of each component load and each
//! processor/predicate pair.

use super::types::*;
use serde::Serialize;

/// Split annotated records into straight and loop segments, order preserved.
pub fn partition(records: &[CallRecord]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut i = 0;

    while i < records.len() {
        if !records[i].in_cycle {
            segments.push(Segment::Straight(records[i].clone()));
            i += 1;
            continue;
        }

        let start = i;
        while i < records.len() && records[i].in_cycle {
            i += 1;
        }
        let body = records[start..i].to_vec();
        let exit_condition = Condition::for_record(exit_record(&body, &records[i..]));
        segments.push(Segment::Loop {
            body,
            exit_condition,
        });
    }

    segments
}

/// Record whose predicate decides the loop exit.
///
/// Last terminal record in the body, else the first terminal record after
/// the run, else the body's last record.
fn exit_record<'a>(body: &'a [CallRecord], rest: &'a [CallRecord]) -> &'a CallRecord {
    body.iter()
        .rev()
        .find(|r| r.terminal)
        .or_else(|| rest.iter().find(|r| r.terminal))
        .unwrap_or(&body[body.len() - 1])
}

/// Move the entry node's straight calls to the front when the sequence
/// does not already start there. Relative order is kept on both sides.
pub fn normalize_head(segments: Vec<Segment>, entry: NodeIndex) -> Vec<Segment> {
    let starts_at_entry = match segments.first() {
        Some(Segment::Straight(r)) => r.node == entry,
        Some(Segment::Loop { .. }) => false,
        None => return segments,
    };
    if starts_at_entry {
        return segments;
    }

    let (head, tail): (Vec<Segment>, Vec<Segment>) = segments
        .into_iter()
        .partition(|s| matches!(s, Segment::Straight(r) if r.node == entry));
    head.into_iter().chain(tail).collect()
}

/// Deduplicated load and resolve statements for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resources {
    /// Component names, first occurrence first
    pub loads: ResourceSet<String>,

    /// Processor/predicate pairs, first occurrence first
    pub resolutions: ResourceSet<ResolvePair>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the components and entry points one record needs.
    pub fn add_record(&mut self, record: &CallRecord) {
        for module in [&record.processor.module, &record.predicate.module] {
            self.loads.insert(module.clone());
        }
        self.resolutions.insert(ResolvePair {
            processor: record.processor.clone(),
            predicate: record.predicate.clone(),
        });
    }
}

/// Walk every record of every segment in order.
pub fn collect_resources(segments: &[Segment]) -> Resources {
    let mut resources = Resources::new();
    for record in segments.iter().flat_map(|s| s.records()) {
        resources.add_record(record);
    }
    resources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fref(name: &str, module: &str) -> FunctionRef {
        FunctionRef {
            name: name.to_string(),
            module: module.to_string(),
        }
    }

    fn rec(node: usize, proc_name: &str, gate: Gate, terminal: bool, in_cycle: bool) -> CallRecord {
        CallRecord {
            node_id: node as u32 + 1,
            node: NodeIndex(node),
            target: NodeIndex(node + 1),
            processor: fref(proc_name, "jugr"),
            predicate: fref(&format!("pred_of_{}", node), "jugr"),
            gate,
            terminal,
            in_cycle,
        }
    }

    #[test]
    fn test_gb007_all_straight() {
        let records = vec![
            rec(0, "a", Gate::Always, false, false),
            rec(1, "b", Gate::Always, true, false),
        ];
        let segments = partition(&records);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| !s.is_loop()));
        assert_eq!(segments[1].records()[0].processor.name, "b");
    }

    #[test]
    fn test_gb007_loop_with_terminal_in_body() {
        let records = vec![
            rec(0, "a", Gate::Always, false, false),
            rec(1, "b", Gate::Always, false, true),
            rec(2, "c", Gate::OnTrue, false, true),
            rec(2, "d", Gate::OnFalse, true, true),
        ];
        let segments = partition(&records);
        assert_eq!(segments.len(), 2);
        match &segments[1] {
            Segment::Loop {
                body,
                exit_condition,
            } => {
                assert_eq!(body.len(), 3);
                assert_eq!(exit_condition.predicate.name, "pred_of_2");
                assert!(exit_condition.negated);
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_gb007_exit_from_terminal_after_run() {
        let records = vec![
            rec(1, "b", Gate::Always, false, true),
            rec(2, "c", Gate::OnFalse, false, true),
            rec(2, "d", Gate::OnTrue, true, false),
        ];
        let segments = partition(&records);
        assert_eq!(segments.len(), 2);
        match &segments[0] {
            Segment::Loop { exit_condition, .. } => {
                assert_eq!(exit_condition.predicate.name, "pred_of_2");
                // gated on true: not negated
                assert!(!exit_condition.negated);
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_gb007_exit_falls_back_to_last_body_record() {
        let records = vec![
            rec(1, "b", Gate::Always, false, true),
            rec(3, "c", Gate::Always, false, true),
        ];
        let segments = partition(&records);
        match &segments[0] {
            Segment::Loop { exit_condition, .. } => {
                assert_eq!(exit_condition.predicate.name, "pred_of_3");
                assert!(exit_condition.negated);
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_gb007_two_separate_loops() {
        let records = vec![
            rec(1, "a", Gate::Always, false, true),
            rec(2, "b", Gate::Always, false, false),
            rec(3, "c", Gate::Always, false, true),
        ];
        let segments = partition(&records);
        let kinds: Vec<bool> = segments.iter().map(|s| s.is_loop()).collect();
        assert_eq!(kinds, vec![true, false, true]);
    }

    #[test]
    fn test_gb007_normalize_head_moves_entry_calls() {
        let records = vec![
            rec(1, "b", Gate::Always, false, false),
            rec(0, "a1", Gate::Always, false, false),
            rec(2, "c", Gate::Always, false, false),
            rec(0, "a2", Gate::Always, false, false),
        ];
        let segments = normalize_head(partition(&records), NodeIndex(0));
        let order: Vec<&str> = segments
            .iter()
            .map(|s| s.records()[0].processor.name.as_str())
            .collect();
        assert_eq!(order, vec!["a1", "a2", "b", "c"]);
    }

    #[test]
    fn test_gb007_normalize_head_noop_when_entry_first() {
        let records = vec![
            rec(0, "a", Gate::Always, false, false),
            rec(1, "b", Gate::Always, false, false),
            rec(0, "a2", Gate::Always, false, false),
        ];
        let before = partition(&records);
        let after = normalize_head(before.clone(), NodeIndex(0));
        assert_eq!(before, after);
        assert!(normalize_head(Vec::new(), NodeIndex(0)).is_empty());
    }

    #[test]
    fn test_gb007_resources_dedup() {
        let mut a = rec(0, "f", Gate::Always, false, false);
        a.predicate = fref("p", "preds");
        let b = a.clone();
        let mut c = rec(1, "f", Gate::Always, false, false);
        c.predicate = fref("q", "preds");
        let segments = partition(&[a, b, c]);
        let resources = collect_resources(&segments);
        let loads: Vec<&String> = resources.loads.iter().collect();
        assert_eq!(loads, vec!["jugr", "preds"]);
        assert_eq!(resources.resolutions.len(), 2);
    }

    #[test]
    fn test_gb007_resources_include_loop_bodies() {
        let mut looped = rec(1, "g", Gate::Always, false, true);
        looped.processor.module = "inner".to_string();
        let records = vec![rec(0, "f", Gate::Always, false, false), looped];
        let resources = collect_resources(&partition(&records));
        assert!(resources.loads.contains(&"inner".to_string()));
        assert_eq!(resources.resolutions.len(), 2);
    }
}
