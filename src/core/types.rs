//! GB-001: All types of the solver-graph compiler.
//!
//! Node arena, edges, function lookup, call records, segments, resource sets,
//! build locks and compile events. Records and segments derive Serialize so
//! `inspect --json` can dump any pipeline stage.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

// ============================================================================
// Graph
// ============================================================================

/// Position of a node in the arena. Stable for the whole compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeIndex(pub usize);

/// Role of a node in the execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTag {
    /// The unique entry node (`name=INPUT`)
    Input,
    /// The unique terminal node (`name=FINALIZED`)
    Finalized,
    /// Any other stage
    Stage,
}

impl NodeTag {
    /// Classify a node by its declared name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "INPUT" => Self::Input,
            "FINALIZED" => Self::Finalized,
            _ => Self::Stage,
        }
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "INPUT"),
            Self::Finalized => write!(f, "FINALIZED"),
            Self::Stage => write!(f, "stage"),
        }
    }
}

/// A directed transition to a child node.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Function-lookup key of the processor run on this transition
    pub edge: String,

    /// Child node
    pub target: NodeIndex,

    /// Predicate outcome this edge stands for, if gated
    pub on_predicate_value: Option<bool>,

    /// Remaining properties, as declared
    pub props: IndexMap<String, String>,

    /// 1-based source line
    pub line: usize,
}

/// One stage of the solver's execution plan.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: u32,
    pub tag: NodeTag,
    pub name: String,

    /// Targets of the outgoing edges, in declaration order
    pub children: Vec<NodeIndex>,

    pub edges: Vec<Edge>,

    /// Function-lookup key of the node's guard function
    pub predicate: Option<String>,

    /// Remaining properties, as declared
    pub props: IndexMap<String, String>,

    /// 1-based source line
    pub line: usize,
}

/// Entry-point binding for an edge or predicate name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBinding {
    pub entry_func: String,
    pub module: Option<String>,
    pub line: usize,
}

/// Edge/predicate name → entry point. Read-only once parsing finishes.
pub type FunctionLookup = IndexMap<String, FunctionBinding>;

/// Output of the graph parser.
#[derive(Debug, Clone)]
pub struct ParsedGraph {
    /// Program name from a `digraph NAME` header, if any
    pub name: Option<String>,

    /// Node arena, sorted by ascending id
    pub nodes: Vec<Node>,

    pub lookup: FunctionLookup,

    /// The `INPUT` node
    pub entry: NodeIndex,

    /// The `FINALIZED` node
    pub terminal: NodeIndex,

    pub(crate) ids: FxHashMap<u32, NodeIndex>,
}

impl ParsedGraph {
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.0]
    }

    /// Find a node by its declared id.
    pub fn index_of(&self, id: u32) -> Option<NodeIndex> {
        self.ids.get(&id).copied()
    }

    /// Program name, falling back to `solver`.
    pub fn program_name(&self) -> &str {
        self.name.as_deref().unwrap_or("solver")
    }
}

// ============================================================================
// Call sequence
// ============================================================================

/// A resolved entry point inside a loadable component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionRef {
    /// Entry-point name
    pub name: String,

    /// Component (library) exporting it
    pub module: String,
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// Predicate outcome a record was instantiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Ungated edge: the placeholder predicate, always execute
    Always,
    OnTrue,
    OnFalse,
}

impl Gate {
    pub fn from_declared(value: Option<bool>) -> Self {
        match value {
            None => Self::Always,
            Some(true) => Self::OnTrue,
            Some(false) => Self::OnFalse,
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "0"),
            Self::OnTrue => write!(f, "true"),
            Self::OnFalse => write!(f, "false"),
        }
    }
}

/// One branch instantiation of the two-function dispatch: one per edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub node_id: u32,
    pub node: NodeIndex,
    pub target: NodeIndex,
    pub processor: FunctionRef,
    pub predicate: FunctionRef,
    pub gate: Gate,

    /// Edge leads into the `FINALIZED` node
    pub terminal: bool,

    pub in_cycle: bool,
}

/// Loop exit test: the predicate call, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub predicate: FunctionRef,
    pub negated: bool,
}

impl Condition {
    /// Build the condition for a terminal record: negated unless gated on true.
    pub fn for_record(record: &CallRecord) -> Self {
        Self {
            predicate: record.predicate.clone(),
            negated: record.gate != Gate::OnTrue,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.predicate.name)
        } else {
            write!(f, "{}", self.predicate.name)
        }
    }
}

/// Straight-line call or loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Straight(CallRecord),
    Loop {
        body: Vec<CallRecord>,
        exit_condition: Condition,
    },
}

impl Segment {
    /// Records in execution order.
    pub fn records(&self) -> &[CallRecord] {
        match self {
            Self::Straight(r) => std::slice::from_ref(r),
            Self::Loop { body, .. } => body,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Self::Loop { .. })
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Processor/predicate pair resolved together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvePair {
    pub processor: FunctionRef,
    pub predicate: FunctionRef,
}

/// Insertion-ordered set of statement keys. First occurrence wins position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSet<K: Hash + Eq> {
    items: IndexSet<K>,
}

impl<K: Hash + Eq> Default for ResourceSet<K> {
    fn default() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }
}

impl<K: Hash + Eq> ResourceSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key; returns false when it was already present.
    pub fn insert(&mut self, key: K) -> bool {
        self.items.insert(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.items.contains(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.items.iter()
    }
}

impl<K: Hash + Eq + Serialize> Serialize for ResourceSet<K> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

// ============================================================================
// Build lock
// ============================================================================

/// Per-program build lock, written next to the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildLock {
    /// Schema version
    pub schema: String,

    /// Program name
    pub program: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// Graph description that was compiled
    pub graph: String,

    /// BLAKE3 of the graph text
    pub graph_hash: String,

    /// Generated program path
    pub output: String,

    /// BLAKE3 of the generated text
    pub output_hash: String,

    /// BLAKE3 of the emission profile in effect
    #[serde(default)]
    pub profile_hash: Option<String>,

    pub summary: BuildSummary,
}

/// Counts describing one compiled program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub nodes: usize,
    pub records: usize,
    pub loads: usize,
    pub resolutions: usize,
    pub straight: usize,
    pub loops: usize,
}

// ============================================================================
// Compile events
// ============================================================================

/// Event for the JSONL compile log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CompileEvent {
    CompileStarted {
        program: String,
        run_id: String,
        generator_version: String,
    },
    CompileCompleted {
        program: String,
        run_id: String,
        output_hash: String,
        summary: BuildSummary,
        total_seconds: f64,
    },
    CompileFailed {
        program: String,
        run_id: String,
        error: String,
    },
    DriftDetected {
        program: String,
        artifact: String,
        expected_hash: String,
        actual_hash: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: CompileEvent,
}

// ============================================================================
// Tests
// ============================================================================
