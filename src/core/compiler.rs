//! GB-009: Compilation driver.
//!
//! parse → call sequence → cycles → segments → resources → emit, then for
//! file builds: atomic output write → digests → lock → events.

use super::codegen::{self, GENERATOR_VERSION};
use super::cycles::{self, CycleRange};
use super::error::CompileError;
use super::parser;
use super::partition::{self, Resources};
use super::profile::{self, Profile};
use super::sequence;
use super::state;
use super::types::*;
use crate::tripwire::{eventlog, hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Every stage of one in-memory compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub graph: ParsedGraph,

    /// Call records with cycle marks applied
    pub records: Vec<CallRecord>,

    pub cycles: Vec<CycleRange>,
    pub segments: Vec<Segment>,
    pub resources: Resources,

    /// Generated program text
    pub output: String,
}

impl Compilation {
    pub fn summary(&self) -> BuildSummary {
        let loops = self.segments.iter().filter(|s| s.is_loop()).count();
        BuildSummary {
            nodes: self.graph.nodes.len(),
            records: self.records.len(),
            loads: self.resources.loads.len(),
            resolutions: self.resources.resolutions.len(),
            straight: self.segments.len() - loops,
            loops,
        }
    }

    pub fn program(&self) -> &str {
        self.graph.program_name()
    }
}

/// Run the whole pipeline on graph text. Nothing touches the filesystem.
pub fn compile_source(text: &str, profile: &Profile) -> Result<Compilation, CompileError> {
    let graph = parser::parse_graph(text)?;
    let mut records = sequence::build_call_sequence(&graph, profile)?;
    let cycles = cycles::detect_cycles(&graph, &mut records);
    let segments = partition::normalize_head(partition::partition(&records), graph.entry);
    let resources = partition::collect_resources(&segments);
    let output = codegen::emit(&graph, &segments, &resources, profile)?;

    Ok(Compilation {
        graph,
        records,
        cycles,
        segments,
        resources,
        output,
    })
}

/// Configuration for a file build.
pub struct BuildConfig<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub profile: &'a Profile,

    /// Where the build lock and event log live; None skips provenance
    pub state_dir: Option<&'a Path>,
}

/// Outcome of a successful file build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub program: String,
    pub output: PathBuf,
    pub summary: BuildSummary,
    pub graph_hash: String,
    pub output_hash: String,
    pub total_seconds: f64,
}

/// Compile a graph file to an output file without provenance tracking.
pub fn compile_file(input: &Path, output: &Path, profile: &Profile) -> Result<BuildReport, CompileError> {
    build(&BuildConfig {
        input,
        output,
        profile,
        state_dir: None,
    })
}

/// Compile a graph file, write the program atomically, and record the
/// build in the state directory when one is configured.
pub fn build(cfg: &BuildConfig) -> Result<BuildReport, CompileError> {
    let start = Instant::now();

    if let Some(first) = profile::validate_profile(cfg.profile).into_iter().next() {
        return Err(first);
    }

    let text = std::fs::read_to_string(cfg.input).map_err(|e| CompileError::io(cfg.input, e))?;
    let program = parser::peek_program_name(&text).unwrap_or_else(|| "solver".to_string());
    let run_id = eventlog::generate_run_id();

    log_event(
        cfg.state_dir,
        &program,
        CompileEvent::CompileStarted {
            program: program.clone(),
            run_id: run_id.clone(),
            generator_version: GENERATOR_VERSION.to_string(),
        },
    )?;

    let compiled = compile_source(&text, cfg.profile).and_then(|c| {
        state::write_atomic(cfg.output, &c.output)
            .map_err(|e| CompileError::io(cfg.output, e))
            .map(|_| c)
    });
    let compilation = match compiled {
        Ok(c) => c,
        Err(e) => {
            log_event(
                cfg.state_dir,
                &program,
                CompileEvent::CompileFailed {
                    program: program.clone(),
                    run_id,
                    error: e.to_string(),
                },
            )?;
            return Err(e);
        }
    };

    let summary = compilation.summary();
    let graph_hash = hasher::hash_string(&text);
    let output_hash = hasher::hash_string(&compilation.output);

    if let Some(state_dir) = cfg.state_dir {
        let mut lock = state::new_lock(&program, cfg.input, cfg.output, summary.clone());
        lock.graph_hash = graph_hash.clone();
        lock.output_hash = output_hash.clone();
        lock.profile_hash = Some(hasher::hash_profile(cfg.profile).map_err(CompileError::State)?);
        state::save_lock(state_dir, &lock).map_err(CompileError::State)?;
    }

    let total_seconds = start.elapsed().as_secs_f64();
    log_event(
        cfg.state_dir,
        &program,
        CompileEvent::CompileCompleted {
            program: program.clone(),
            run_id,
            output_hash: output_hash.clone(),
            summary: summary.clone(),
            total_seconds,
        },
    )?;

    Ok(BuildReport {
        program,
        output: cfg.output.to_path_buf(),
        summary,
        graph_hash,
        output_hash,
        total_seconds,
    })
}

fn log_event(state_dir: Option<&Path>, program: &str, event: CompileEvent) -> Result<(), CompileError> {
    match state_dir {
        Some(dir) => eventlog::append_event(dir, program, event).map_err(CompileError::State),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROUND_TRIP: &str = r#"
digraph chain
{
    1 [name=INPUT]
    2 [name=stepA]
    3 [name=FINALIZED]
    e1 [module=jugr, entry_func=function_input]
    e2 [module=jugr, entry_func=function_1]
    1 -> 2 [edge=e1]
    2 -> 3 [edge=e2]
}
"#;

    const LOOPED: &str = r#"
digraph looped
{
    1 [name=INPUT]
    2 [name=stepB]
    3 [name=stepA, predicate=p3]
    4 [name=FINALIZED]
    e1 [module=jugr, entry_func=function_1]
    e2 [module=jugr, entry_func=function_2]
    e32 [module=jugr, entry_func=function_32]
    e34 [module=jugr, entry_func=function_34]
    p3 [module=jugr, entry_func=predicate_3]
    1 -> 2 [edge=e1]
    2 -> 3 [edge=e2]
    3 -> 2 [edge=e32, on_predicate_value=true]
    3 -> 4 [edge=e34, on_predicate_value=false]
}
"#;

    #[test]
    fn test_gb009_round_trip_scenario() {
        let c = compile_source(ROUND_TRIP, &Profile::default()).unwrap();
        let summary = c.summary();
        assert_eq!(summary.loads, 1);
        assert_eq!(summary.resolutions, 2);
        assert_eq!(summary.straight, 2);
        assert_eq!(summary.loops, 0);
        let order: Vec<&str> = c
            .segments
            .iter()
            .map(|s| c.graph.node(s.records()[0].node).name.as_str())
            .collect();
        assert_eq!(order, vec!["INPUT", "stepA"]);
    }

    #[test]
    fn test_gb009_round_trip_default_text() {
        let c = compile_source(ROUND_TRIP, &Profile::default()).unwrap();
        assert_eq!(c.output.matches("LoadLibrary(L\"jugr\")").count(), 1);
        assert_eq!(c.output.matches("GetProcAddress").count(), 3);
        let first = c.output.find("F(proc_jugr_function_input").unwrap();
        let second = c.output.find("F(proc_jugr_function_1").unwrap();
        assert!(first < second);
        assert!(c.output.contains("AnyMap m(\"input.aini\");"));
        assert!(c.output.ends_with("\treturn 0;\n}\n"));
    }

    #[test]
    fn test_gb009_loop_scenario() {
        let c = compile_source(LOOPED, &Profile::default()).unwrap();
        assert_eq!(c.summary().loops, 1);
        let (body, exit_condition) = c
            .segments
            .iter()
            .find_map(|s| match s {
                Segment::Loop {
                    body,
                    exit_condition,
                } => Some((body, exit_condition)),
                _ => None,
            })
            .unwrap();
        assert_eq!(exit_condition.predicate.name, "predicate_3");
        assert!(exit_condition.negated);
        let nodes: Vec<u32> = body.iter().map(|r| r.node_id).collect();
        assert_eq!(nodes, vec![2, 3, 3]);
        assert!(c.output.contains("\tdo {\n"));
        assert!(c.output.contains("\t} while (!pred_jugr_predicate_3(m));\n"));
    }

    #[test]
    fn test_gb009_same_entry_name_bound_per_module() {
        let text = r#"
digraph twins
{
    1 [name=INPUT]
    2 [name=stepA]
    3 [name=FINALIZED]
    ea [module=libA, entry_func=run]
    eb [module=libB, entry_func=run]
    1 -> 2 [edge=ea]
    2 -> 3 [edge=eb]
}
"#;
        let c = compile_source(text, &Profile::default()).unwrap();
        assert_eq!(c.summary().resolutions, 2);
        assert!(c.output.contains(r#"GetProcAddress(lib_libA, "run")"#));
        assert!(c.output.contains(r#"GetProcAddress(lib_libB, "run")"#));
        let first = c.output.find("F(proc_libA_run,").unwrap();
        let second = c.output.find("F(proc_libB_run,").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_gb009_head_normalized_when_entry_not_lowest_id() {
        let text = r#"{
1 [name=stepA]
2 [name=FINALIZED]
5 [name=INPUT]
a [entry_func=fa]
i [entry_func=fi]
1 -> 2 [edge=a]
5 -> 1 [edge=i]
}"#;
        let c = compile_source(text, &Profile::default()).unwrap();
        assert_eq!(c.segments[0].records()[0].node_id, 5);
        assert_eq!(c.segments[1].records()[0].node_id, 1);
    }

    #[test]
    fn test_gb009_unresolved_aborts() {
        let text = ROUND_TRIP.replace("e2 [module=jugr, entry_func=function_1]", "");
        assert!(matches!(
            compile_source(&text, &Profile::default()),
            Err(CompileError::UnresolvedFunctionName { .. })
        ));
    }

    #[test]
    fn test_gb009_compile_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("chain.adot");
        let output = dir.path().join("out/chain.cpp");
        std::fs::write(&input, ROUND_TRIP).unwrap();
        let report = compile_file(&input, &output, &Profile::default()).unwrap();
        assert_eq!(report.program, "chain");
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(hasher::hash_string(&written), report.output_hash);
    }

    #[test]
    fn test_gb009_malformed_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.adot");
        let output = dir.path().join("broken.cpp");
        std::fs::write(&input, "digraph broken\n{\n1 [name=INPUT]\n").unwrap();
        let err = compile_file(&input, &output, &Profile::default()).unwrap_err();
        assert!(matches!(err, CompileError::MalformedGraph { line: 3, .. }));
        assert!(!output.exists());
        assert!(!dir.path().join("broken.cpp.tmp").exists());
    }

    #[test]
    fn test_gb009_build_records_lock_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let input = dir.path().join("looped.adot");
        let output = dir.path().join("looped.cpp");
        std::fs::write(&input, LOOPED).unwrap();

        let report = build(&BuildConfig {
            input: &input,
            output: &output,
            profile: &Profile::default(),
            state_dir: Some(&state_dir),
        })
        .unwrap();

        let lock = state::load_lock(&state_dir, "looped").unwrap().unwrap();
        assert_eq!(lock.output_hash, report.output_hash);
        assert_eq!(lock.graph_hash, hasher::hash_file(&input).unwrap());
        assert_eq!(lock.summary.loops, 1);
        assert!(lock.profile_hash.is_some());

        let events = eventlog::read_events(&state_dir, "looped").unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, CompileEvent::CompileStarted { .. }));
        assert!(matches!(events[1].event, CompileEvent::CompileCompleted { .. }));
    }

    #[test]
    fn test_gb009_failed_build_logs_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.adot");
        let output = dir.path().join("bad.cpp");
        std::fs::write(&input, "digraph bad\n{\n1 [name=INPUT]\n}\n").unwrap();

        let result = build(&BuildConfig {
            input: &input,
            output: &output,
            profile: &Profile::default(),
            state_dir: Some(dir.path()),
        });
        assert!(matches!(
            result,
            Err(CompileError::MissingEntryOrTerminal { tag: "FINALIZED" })
        ));
        assert!(!output.exists());
        assert!(state::load_lock(dir.path(), "bad").unwrap().is_none());

        let events = eventlog::read_events(dir.path(), "bad").unwrap();
        assert!(matches!(events[1].event, CompileEvent::CompileFailed { .. }));
    }

    #[test]
    fn test_gb009_invalid_profile_rejected_before_read() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile {
            call: "{{nope}}".to_string(),
            ..Profile::default()
        };
        let result = compile_file(&dir.path().join("absent.adot"), &dir.path().join("x.cpp"), &profile);
        assert!(matches!(result, Err(CompileError::Profile { .. })));
    }

    #[test]
    fn test_gb009_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = compile_file(
            &dir.path().join("absent.adot"),
            &dir.path().join("x.cpp"),
            &Profile::default(),
        );
        assert!(matches!(result, Err(CompileError::Io { .. })));
    }

    /// Chain INPUT → s0 → … → FINALIZED with optional back edges.
    fn graph_text(modules: &[usize], back: &[(usize, usize)]) -> String {
        let n = modules.len();
        let mut text = String::from("digraph gen\n{\n1 [name=INPUT]\n");
        for i in 0..n {
            text.push_str(&format!("{} [name=s{}]\n", i + 2, i));
        }
        text.push_str(&format!("{} [name=FINALIZED]\n", n + 2));
        for (i, m) in modules.iter().enumerate() {
            text.push_str(&format!("e{} [module=lib{}, entry_func=f{}]\n", i, m, i));
        }
        text.push_str(&format!("e{} [module=lib0, entry_func=f{}]\n", n, n));
        for i in 0..=n {
            text.push_str(&format!("{} -> {} [edge=e{}]\n", i + 1, i + 2, i));
        }
        for &(from, to) in back {
            let (from, to) = (from % n, to % n);
            if to <= from {
                text.push_str(&format!("{} -> {} [edge=e{}]\n", from + 2, to + 2, from));
            }
        }
        text.push_str("}\n");
        text
    }

    proptest! {
        #[test]
        fn prop_gb009_deterministic(
            modules in proptest::collection::vec(0usize..4, 1..8),
            back in proptest::collection::vec((0usize..8, 0usize..8), 0..3),
        ) {
            let text = graph_text(&modules, &back);
            let a = compile_source(&text, &Profile::default()).unwrap();
            let b = compile_source(&text, &Profile::default()).unwrap();
            prop_assert_eq!(a.output, b.output);
            prop_assert_eq!(a.segments, b.segments);
        }

        #[test]
        fn prop_gb009_loads_are_distinct_modules(
            modules in proptest::collection::vec(0usize..4, 1..8),
            back in proptest::collection::vec((0usize..8, 0usize..8), 0..3),
        ) {
            let text = graph_text(&modules, &back);
            let c = compile_source(&text, &Profile::default()).unwrap();
            let mut distinct: Vec<&str> = c
                .records
                .iter()
                .flat_map(|r| [r.processor.module.as_str(), r.predicate.module.as_str()])
                .collect();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(c.resources.loads.len(), distinct.len());
            for module in &distinct {
                prop_assert_eq!(c.output.matches(&format!("LoadLibrary(L\"{}\")", module)).count(), 1);
            }
        }

        #[test]
        fn prop_gb009_cycle_containment(
            modules in proptest::collection::vec(0usize..4, 1..8),
            back in proptest::collection::vec((0usize..8, 0usize..8), 0..3),
        ) {
            let text = graph_text(&modules, &back);
            let c = compile_source(&text, &Profile::default()).unwrap();
            for (pos, record) in c.records.iter().enumerate() {
                if record.in_cycle {
                    prop_assert!(c.cycles.iter().any(|r| r.start <= pos && pos <= r.end));
                    prop_assert!(record.node != c.graph.entry);
                }
            }
            for range in &c.cycles {
                for record in &c.records[range.start..=range.end] {
                    let excluded = record.node == c.graph.entry
                        || (record.terminal && record.gate != Gate::OnFalse);
                    prop_assert_eq!(record.in_cycle, !excluded);
                }
            }
            let looped: usize = c
                .segments
                .iter()
                .filter(|s| s.is_loop())
                .map(|s| s.records().len())
                .sum();
            prop_assert_eq!(looped, c.records.iter().filter(|r| r.in_cycle).count());
        }
    }
}
