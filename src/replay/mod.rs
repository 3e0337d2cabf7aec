//! GB-014: Reference dispatcher — execute compiled segments in-process.
//!
//! Mirrors what the generated program does at run time: each record is one
//! dispatch of a predicate/processor pair against the shared state, any
//! non-zero result ends the run, and loops repeat while their exit condition
//! holds.

pub mod table;

use crate::core::types::{CallRecord, Condition, FunctionRef, Segment};
use indexmap::IndexMap;
use thiserror::Error;

/// Key-value state shared by every component of one run.
pub type SharedState = IndexMap<String, String>;

/// The components a program dispatches into.
pub trait Runtime {
    /// Evaluate a predicate. Predicates only read the state.
    fn predicate(&mut self, func: &FunctionRef, state: &SharedState) -> Result<bool, ReplayError>;

    /// Run a processor; zero means success.
    fn processor(&mut self, func: &FunctionRef, state: &mut SharedState) -> Result<i32, ReplayError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("no entry point `{0}`")]
    UnknownEntryPoint(String),

    #[error("loop on `{predicate}` exceeded {limit} iterations")]
    IterationLimit { predicate: String, limit: usize },
}

/// Bounds for one replay.
#[derive(Debug, Clone, Copy)]
pub struct ReplayLimits {
    /// Iterations allowed per loop entry
    pub max_iterations: usize,
}

impl Default for ReplayLimits {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
        }
    }
}

/// Result of running a program to completion or early return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Zero when every dispatch succeeded, else the first non-zero result
    pub code: i32,
    pub dispatches: usize,
}

/// The dispatch primitive.
///
/// A true predicate short-circuits with `1` and the processor is not run.
/// Otherwise the processor's result is returned.
pub fn dispatch<R: Runtime + ?Sized>(
    runtime: &mut R,
    record: &CallRecord,
    state: &mut SharedState,
) -> Result<i32, ReplayError> {
    if runtime.predicate(&record.predicate, state)? {
        return Ok(1);
    }
    runtime.processor(&record.processor, state)
}

fn holds<R: Runtime + ?Sized>(
    runtime: &mut R,
    condition: &Condition,
    state: &SharedState,
) -> Result<bool, ReplayError> {
    let value = runtime.predicate(&condition.predicate, state)?;
    Ok(value != condition.negated)
}

/// Execute segments in order, stopping at the first non-zero dispatch.
pub fn replay<R: Runtime + ?Sized>(
    segments: &[Segment],
    runtime: &mut R,
    state: &mut SharedState,
    limits: ReplayLimits,
) -> Result<ReplayOutcome, ReplayError> {
    let mut dispatches = 0;

    for segment in segments {
        match segment {
            Segment::Straight(record) => {
                dispatches += 1;
                let code = dispatch(runtime, record, state)?;
                if code != 0 {
                    return Ok(ReplayOutcome { code, dispatches });
                }
            }
            Segment::Loop {
                body,
                exit_condition,
            } => {
                let mut iterations = 0;
                loop {
                    if iterations == limits.max_iterations {
                        return Err(ReplayError::IterationLimit {
                            predicate: exit_condition.predicate.name.clone(),
                            limit: limits.max_iterations,
                        });
                    }
                    iterations += 1;
                    for record in body {
                        dispatches += 1;
                        let code = dispatch(runtime, record, state)?;
                        if code != 0 {
                            return Ok(ReplayOutcome { code, dispatches });
                        }
                    }
                    if !holds(runtime, exit_condition, state)? {
                        break;
                    }
                }
            }
        }
    }

    Ok(ReplayOutcome {
        code: 0,
        dispatches,
    })
}

#[cfg(test)]
mod tests {
    use super::table::TableRuntime;
    use super::*;
    use crate::core::compiler::compile_source;
    use crate::core::profile::Profile;
    use crate::core::types::{Gate, NodeIndex};

    fn fref(name: &str) -> FunctionRef {
        FunctionRef {
            name: name.to_string(),
            module: "jugr".to_string(),
        }
    }

    fn rec(processor: &str, predicate: &str) -> CallRecord {
        CallRecord {
            node_id: 1,
            node: NodeIndex(0),
            target: NodeIndex(1),
            processor: fref(processor),
            predicate: fref(predicate),
            gate: Gate::Always,
            terminal: false,
            in_cycle: false,
        }
    }

    #[test]
    fn test_gb014_dispatch_true_predicate_skips_processor() {
        let mut rt = TableRuntime::new()
            .with_predicate("p", |_| true)
            .with_processor("f", |_| 7);
        let mut state = SharedState::new();
        assert_eq!(dispatch(&mut rt, &rec("f", "p"), &mut state).unwrap(), 1);
        assert_eq!(rt.predicate_calls("p"), 1);
        assert_eq!(rt.processor_calls("f"), 0);
    }

    #[test]
    fn test_gb014_dispatch_false_predicate_runs_processor() {
        let mut rt = TableRuntime::new()
            .with_predicate("p", |_| false)
            .with_processor("f", |_| 7);
        let mut state = SharedState::new();
        assert_eq!(dispatch(&mut rt, &rec("f", "p"), &mut state).unwrap(), 7);
        assert_eq!(rt.processor_calls("f"), 1);
    }

    #[test]
    fn test_gb014_unknown_entry_point() {
        let mut rt = TableRuntime::new().with_predicate("p", |_| false);
        let mut state = SharedState::new();
        assert_eq!(
            dispatch(&mut rt, &rec("ghost", "p"), &mut state),
            Err(ReplayError::UnknownEntryPoint("ghost".to_string()))
        );
    }

    #[test]
    fn test_gb014_straight_fail_fast() {
        let segments = vec![
            Segment::Straight(rec("a", "never")),
            Segment::Straight(rec("b", "never")),
            Segment::Straight(rec("c", "never")),
        ];
        let mut rt = TableRuntime::new()
            .with_predicate("never", |_| false)
            .with_processor("a", |_| 0)
            .with_processor("b", |_| 3)
            .with_processor("c", |_| 0);
        let mut state = SharedState::new();
        let outcome = replay(&segments, &mut rt, &mut state, ReplayLimits::default()).unwrap();
        assert_eq!(outcome, ReplayOutcome { code: 3, dispatches: 2 });
        assert_eq!(rt.processor_calls("c"), 0);
    }

    #[test]
    fn test_gb014_compiled_loop_runs_until_exit() {
        let text = r#"
digraph counter
{
    1 [name=INPUT]
    2 [name=step]
    3 [name=check, predicate=done]
    4 [name=FINALIZED]
    e1 [module=jugr, entry_func=init]
    e2 [module=jugr, entry_func=bump]
    e32 [module=jugr, entry_func=again]
    e34 [module=jugr, entry_func=finish]
    done [module=jugr, entry_func=is_done]
    1 -> 2 [edge=e1]
    2 -> 3 [edge=e2]
    3 -> 2 [edge=e32, on_predicate_value=true]
    3 -> 4 [edge=e34, on_predicate_value=false]
}
"#;
        let c = compile_source(text, &Profile::default()).unwrap();

        fn count(state: &SharedState) -> u32 {
            state.get("n").and_then(|v| v.parse().ok()).unwrap_or(0)
        }

        let mut rt = TableRuntime::new()
            .with_predicate("default_pred_name", |_| false)
            .with_predicate("is_done", |s| s.contains_key("done"))
            .with_processor("init", |s| {
                s.insert("n".to_string(), "0".to_string());
                0
            })
            .with_processor("bump", |s| {
                let n = count(s) + 1;
                s.insert("n".to_string(), n.to_string());
                0
            })
            .with_processor("again", |_| 0)
            .with_processor("finish", |s| {
                if count(s) >= 3 {
                    s.insert("done".to_string(), "yes".to_string());
                }
                0
            });

        let mut state = SharedState::new();
        let outcome = replay(&c.segments, &mut rt, &mut state, ReplayLimits::default()).unwrap();
        assert_eq!(outcome, ReplayOutcome { code: 0, dispatches: 10 });
        assert_eq!(state.get("n").map(String::as_str), Some("3"));
        assert_eq!(rt.processor_calls("finish"), 3);
        assert_eq!(rt.processor_calls("bump"), 3);
        assert_eq!(rt.processor_calls("init"), 1);
    }

    #[test]
    fn test_gb014_true_gate_predicate_ends_run() {
        // A predicate that turns true mid-loop short-circuits its dispatch with 1
        let segments = vec![Segment::Loop {
            body: vec![rec("bump", "limit")],
            exit_condition: Condition {
                predicate: fref("never"),
                negated: true,
            },
        }];
        let mut rt = TableRuntime::new()
            .with_predicate("never", |_| false)
            .with_predicate("limit", |s| s.len() >= 2)
            .with_processor("bump", |s| {
                let k = format!("k{}", s.len());
                s.insert(k, String::new());
                0
            });
        let mut state = SharedState::new();
        let outcome = replay(&segments, &mut rt, &mut state, ReplayLimits::default()).unwrap();
        assert_eq!(outcome, ReplayOutcome { code: 1, dispatches: 3 });
        assert_eq!(rt.processor_calls("bump"), 2);
    }

    #[test]
    fn test_gb014_iteration_limit() {
        let segments = vec![Segment::Loop {
            body: vec![rec("spin", "never")],
            exit_condition: Condition {
                predicate: fref("never"),
                negated: true,
            },
        }];
        let mut rt = TableRuntime::new()
            .with_predicate("never", |_| false)
            .with_processor("spin", |_| 0);
        let mut state = SharedState::new();
        let err = replay(
            &segments,
            &mut rt,
            &mut state,
            ReplayLimits { max_iterations: 5 },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReplayError::IterationLimit {
                predicate: "never".to_string(),
                limit: 5
            }
        );
        assert_eq!(rt.processor_calls("spin"), 5);
    }
}
