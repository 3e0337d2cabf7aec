//! Table-driven runtime: components registered as closures by entry name,
//! with per-entry invocation counters.

use super::{ReplayError, Runtime, SharedState};
use crate::core::types::FunctionRef;
use rustc_hash::FxHashMap;

type PredicateFn = Box<dyn Fn(&SharedState) -> bool>;
type ProcessorFn = Box<dyn FnMut(&mut SharedState) -> i32>;

/// Components keyed by entry-point name. The component name is ignored.
#[derive(Default)]
pub struct TableRuntime {
    predicates: FxHashMap<String, PredicateFn>,
    processors: FxHashMap<String, ProcessorFn>,
    predicate_calls: FxHashMap<String, usize>,
    processor_calls: FxHashMap<String, usize>,
}

impl TableRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(mut self, name: &str, f: impl Fn(&SharedState) -> bool + 'static) -> Self {
        self.predicates.insert(name.to_string(), Box::new(f));
        self
    }

    pub fn with_processor(
        mut self,
        name: &str,
        f: impl FnMut(&mut SharedState) -> i32 + 'static,
    ) -> Self {
        self.processors.insert(name.to_string(), Box::new(f));
        self
    }

    pub fn predicate_calls(&self, name: &str) -> usize {
        self.predicate_calls.get(name).copied().unwrap_or(0)
    }

    pub fn processor_calls(&self, name: &str) -> usize {
        self.processor_calls.get(name).copied().unwrap_or(0)
    }
}

impl Runtime for TableRuntime {
    fn predicate(&mut self, func: &FunctionRef, state: &SharedState) -> Result<bool, ReplayError> {
        let f = self
            .predicates
            .get(&func.name)
            .ok_or_else(|| ReplayError::UnknownEntryPoint(func.name.clone()))?;
        *self.predicate_calls.entry(func.name.clone()).or_default() += 1;
        Ok(f(state))
    }

    fn processor(&mut self, func: &FunctionRef, state: &mut SharedState) -> Result<i32, ReplayError> {
        let f = self
            .processors
            .get_mut(&func.name)
            .ok_or_else(|| ReplayError::UnknownEntryPoint(func.name.clone()))?;
        *self.processor_calls.entry(func.name.clone()).or_default() += 1;
        Ok(f(state))
    }
}
