//! gbsegen — graph-based solver compiler.
//!
//! Parses an aDOT execution-plan graph, flattens it into dispatch records,
//! recovers loops from back-references and emits a linear program through a
//! pluggable text profile. BLAKE3 build locks track what was generated.

pub mod cli;
pub mod core;
pub mod replay;
pub mod tripwire;
