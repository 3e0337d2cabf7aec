//! Compiler core — types, parsing, sequencing, loop recovery, emission.

pub mod codegen;
pub mod compiler;
pub mod cycles;
pub mod error;
pub mod parser;
pub mod partition;
pub mod profile;
pub mod sequence;
pub mod state;
pub mod template;
pub mod types;
