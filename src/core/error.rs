//! GB-000: Compilation error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// Which side of a dispatch a function name was looked up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    Processor,
    Predicate,
}

impl std::fmt::Display for FunctionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processor => write!(f, "processor"),
            Self::Predicate => write!(f, "predicate"),
        }
    }
}

/// Any failure that aborts a compilation. No partial results survive one.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("malformed graph at line {line}: {reason}")]
    MalformedGraph { line: usize, reason: String },

    #[error("unresolved {role} name `{name}` (declared at line {line})")]
    UnresolvedFunctionName {
        name: String,
        role: FunctionRole,
        line: usize,
    },

    #[error("graph has no node tagged {tag}")]
    MissingEntryOrTerminal { tag: &'static str },

    #[error("graph has more than one node tagged {tag} (ids {first} and {second})")]
    DuplicateTag {
        tag: &'static str,
        first: u32,
        second: u32,
    },

    #[error("bad template `{template}`: {reason}")]
    Template { template: String, reason: String },

    #[error("invalid profile {origin}: {reason}")]
    Profile { origin: String, reason: String },

    #[error("state error: {0}")]
    State(String),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedGraph {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
