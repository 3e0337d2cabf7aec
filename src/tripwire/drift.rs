//! GB-013: Drift detection — compare the graph and generated program on disk
//! against the digests recorded in the build lock.

use crate::core::profile::Profile;
use crate::core::types::BuildLock;
use crate::tripwire::hasher;
use std::fmt;
use std::path::Path;

/// Which recorded artifact drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Graph changed since the last compile: output is stale
    Graph,
    /// Generated program was edited or removed
    Output,
    /// Emission profile differs from the one used
    Profile,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::Output => write!(f, "output"),
            Self::Profile => write!(f, "profile"),
        }
    }
}

/// A single drift finding.
#[derive(Debug, Clone)]
pub struct DriftFinding {
    pub artifact: Artifact,
    pub path: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Compare one file against its recorded digest.
pub fn check_file_drift(artifact: Artifact, path: &str, expected_hash: &str) -> Option<DriftFinding> {
    let file_path = Path::new(path);
    if !file_path.is_file() {
        return Some(DriftFinding {
            artifact,
            path: path.to_string(),
            expected_hash: expected_hash.to_string(),
            actual_hash: "MISSING".to_string(),
            detail: format!("{} does not exist", path),
        });
    }

    let actual = hasher::hash_file(file_path).unwrap_or_else(|e| format!("ERROR:{}", e));
    if actual == expected_hash {
        return None;
    }

    let detail = match artifact {
        Artifact::Graph => format!("{} changed since last compile", path),
        _ => format!("{} was modified after generation", path),
    };
    Some(DriftFinding {
        artifact,
        path: path.to_string(),
        expected_hash: expected_hash.to_string(),
        actual_hash: actual,
        detail,
    })
}

/// Check graph and output of a lock, plus the profile when one is given
/// and the lock recorded a profile digest.
pub fn detect_drift(lock: &BuildLock, profile: Option<&Profile>) -> Vec<DriftFinding> {
    let mut findings: Vec<DriftFinding> = [
        (Artifact::Graph, &lock.graph, &lock.graph_hash),
        (Artifact::Output, &lock.output, &lock.output_hash),
    ]
    .into_iter()
    .filter_map(|(artifact, path, hash)| check_file_drift(artifact, path, hash))
    .collect();

    if let (Some(profile), Some(expected)) = (profile, &lock.profile_hash) {
        let actual = hasher::hash_profile(profile).unwrap_or_else(|e| format!("ERROR:{}", e));
        if &actual != expected {
            findings.push(DriftFinding {
                artifact: Artifact::Profile,
                path: "<profile>".to_string(),
                expected_hash: expected.clone(),
                actual_hash: actual,
                detail: "emission profile differs from the one used".to_string(),
            });
        }
    }

    findings
}
