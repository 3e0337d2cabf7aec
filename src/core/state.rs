//! GB-012: Build lock management and atomic writes.

use super::types::{BuildLock, BuildSummary};
use crate::tripwire::hasher::is_digest;
use std::path::{Path, PathBuf};

/// Lock file path for a program within the state directory.
pub fn lock_file_path(state_dir: &Path, program: &str) -> PathBuf {
    state_dir.join(program).join("build.lock.yaml")
}

/// Load a program's build lock. Returns None if none was written yet.
/// A lock whose recorded digests are not BLAKE3 digests is rejected.
pub fn load_lock(state_dir: &Path, program: &str) -> Result<Option<BuildLock>, String> {
    let path = lock_file_path(state_dir, program);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lock: BuildLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid lock file {}: {}", path.display(), e))?;
    let digests = [
        ("graph_hash", Some(&lock.graph_hash)),
        ("output_hash", Some(&lock.output_hash)),
        ("profile_hash", lock.profile_hash.as_ref()),
    ];
    for (field, value) in digests {
        if let Some(value) = value.filter(|v| !is_digest(v)) {
            return Err(format!(
                "invalid lock file {}: {} `{}` is not a blake3 digest",
                path.display(),
                field,
                value
            ));
        }
    }
    Ok(Some(lock))
}

/// Save a build lock atomically.
pub fn save_lock(state_dir: &Path, lock: &BuildLock) -> Result<(), String> {
    let path = lock_file_path(state_dir, &lock.program);
    let yaml = serde_yaml_ng::to_string(lock).map_err(|e| format!("serialize error: {}", e))?;
    write_atomic(&path, &yaml).map_err(|e| format!("cannot write {}: {}", path.display(), e))
}

/// Fresh lock for one compilation. Digests are filled by the caller.
pub fn new_lock(program: &str, graph: &Path, output: &Path, summary: BuildSummary) -> BuildLock {
    use crate::tripwire::eventlog::now_iso8601;
    BuildLock {
        schema: "1.0".to_string(),
        program: program.to_string(),
        generated_at: now_iso8601(),
        generator: format!("gbsegen {}", env!("CARGO_PKG_VERSION")),
        graph: graph.display().to_string(),
        graph_hash: String::new(),
        output: output.display().to_string(),
        output_hash: String::new(),
        profile_hash: None,
        summary,
    }
}

/// Write `content` to `path` through a sibling temp file and a rename.
///
/// Parent directories are created. On failure the temp file is removed and
/// `path` is left untouched.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = std::fs::write(&tmp_path, content).and_then(|_| std::fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}
