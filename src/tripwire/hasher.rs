//! GB-010: BLAKE3 digests for graphs, generated programs and profiles.
//!
//! Every digest is rendered as `blake3:<hex>` so locks and events can be
//! compared with plain string equality.

use crate::core::profile::Profile;
use std::io::Read;
use std::path::Path;

const PREFIX: &str = "blake3:";
const CHUNK: usize = 64 * 1024;

fn render(hash: blake3::Hash) -> String {
    format!("{}{}", PREFIX, hash.to_hex())
}

/// Digest of a file's bytes, streamed in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buf[..n]);
            }
            Err(e) => return Err(format!("cannot read {}: {}", path.display(), e)),
        }
    }
    Ok(render(hasher.finalize()))
}

/// Digest of in-memory text.
pub fn hash_string(s: &str) -> String {
    render(blake3::hash(s.as_bytes()))
}

/// Digest of a profile's canonical YAML form.
///
/// Two profiles that differ only in YAML formatting hash the same.
pub fn hash_profile(profile: &Profile) -> Result<String, String> {
    let yaml =
        serde_yaml_ng::to_string(profile).map_err(|e| format!("serialize error: {}", e))?;
    Ok(hash_string(&yaml))
}

/// Whether a string looks like a digest produced here.
pub fn is_digest(s: &str) -> bool {
    s.strip_prefix(PREFIX)
        .map(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gb010_hash_file_matches_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.adot");
        std::fs::write(&path, "{\n1 [name=INPUT]\n}\n").unwrap();
        let h = hash_file(&path).unwrap();
        assert!(is_digest(&h));
        assert_eq!(h, hash_string("{\n1 [name=INPUT]\n}\n"));
    }

    #[test]
    fn test_gb010_hash_file_larger_than_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.cpp");
        let text = "x".repeat(CHUNK * 2 + 17);
        std::fs::write(&path, &text).unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_string(&text));
    }

    #[test]
    fn test_gb010_hash_string_distinct() {
        assert_eq!(hash_string("a"), hash_string("a"));
        assert_ne!(hash_string("a"), hash_string("b"));
    }

    #[test]
    fn test_gb010_hash_file_missing() {
        let err = hash_file(Path::new("/nonexistent/graph.adot")).unwrap_err();
        assert!(err.contains("/nonexistent/graph.adot"));
    }

    #[test]
    fn test_gb010_hash_profile_tracks_fields() {
        let a = hash_profile(&Profile::default()).unwrap();
        let b = hash_profile(&Profile {
            indent: "  ".to_string(),
            ..Profile::default()
        })
        .unwrap();
        assert!(is_digest(&a));
        assert_ne!(a, b);
        assert_eq!(a, hash_profile(&Profile::default()).unwrap());
    }

    #[test]
    fn test_gb010_is_digest() {
        assert!(!is_digest("blake3:abc"));
        assert!(!is_digest("sha256:00"));
        assert!(is_digest(&hash_string("")));
    }
}
