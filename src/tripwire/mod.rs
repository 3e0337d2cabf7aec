//! Tripwire — build provenance: BLAKE3 digests, compile event log, drift detection.

pub mod drift;
pub mod eventlog;
pub mod hasher;
