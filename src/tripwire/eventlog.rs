//! GB-011: Append-only JSONL compile event log.

use crate::core::types::{CompileEvent, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current UTC time as ISO 8601, second precision.
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

/// Format seconds since the epoch as `YYYY-MM-DDTHH:MM:SSZ`.
fn format_utc(secs: u64) -> String {
    let (hours, minutes, seconds) = ((secs / 3600) % 24, (secs / 60) % 60, secs % 60);

    let mut days = (secs / 86_400) as i64;
    let mut year = 1970i64;
    while days >= days_in_year(year) {
        days -= days_in_year(year);
        year += 1;
    }

    let feb = if is_leap(year) { 29 } else { 28 };
    let lengths = [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    for len in lengths {
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        days + 1,
        hours,
        minutes,
        seconds
    )
}

fn days_in_year(y: i64) -> i64 {
    if is_leap(y) {
        366
    } else {
        365
    }
}

fn is_leap(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Identifier tying the events of one compilation together.
pub fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("c-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Event log path for a program.
pub fn event_log_path(state_dir: &Path, program: &str) -> PathBuf {
    state_dir.join(program).join("events.jsonl")
}

/// Append one timestamped event to the program's log.
pub fn append_event(state_dir: &Path, program: &str, event: CompileEvent) -> Result<(), String> {
    let path = event_log_path(state_dir, program);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }

    let line = serde_json::to_string(&TimestampedEvent {
        ts: now_iso8601(),
        event,
    })
    .map_err(|e| format!("JSON serialize error: {}", e))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open event log {}: {}", path.display(), e))?;
    writeln!(file, "{}", line).map_err(|e| format!("cannot write {}: {}", path.display(), e))?;

    Ok(())
}

/// Read back every event of a program's log. A missing log is empty.
pub fn read_events(state_dir: &Path, program: &str) -> Result<Vec<TimestampedEvent>, String> {
    let path = event_log_path(state_dir, program);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, l)| {
            serde_json::from_str(l)
                .map_err(|e| format!("{} line {}: {}", path.display(), i + 1, e))
        })
        .collect()
}
