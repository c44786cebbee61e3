//! Fetch progress reporting.
//!
//! Reports observable progress during `harvest fetch` (clone transfer
//! counters and rate-limit waits) so long crawls show what is happening.
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts; per-item outcome lines stay on stdout.

use std::io::Write;

/// A single progress event from the ingestion pipeline.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A clone is starting for this repository.
    CloneStarted { full_name: String, dest: String },
    /// One transfer sample from a running clone.
    CloneTransfer {
        received_objects: u64,
        total_objects: u64,
        received_bytes: u64,
    },
    /// The driver is waiting out a provider rate limit.
    RateLimitWait { wait_secs: u64 },
}

/// Reports fetch progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the driver and the clone loop.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr:
/// `clone octocat/Hello-World  1,234 / 1,840 objects, 5,944,279 bytes`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::CloneStarted { full_name, dest } => {
                format!("clone {} into {}\n", full_name, dest)
            }
            ProgressEvent::CloneTransfer {
                received_objects,
                total_objects,
                received_bytes,
            } => {
                format!(
                    "  {} / {} objects, {} bytes received\n",
                    format_number(*received_objects),
                    format_number(*total_objects),
                    format_number(*received_bytes)
                )
            }
            ProgressEvent::RateLimitWait { wait_secs } => {
                format!("rate limited, waiting {}s before retrying\n", wait_secs)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::CloneStarted { full_name, dest } => serde_json::json!({
                "event": "clone_started",
                "repo": full_name,
                "dest": dest
            }),
            ProgressEvent::CloneTransfer {
                received_objects,
                total_objects,
                received_bytes,
            } => serde_json::json!({
                "event": "clone_transfer",
                "received_objects": received_objects,
                "total_objects": total_objects,
                "received_bytes": received_bytes
            }),
            ProgressEvent::RateLimitWait { wait_secs } => serde_json::json!({
                "event": "rate_limit_wait",
                "wait_secs": wait_secs
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
