//! Best-effort diagnostic artifacts written beside each extraction.
//!
//! Sinks are write-only and infallible from the caller's point of view:
//! every failure is logged and dropped so it can never change a task's
//! outcome.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

/// Write-only side channel for per-task artifacts.
pub trait DiagnosticSink: Send + Sync {
    /// The validated record of a successful extraction.
    fn record_extraction(&self, strategy: &str, record: &Value);

    /// The agent's step history, whatever the outcome.
    fn record_history(&self, strategy: &str, history: &[Value]);
}

/// Discards everything.
pub struct NoDiagnostics;

impl DiagnosticSink for NoDiagnostics {
    fn record_extraction(&self, _strategy: &str, _record: &Value) {}
    fn record_history(&self, _strategy: &str, _history: &[Value]) {}
}

/// Writes artifacts under `{out_dir}/{strategy}/`.
///
/// `extraction.json` is always written. `history.json` and
/// `logs/conversation/step_NNN.json` only in verbose mode.
pub struct FsDiagnostics {
    out_dir: PathBuf,
    verbose: bool,
}

impl FsDiagnostics {
    pub fn new(out_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            out_dir: out_dir.into(),
            verbose,
        }
    }

    fn strategy_dir(&self, strategy: &str) -> PathBuf {
        self.out_dir.join(strategy)
    }
}

impl DiagnosticSink for FsDiagnostics {
    fn record_extraction(&self, strategy: &str, record: &Value) {
        let path = self.strategy_dir(strategy).join("extraction.json");
        write_json_best_effort(&path, record);
    }

    fn record_history(&self, strategy: &str, history: &[Value]) {
        if !self.verbose {
            return;
        }

        let dir = self.strategy_dir(strategy);
        write_json_best_effort(&dir.join("history.json"), &Value::Array(history.to_vec()));

        let conversation = dir.join("logs").join("conversation");
        for (index, step) in history.iter().enumerate() {
            let path = conversation.join(format!("step_{:03}.json", index + 1));
            write_json_best_effort(&path, step);
        }
    }
}

fn write_json_best_effort(path: &Path, data: &Value) {
    if let Err(e) = try_write_json(path, data) {
        warn!(path = %path.display(), error = %e, "failed to write diagnostic artifact");
    }
}

fn try_write_json(path: &Path, data: &Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "wrote diagnostic artifact");
    Ok(())
}
