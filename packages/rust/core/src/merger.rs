//! Merges per-link outcomes into the final per-subject report.
//!
//! Records are keyed by strategy name. A failed task leaves an empty object
//! under its strategy so every strategy that ran is present in the output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use profilecrawl_shared::{ProfileCrawlError, Result, TaskOutcome, subject_slug};

/// Key stamped on every successful record.
pub const RETRIEVED_AT: &str = "retrieved_at";

/// One line of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub strategy: String,
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TaskOutcome> for OutcomeSummary {
    fn from(outcome: &TaskOutcome) -> Self {
        Self {
            strategy: outcome.strategy.clone(),
            url: outcome.link.url.clone(),
            success: outcome.success,
            error: outcome.error.clone(),
        }
    }
}

/// Accumulates outcomes in the order they arrive.
#[derive(Debug, Clone)]
pub struct ResultMerger {
    subject: String,
    records: BTreeMap<String, Value>,
    outcomes: Vec<OutcomeSummary>,
}

impl ResultMerger {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            records: BTreeMap::new(),
            outcomes: Vec::new(),
        }
    }

    /// Fold one outcome in.
    ///
    /// A later outcome for the same strategy replaces the earlier one, except
    /// that a failure never erases a populated record.
    pub fn record(&mut self, outcome: TaskOutcome) {
        self.outcomes.push(OutcomeSummary::from(&outcome));

        match outcome.record {
            Some(record) if outcome.success => {
                let stamped = stamp(record, &outcome.finished_at.to_rfc3339());
                self.records.insert(outcome.strategy, stamped);
            }
            _ => {
                let populated = self
                    .records
                    .get(&outcome.strategy)
                    .is_some_and(|existing| !is_empty_record(existing));
                if populated {
                    debug!(strategy = %outcome.strategy, "keeping earlier record over failure");
                } else {
                    self.records
                        .insert(outcome.strategy, Value::Object(Map::new()));
                }
            }
        }
    }

    /// Outcomes recorded so far.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Snapshot the report. Calling it again without new outcomes yields the same report.
    pub fn finalize(&self) -> MergedReport {
        MergedReport {
            subject: self.subject.clone(),
            records: self.records.clone(),
            outcomes: self.outcomes.clone(),
        }
    }
}

fn stamp(record: Value, retrieved_at: &str) -> Value {
    match record {
        Value::Object(mut map) => {
            map.insert(RETRIEVED_AT.to_string(), Value::String(retrieved_at.to_string()));
            Value::Object(map)
        }
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map.insert(RETRIEVED_AT.to_string(), Value::String(retrieved_at.to_string()));
            Value::Object(map)
        }
    }
}

fn is_empty_record(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Final aggregate for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedReport {
    pub subject: String,
    /// Strategy name → record, or `{}` when that strategy failed.
    pub records: BTreeMap<String, Value>,
    /// Per-link summaries in arrival order.
    pub outcomes: Vec<OutcomeSummary>,
}

/// Where [`MergedReport::write`] put its files.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

impl MergedReport {
    pub fn slug(&self) -> String {
        subject_slug(&self.subject)
    }

    /// Pretty JSON object, keys sorted by strategy name.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records)
            .map_err(|e| ProfileCrawlError::validation(format!("JSON serialization failed: {e}")))
    }

    /// `# {subject}` followed by one `## {strategy}` section per record.
    pub fn to_markdown(&self) -> Result<String> {
        let mut md = format!("# {}\n", self.subject);
        for (strategy, record) in &self.records {
            let json = serde_json::to_string_pretty(record).map_err(|e| {
                ProfileCrawlError::validation(format!("JSON serialization failed: {e}"))
            })?;
            md.push_str(&format!("\n## {strategy}\n\n```json\n{json}\n```\n"));
        }
        Ok(md)
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// Write `{slug}.json` and `{slug}.md` into `out_dir`.
    #[instrument(skip_all, fields(out_dir = %out_dir.display()))]
    pub fn write(&self, out_dir: &Path) -> Result<ReportPaths> {
        std::fs::create_dir_all(out_dir).map_err(|e| ProfileCrawlError::io(out_dir, e))?;

        let slug = self.slug();
        let paths = ReportPaths {
            json: out_dir.join(format!("{slug}.json")),
            markdown: out_dir.join(format!("{slug}.md")),
        };

        write_atomic(&paths.json, &self.to_json()?)?;
        write_atomic(&paths.markdown, &self.to_markdown()?)?;

        info!(
            json = %paths.json.display(),
            records = self.records.len(),
            "merged report written"
        );
        Ok(paths)
    }
}

/// Write through a temp file and rename over the target.
fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ProfileCrawlError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| ProfileCrawlError::io(target, e))?;

    debug!(path = %target.display(), size = content.len(), "wrote report file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use profilecrawl_shared::Link;
    use serde_json::json;

    use super::*;
    use crate::testing::temp_dir;

    fn ok(strategy: &str, record: Value) -> TaskOutcome {
        TaskOutcome::success(strategy, Link::new(format!("https://{strategy}.example"), ""), record)
    }

    fn failed(strategy: &str) -> TaskOutcome {
        TaskOutcome::failure(strategy, Link::new(format!("https://{strategy}.example"), ""), "boom")
    }

    #[test]
    fn success_is_stamped_and_failure_is_empty() {
        let mut merger = ResultMerger::new("Ada Lovelace");
        let outcome = ok("github", json!({"username": "ada"}));
        let finished = outcome.finished_at.to_rfc3339();
        merger.record(outcome);
        merger.record(failed("website"));

        let report = merger.finalize();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records["github"]["username"], "ada");
        assert_eq!(report.records["github"][RETRIEVED_AT], finished.as_str());
        assert_eq!(report.records["website"], json!({}));
        assert_eq!(report.successes(), 1);
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn keys_are_sorted_regardless_of_arrival() {
        let mut merger = ResultMerger::new("Ada");
        merger.record(failed("x"));
        merger.record(failed("github"));
        merger.record(failed("linkedin"));

        let json = merger.finalize().to_json().unwrap();
        let github = json.find("\"github\"").unwrap();
        let linkedin = json.find("\"linkedin\"").unwrap();
        let x = json.find("\"x\"").unwrap();
        assert!(github < linkedin && linkedin < x);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut merger = ResultMerger::new("Ada Lovelace");
        merger.record(ok("github", json!({"username": "ada"})));
        merger.record(failed("website"));

        let first = merger.finalize();
        let second = merger.finalize();
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        assert_eq!(first.to_markdown().unwrap(), second.to_markdown().unwrap());
    }

    #[test]
    fn later_duplicate_overwrites_but_failure_never_erases() {
        let mut merger = ResultMerger::new("Ada");
        merger.record(ok("website", json!({"root_url": "https://one.example"})));
        merger.record(ok("website", json!({"root_url": "https://two.example"})));
        merger.record(failed("website"));

        let report = merger.finalize();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records["website"]["root_url"], "https://two.example");
        assert_eq!(report.outcomes.len(), 3);
    }

    #[test]
    fn success_replaces_earlier_placeholder() {
        let mut merger = ResultMerger::new("Ada");
        merger.record(failed("website"));
        merger.record(ok("website", json!({"root_url": "https://ada.dev"})));

        assert_eq!(
            merger.finalize().records["website"]["root_url"],
            "https://ada.dev"
        );
    }

    #[test]
    fn markdown_has_one_section_per_strategy() {
        let mut merger = ResultMerger::new("Ada Lovelace");
        merger.record(ok("github", json!({"username": "ada"})));
        merger.record(failed("website"));

        let md = merger.finalize().to_markdown().unwrap();
        assert!(md.starts_with("# Ada Lovelace\n"));
        assert!(md.contains("\n## github\n\n```json\n{\n  \"retrieved_at\""));
        assert!(md.contains("\n## website\n\n```json\n{}\n```\n"));
        assert_eq!(md.matches("## ").count(), 2);
    }

    #[test]
    fn write_uses_subject_slug() {
        let tmp = temp_dir("merger");
        let mut merger = ResultMerger::new("Ada Lovelace");
        merger.record(failed("website"));

        let paths = merger.finalize().write(&tmp).unwrap();
        assert_eq!(paths.json, tmp.join("ada-lovelace.json"));
        assert_eq!(paths.markdown, tmp.join("ada-lovelace.md"));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(written, json!({"website": {}}));
        assert!(!tmp.join(".ada-lovelace.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn non_object_records_are_wrapped() {
        let mut merger = ResultMerger::new("Ada");
        merger.record(ok("website", json!("plain text")));
        let report = merger.finalize();
        assert_eq!(report.records["website"]["value"], "plain text");
        assert!(report.records["website"].get(RETRIEVED_AT).is_some());
    }
}
