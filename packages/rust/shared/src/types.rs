//! Core domain types: the subject being profiled and per-link outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProfileCrawlError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one orchestrator run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Subject / Link
// ---------------------------------------------------------------------------

/// One crawl target tied to the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Page to start extraction from.
    pub url: String,
    /// Free-text tag supplied by the caller (e.g. "personal website").
    #[serde(default)]
    pub description: String,
}

impl Link {
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
        }
    }
}

/// The person being profiled. Built by the caller before orchestration
/// starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Full name, interpolated into every task description.
    pub name: String,
    /// Pages to extract from, in caller order.
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Subject {
    pub fn new(name: impl Into<String>, links: Vec<Link>) -> Self {
        Self {
            name: name.into(),
            links,
        }
    }

    /// Filesystem-safe slug of the subject's name, used for report file names.
    pub fn slug(&self) -> String {
        subject_slug(&self.name)
    }

    /// Reject subjects that cannot produce a meaningful report.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProfileCrawlError::validation("subject name is empty"));
        }
        if self.links.is_empty() {
            return Err(ProfileCrawlError::validation(format!(
                "subject '{}' has no links to crawl",
                self.name
            )));
        }
        if let Some(link) = self.links.iter().find(|l| l.url.trim().is_empty()) {
            return Err(ProfileCrawlError::validation(format!(
                "link with description '{}' has an empty url",
                link.description
            )));
        }
        Ok(())
    }
}

/// Report file stem for a subject name. Never empty.
pub fn subject_slug(name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        "subject".to_string()
    } else {
        slug
    }
}

/// Generate a URL- and filesystem-safe slug from free text.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ---------------------------------------------------------------------------
// TaskOutcome
// ---------------------------------------------------------------------------

/// Result of running one extraction task. Produced exactly once per link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Name of the strategy the link was classified to.
    pub strategy: String,
    /// The link this task started from.
    pub link: Link,
    /// Whether a schema-valid record was produced.
    pub success: bool,
    /// Canonical JSON of the validated record (absent on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
    /// Why the task failed, for logs and summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task finished; stamped onto the merged record.
    pub finished_at: DateTime<Utc>,
}

impl TaskOutcome {
    /// A task that produced a validated record.
    pub fn success(strategy: impl Into<String>, link: Link, record: serde_json::Value) -> Self {
        Self {
            strategy: strategy.into(),
            link,
            success: true,
            record: Some(record),
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// A task that ended without a usable record.
    pub fn failure(strategy: impl Into<String>, link: Link, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            link,
            success: false,
            record: None,
            error: Some(reason.into()),
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_name() {
        let subject = Subject::new("Ada Lovelace", vec![]);
        assert_eq!(subject.slug(), "ada-lovelace");

        let subject = Subject::new("  Grace  B. Hopper!! ", vec![]);
        assert_eq!(subject.slug(), "grace-b-hopper");
    }

    #[test]
    fn slug_falls_back_when_name_has_no_alphanumerics() {
        let subject = Subject::new("???", vec![]);
        assert_eq!(subject.slug(), "subject");
    }

    #[test]
    fn validate_rejects_empty_subject() {
        assert!(Subject::new("", vec![Link::new("https://x.com/a", "")]).validate().is_err());
        assert!(Subject::new("Ada", vec![]).validate().is_err());
        assert!(Subject::new("Ada", vec![Link::new(" ", "blog")]).validate().is_err());
        assert!(Subject::new("Ada", vec![Link::new("https://x.com/a", "")]).validate().is_ok());
    }

    #[test]
    fn outcome_constructors_keep_flag_and_record_in_sync() {
        let link = Link::new("https://github.com/ada", "");
        let ok = TaskOutcome::success("github", link.clone(), serde_json::json!({"username": "ada"}));
        assert!(ok.success);
        assert!(ok.record.is_some());
        assert!(ok.error.is_none());

        let failed = TaskOutcome::failure("github", link, "step budget exhausted");
        assert!(!failed.success);
        assert!(failed.record.is_none());
        assert_eq!(failed.error.as_deref(), Some("step budget exhausted"));
    }

    #[test]
    fn subject_deserializes_with_default_descriptions() {
        let json = r#"{"name":"Ada","links":[{"url":"https://github.com/ada"}]}"#;
        let subject: Subject = serde_json::from_str(json).expect("deserialize");
        assert_eq!(subject.links[0].description, "");
    }
}
