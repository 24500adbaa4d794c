//! Canonical, versioned output schemas for extraction records.
//!
//! Each strategy owns exactly one [`OutputSchema`]. The schema carries the
//! JSON schema handed to the agent and a validator that parses the agent's
//! raw payload into the typed record, then re-serializes it so every stored
//! record has the same canonical shape.

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;

use profilecrawl_shared::{ProfileCrawlError, Result};

/// Structural type descriptor plus validator for one record type.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    name: &'static str,
    version: u32,
    json_schema: serde_json::Value,
    validator: fn(&str) -> Result<serde_json::Value>,
}

impl OutputSchema {
    /// Build the schema for record type `T`.
    pub fn of<T>(name: &'static str, version: u32) -> Self
    where
        T: JsonSchema + DeserializeOwned + Serialize,
    {
        let root = schemars::schema_for!(T);
        Self {
            name,
            version,
            json_schema: serde_json::to_value(root).unwrap_or_default(),
            validator: validate_as::<T>,
        }
    }

    /// Record type name (e.g. `code_repo`).
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Stable identifier, e.g. `code_repo.v1`.
    pub fn id(&self) -> String {
        format!("{}.v{}", self.name, self.version)
    }

    /// JSON schema document describing the record.
    pub fn json_schema(&self) -> &serde_json::Value {
        &self.json_schema
    }

    /// Validate a raw agent payload and return the canonical record.
    pub fn validate(&self, raw: &str) -> Result<serde_json::Value> {
        (self.validator)(raw).map_err(|e| match e {
            ProfileCrawlError::Validation { message } => {
                ProfileCrawlError::validation(format!("{}: {message}", self.id()))
            }
            other => other,
        })
    }
}

fn validate_as<T>(raw: &str) -> Result<serde_json::Value>
where
    T: DeserializeOwned + Serialize,
{
    let payload = strip_code_fence(raw);
    let record: T = serde_json::from_str(payload)
        .map_err(|e| ProfileCrawlError::validation(format!("payload does not match schema: {e}")))?;

    serde_json::to_value(record)
        .map_err(|e| ProfileCrawlError::validation(format!("record serialization failed: {e}")))
}

/// Agents occasionally wrap their JSON answer in a Markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.trim_start_matches("json");
    body.strip_suffix("```").unwrap_or(body).trim()
}
