//! Model-hub strategy (Hugging Face).

use profilecrawl_shared::{Link, Subject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Strategy, tag_hint};
use crate::schema::OutputSchema;

const SCHEMA_VERSION: u32 = 1;

pub struct ModelHubStrategy {
    schema: OutputSchema,
}

impl ModelHubStrategy {
    pub fn new() -> Self {
        Self {
            schema: OutputSchema::of::<HfResult>("huggingface", SCHEMA_VERSION),
        }
    }
}

impl Default for ModelHubStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for ModelHubStrategy {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn task_description(&self, subject: &Subject, link: &Link) -> String {
        let name = &subject.name;
        let url = &link.url;
        let hint = tag_hint(link, |tag| format!(" {name} gave this additional information: {tag}."));
        format!(
            "Go to {url} and extract everything about {name}'s profile on Hugging Face.{hint}\n\n\
             Collect their interests, organizations, activity and statistics. For models, \
             datasets, spaces, papers, articles and collections, record the name, the URL and \
             a short description. Open the most popular or most recent ones when the listing is \
             not informative enough.\n\n\
             Be thorough, truthful and factual."
        )
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(vec!["*.huggingface.co".to_string()])
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HfStats {
    pub followers: String,
    pub following: String,
    pub likes: String,
    pub models_count: String,
    pub datasets_count: String,
    pub spaces_count: String,
}

/// A generic named item with a link (post, article, collection, paper, organization).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Reference {
    pub name: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    pub kind: String,
    pub target: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ModelReference {
    pub name: String,
    pub url: String,
    pub task: String,
    pub downloads: String,
    pub likes: String,
    pub last_update: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DatasetReference {
    pub name: String,
    pub url: String,
    pub size: String,
    pub downloads: String,
    pub likes: String,
    pub last_update: String,
    pub description: String,
}

/// Record extracted from a Hugging Face profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HfResult {
    pub name: String,
    pub username: String,
    pub url: String,
    pub ai_ml_interests: Vec<String>,
    pub recent_activity: Vec<Activity>,
    pub organizations: Vec<Reference>,
    pub stats: HfStats,
    pub posts: Vec<Reference>,
    pub articles: Vec<Reference>,
    pub collections: Vec<Reference>,
    pub papers: Vec<Reference>,
    pub models: Vec<ModelReference>,
    pub datasets: Vec<DatasetReference>,
    pub summary: String,
}
