//! Generic website strategy. Catches every link no other rule claims.

use profilecrawl_shared::{Link, Subject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Strategy, tag_hint};
use crate::schema::OutputSchema;

const SCHEMA_VERSION: u32 = 1;

pub struct WebsiteStrategy {
    schema: OutputSchema,
}

impl WebsiteStrategy {
    pub fn new() -> Self {
        Self {
            schema: OutputSchema::of::<WebsiteResult>("website", SCHEMA_VERSION),
        }
    }
}

impl Default for WebsiteStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for WebsiteStrategy {
    fn name(&self) -> &str {
        "website"
    }

    fn task_description(&self, subject: &Subject, link: &Link) -> String {
        let name = &subject.name;
        let url = &link.url;
        let hint = tag_hint(link, |tag| format!(" The website is tagged as '{tag}'."));
        format!(
            "Extract relevant information about {name} from the website {url}.{hint}\n\n\
             Keep the root page's most relevant content chunks in relevant_contents. Follow \
             links to child pages that talk about {name} (projects, posts, about pages) and \
             record each one in children with short content snippets and a page summary. \
             Stay on the same site.\n\n\
             Be thorough, truthful and factual."
        )
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PageChunk {
    pub title_or_tag: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    pub url: String,
    pub tag: String,
    pub content_snippets: Vec<PageChunk>,
    pub page_summary: String,
}

/// Record extracted from an arbitrary website.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WebsiteResult {
    pub root_url: String,
    pub root_tag: String,
    pub relevant_contents: Vec<PageChunk>,
    pub children: Vec<Page>,
    pub overall_summary: String,
}
