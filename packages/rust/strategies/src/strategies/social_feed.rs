//! Social-feed strategy (X / Twitter).

use profilecrawl_shared::{Link, Subject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::schema::OutputSchema;

const SCHEMA_VERSION: u32 = 1;

pub struct SocialFeedStrategy {
    schema: OutputSchema,
}

impl SocialFeedStrategy {
    pub fn new() -> Self {
        Self {
            schema: OutputSchema::of::<XResult>("x", SCHEMA_VERSION),
        }
    }
}

impl Default for SocialFeedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SocialFeedStrategy {
    fn name(&self) -> &str {
        "x"
    }

    fn task_description(&self, subject: &Subject, link: &Link) -> String {
        let name = &subject.name;
        let url = &link.url;
        format!(
            "Get personal information about {name} by reading the profile and some posts \
             from x.com. The profile URL is {url}.\n\n\
             Try to understand {name}'s interests, habits and ideas.\n\n\
             Check the most recent 10 updates, including posts, reposts and likes:\n\
             - if you see a post written by {name}, copy-paste it\n\
             - if you see a repost (also named 'You reposted') or a like, just make a summary.\n\n\
             Be thorough, truthful and factual."
        )
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(vec!["*.x.com".to_string(), "*.twitter.com".to_string()])
    }
}

/// Record extracted from an X profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct XResult {
    pub name: String,
    pub x_handle: String,
    pub bio: String,
    pub website: String,
    pub follower_count: String,
    pub following_count: String,
    pub posts: Vec<String>,
    pub repost_and_likes_summary: String,
    pub profile_summary: String,
}
