//! Code-hosting strategy (GitHub, GitLab, Bitbucket).

use std::sync::Arc;

use profilecrawl_shared::{Link, Result, Subject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::actions::{AgentAction, GitHubCodeSummary};
use crate::schema::OutputSchema;

const SCHEMA_VERSION: u32 = 1;

const ALLOWED_DOMAINS: [&str; 4] = [
    "*.github.com",
    "*.uithub.com",
    "*.gitlab.com",
    "*.bitbucket.com",
];

/// Crawls a subject's repositories on a code-hosting site.
///
/// The GitHub flavour also exposes `get_github_code` so the agent can skim a
/// repository's sources without opening every file.
pub struct CodeHostStrategy {
    name: &'static str,
    schema: OutputSchema,
    code_summary: Option<Arc<GitHubCodeSummary>>,
}

impl CodeHostStrategy {
    pub fn github() -> Result<Self> {
        Ok(Self {
            name: "github",
            schema: OutputSchema::of::<CodeRepoResult>("code_repo", SCHEMA_VERSION),
            code_summary: Some(Arc::new(GitHubCodeSummary::new()?)),
        })
    }

    /// GitLab, Bitbucket and other code hosts without a source-summary action.
    pub fn generic() -> Self {
        Self {
            name: "code_repo",
            schema: OutputSchema::of::<CodeRepoResult>("code_repo", SCHEMA_VERSION),
            code_summary: None,
        }
    }
}

impl Strategy for CodeHostStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn task_description(&self, subject: &Subject, link: &Link) -> String {
        let name = &subject.name;
        let url = &link.url;
        let fallback = if self.code_summary.is_some() {
            "if unavailable, or you need more information, use `get_github_code` to get \
             in a single step the first lines of each file in the repo"
        } else {
            "if unavailable, skim the main source files"
        };

        format!(
            "Get information about what {name} codes and how, by crawling their repositories. \
             The URL to start is {url}.\n\n\
             About repos:\n\
             - Gather detailed information about 5 to 10 repos among the pinned ones, the most \
             popular and the most recently updated repos of {name} (into repositories_detailed). \
             Get the overview from the README.md; {fallback}.\n\
             - For all other repos, only gather basic information (repositories_basic).\n\
             - Ignore private repositories, keep public ones.\n\n\
             Be thorough, truthful and factual."
        )
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn actions(&self) -> Vec<Arc<dyn AgentAction>> {
        match &self.code_summary {
            Some(action) => vec![Arc::clone(action) as Arc<dyn AgentAction>],
            None => Vec::new(),
        }
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One repository studied in depth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Repo {
    pub name: String,
    pub description: String,
    pub stars: u32,
    pub languages: Vec<String>,
    pub readme_summary: String,
    pub code_overview: String,
    pub last_update: String,
    pub license: String,
    pub last_commit: String,
    pub other: String,
}

/// A repository mentioned only briefly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RepoRef {
    pub name: String,
    pub author: String,
    pub short_summary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SponsorRef {
    pub name: String,
    pub id: String,
    pub currently_active_sponsorship: bool,
    pub sponsorship_amount: u32,
}

/// Record extracted from a code-hosting profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CodeRepoResult {
    pub username: String,
    pub company: String,
    pub location: String,
    pub personal_bio: String,
    pub email: String,
    pub socials: String,
    pub achievements: String,
    pub contributions_last_year: u32,
    pub repositories_detailed: Vec<Repo>,
    pub repositories_basic: Vec<RepoRef>,
    pub other_people_starred_repos: Vec<RepoRef>,
    pub sponsoring_projects_or_users: Vec<SponsorRef>,
    pub profile_summary: String,
}
