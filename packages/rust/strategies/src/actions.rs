//! Extra capabilities a strategy can hand to the page-reading agent.
//!
//! The agent invokes an action by name with JSON arguments; the action runs
//! host-side and returns text that the agent reads as the step's result.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use profilecrawl_shared::{ProfileCrawlError, Result};

/// User-Agent string for action requests.
const USER_AGENT: &str = concat!("ProfileCrawl/", env!("CARGO_PKG_VERSION"));

/// Service that renders a whole GitHub repository as plain text.
const UITHUB_BASE: &str = "https://uithub.com";

/// Token cap requested from the repository text service.
const UITHUB_MAX_TOKENS: u32 = 10_000;

/// A named, host-side callable extension exposed to the agent.
#[async_trait]
pub trait AgentAction: Send + Sync {
    /// Name the agent uses to call this action.
    fn name(&self) -> &str;

    /// Natural-language description shown to the agent.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the action.
    async fn call(&self, args: serde_json::Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// get_github_code
// ---------------------------------------------------------------------------

/// Arguments for [`GitHubCodeSummary`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GitHubCodeArgs {
    /// Repository URL, e.g. `https://github.com/owner/repo`.
    pub repo_url: String,
}

/// Fetches the first lines of every file of a GitHub repository in one step.
pub struct GitHubCodeSummary {
    client: Client,
    base_url: String,
}

impl GitHubCodeSummary {
    pub fn new() -> Result<Self> {
        Self::with_base_url(UITHUB_BASE)
    }

    /// Point the action at a different text-rendering host.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProfileCrawlError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Rewrite a github.com repository URL onto the text-rendering host.
    pub fn code_url(&self, repo_url: &str) -> Result<Url> {
        let parsed = Url::parse(repo_url.trim())
            .map_err(|e| ProfileCrawlError::validation(format!("invalid repo_url '{repo_url}': {e}")))?;

        let host = parsed.host_str().unwrap_or("");
        if host != "github.com" && host != "www.github.com" {
            return Err(ProfileCrawlError::validation(format!(
                "repo_url must point to github.com, got '{host}'"
            )));
        }

        let path = parsed.path().trim_end_matches('/');
        if path.split('/').filter(|s| !s.is_empty()).count() < 2 {
            return Err(ProfileCrawlError::validation(format!(
                "repo_url '{repo_url}' does not name an owner/repository"
            )));
        }

        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| ProfileCrawlError::validation(format!("invalid code url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("accept", "text/plain")
            .append_pair("maxTokens", &UITHUB_MAX_TOKENS.to_string());
        Ok(url)
    }
}

#[async_trait]
impl AgentAction for GitHubCodeSummary {
    fn name(&self) -> &str {
        "get_github_code"
    }

    fn description(&self) -> &str {
        "Get GitHub code summary: the first lines of each file of a repository, in a single step"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(GitHubCodeArgs)).unwrap_or_default()
    }

    #[instrument(skip_all, fields(action = "get_github_code"))]
    async fn call(&self, args: serde_json::Value) -> Result<String> {
        let args: GitHubCodeArgs = serde_json::from_value(args)
            .map_err(|e| ProfileCrawlError::validation(format!("invalid arguments: {e}")))?;
        let url = self.code_url(&args.repo_url)?;

        debug!(%url, "fetching repository text");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ProfileCrawlError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileCrawlError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ProfileCrawlError::Network(format!("{url}: body read failed: {e}")))
    }
}
