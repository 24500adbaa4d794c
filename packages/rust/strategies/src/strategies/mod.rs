//! Extraction strategy trait and the host-based strategy registry.
//!
//! A strategy describes how to extract one kind of profile page: the task
//! text for the agent, the record schema, extra actions, where the agent may
//! navigate, and how many steps it may take.

mod code_host;
mod model_hub;
mod professional;
mod social_feed;
mod website;

use std::sync::Arc;

use profilecrawl_shared::{Link, Result, Subject};
use url::Url;

use crate::actions::AgentAction;
use crate::schema::OutputSchema;

pub use code_host::{CodeHostStrategy, CodeRepoResult, Repo, RepoRef, SponsorRef};
pub use model_hub::{
    Activity, DatasetReference, HfResult, HfStats, ModelHubStrategy, ModelReference, Reference,
};
pub use professional::{
    LinkedinCertification, LinkedinEducation, LinkedinExperience, LinkedinPersonalInfo,
    LinkedinResult, ProfessionalNetworkStrategy,
};
pub use social_feed::{SocialFeedStrategy, XResult};
pub use website::{Page, PageChunk, WebsiteResult, WebsiteStrategy};

/// Step budget used when a strategy does not choose its own.
pub const DEFAULT_MAX_STEPS: u32 = 250;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Domain-specific extraction configuration.
///
/// Strategies are stateless and shared across concurrently running tasks.
pub trait Strategy: Send + Sync {
    /// Stable name; keys the per-strategy output directory and the merged report.
    fn name(&self) -> &str;

    /// Natural-language task handed to the agent for this link.
    fn task_description(&self, subject: &Subject, link: &Link) -> String;

    /// Schema the agent's final answer must satisfy.
    fn output_schema(&self) -> &OutputSchema;

    /// Extra host-side actions the agent may call.
    fn actions(&self) -> Vec<Arc<dyn AgentAction>> {
        Vec::new()
    }

    /// Host glob patterns the agent may navigate to. `None` means unrestricted.
    fn allowed_domains(&self) -> Option<Vec<String>> {
        None
    }

    /// Maximum agent iterations before forced termination.
    fn max_steps(&self) -> u32 {
        DEFAULT_MAX_STEPS
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// How a classification rule matches a normalized host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRule {
    /// Host equals the given value (after `www.` stripping).
    Exact(String),
    /// Host contains the given substring (e.g. `gitlab`).
    Contains(String),
}

impl HostRule {
    pub fn exact(host: impl Into<String>) -> Self {
        Self::Exact(host.into().to_lowercase())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into().to_lowercase())
    }

    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(expected) => host == expected,
            Self::Contains(fragment) => host.contains(fragment.as_str()),
        }
    }
}

/// Maps a link's host to its extraction strategy.
///
/// Rules are tried in registration order; unmatched hosts fall back to the
/// generic website strategy.
pub struct StrategyRegistry {
    rules: Vec<(HostRule, Arc<dyn Strategy>)>,
    fallback: Arc<dyn Strategy>,
}

impl StrategyRegistry {
    /// Create a registry with all built-in strategies.
    pub fn new() -> Result<Self> {
        let github: Arc<dyn Strategy> = Arc::new(CodeHostStrategy::github()?);
        let code_repo: Arc<dyn Strategy> = Arc::new(CodeHostStrategy::generic());
        let linkedin: Arc<dyn Strategy> = Arc::new(ProfessionalNetworkStrategy::new());
        let x: Arc<dyn Strategy> = Arc::new(SocialFeedStrategy::new());
        let huggingface: Arc<dyn Strategy> = Arc::new(ModelHubStrategy::new());

        let mut registry = Self::with_fallback(Arc::new(WebsiteStrategy::new()));
        registry
            .register(HostRule::exact("github.com"), github)
            .register(HostRule::contains("gitlab"), code_repo.clone())
            .register(HostRule::contains("bitbucket"), code_repo)
            .register(HostRule::exact("huggingface.co"), huggingface)
            .register(HostRule::exact("linkedin.com"), linkedin)
            .register(HostRule::exact("x.com"), x.clone())
            .register(HostRule::exact("twitter.com"), x);

        Ok(registry)
    }

    /// Create an empty registry that sends every link to `fallback`.
    pub fn with_fallback(fallback: Arc<dyn Strategy>) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Add a classification rule. Existing strategies are untouched.
    pub fn register(&mut self, rule: HostRule, strategy: Arc<dyn Strategy>) -> &mut Self {
        self.rules.push((rule, strategy));
        self
    }

    /// Pick the strategy for a URL. Always returns a strategy.
    pub fn classify(&self, url: &str) -> Arc<dyn Strategy> {
        let Some(host) = normalize_host(url) else {
            return Arc::clone(&self.fallback);
        };

        self.rules
            .iter()
            .find(|(rule, _)| rule.matches(&host))
            .map(|(_, strategy)| Arc::clone(strategy))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Names of every strategy the registry can hand out, fallback last.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (_, strategy) in &self.rules {
            if !names.iter().any(|n| n == strategy.name()) {
                names.push(strategy.name().to_string());
            }
        }
        if !names.iter().any(|n| n == self.fallback.name()) {
            names.push(self.fallback.name().to_string());
        }
        names
    }
}

/// Lowercased host with scheme and a leading `www.` stripped.
///
/// Scheme-less input (`github.com/ada`) is read as `https://`.
pub fn normalize_host(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) if u.host_str().is_some() => u,
        _ => Url::parse(&format!("https://{trimmed}")).ok()?,
    };

    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    (!host.is_empty()).then_some(host)
}

/// Render the link's free-text tag as a sentence, or nothing when empty.
pub(crate) fn tag_hint(link: &Link, template: impl FnOnce(&str) -> String) -> String {
    let tag = link.description.trim();
    if tag.is_empty() {
        String::new()
    } else {
        template(tag)
    }
}
