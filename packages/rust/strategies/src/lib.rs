//! Extraction strategies and the host-based strategy registry.
//!
//! This crate provides:
//! - [`strategies`] - Per-site strategies (code hosts, LinkedIn, X, Hugging Face, websites)
//! - [`StrategyRegistry`] - Picks the strategy for a link from its host
//! - [`schema`] - Typed output schemas and final-answer validation
//! - [`actions`] - Host-side actions the agent may call mid-run

pub mod actions;
pub mod schema;
pub mod strategies;

pub use actions::{AgentAction, GitHubCodeSummary};
pub use schema::OutputSchema;
pub use strategies::{
    CodeHostStrategy, CodeRepoResult, DEFAULT_MAX_STEPS, HfResult, HostRule, LinkedinResult,
    ModelHubStrategy, ProfessionalNetworkStrategy, SocialFeedStrategy, Strategy,
    StrategyRegistry, WebsiteResult, WebsiteStrategy, XResult, normalize_host,
};
