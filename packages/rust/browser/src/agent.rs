//! Seams between the orchestrator and the browsing agent.
//!
//! [`SessionProvider`] owns the lifecycle of browser sessions; the pool
//! calls it. [`ExtractionAgent`] drives one extraction inside a leased
//! session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use profilecrawl_shared::Result;
use profilecrawl_strategies::{AgentAction, OutputSchema};

/// Creates, resets and destroys browser sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    type Session: Send + 'static;

    /// Launch a new session.
    async fn create(&self) -> Result<Self::Session>;

    /// Return the session to a clean, navigable state.
    async fn reset(&self, session: &mut Self::Session) -> Result<()>;

    /// Release everything the session holds.
    async fn destroy(&self, session: Self::Session) -> Result<()>;
}

/// Everything the agent needs for one extraction.
#[derive(Clone)]
pub struct AgentRequest {
    pub task: String,
    pub schema: OutputSchema,
    pub actions: Vec<Arc<dyn AgentAction>>,
    pub allowed_domains: Option<Vec<String>>,
    pub max_steps: u32,
}

impl std::fmt::Debug for AgentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRequest")
            .field("schema", &self.schema.id())
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name().to_string()).collect::<Vec<_>>(),
            )
            .field("allowed_domains", &self.allowed_domains)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

/// What the agent produced.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    /// Raw final answer. `None` when the step budget ran out first.
    pub final_result: Option<String>,
    /// Steps actually taken.
    pub steps: u32,
    /// Per-step history, written out as diagnostics in verbose mode.
    pub history: Vec<Value>,
    /// Set when the agent stopped on an error after the run started.
    /// `history` still holds the steps taken before it.
    pub failure: Option<String>,
}

/// Runs a page-reading agent inside a session.
#[async_trait]
pub trait ExtractionAgent<S: Send>: Send + Sync {
    async fn run(&self, session: &mut S, request: &AgentRequest) -> Result<AgentRun>;
}
