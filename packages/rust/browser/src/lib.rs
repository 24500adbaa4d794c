//! Browser sessions and the page-reading agent seam.
//!
//! This crate provides:
//! - [`SessionProvider`] / [`ExtractionAgent`] - Traits the orchestrator drives
//! - [`SessionPool`] - Fixed-size pool of pre-warmed sessions with RAII leases
//! - [`bridge`] - Subprocess-backed sessions speaking a JSON-lines protocol

pub mod agent;
pub mod bridge;
pub mod pool;

pub use agent::{AgentRequest, AgentRun, ExtractionAgent, SessionProvider};
pub use bridge::{BridgeAgent, BridgeConfig, BridgeSession, BridgeSessionProvider};
pub use pool::{SessionLease, SessionPool, TeardownReport};
