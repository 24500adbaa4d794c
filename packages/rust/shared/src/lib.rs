//! Shared types, error model, and configuration for ProfileCrawl.
//!
//! This crate is the foundation depended on by all other ProfileCrawl crates.
//! It provides:
//! - [`ProfileCrawlError`] - the unified error type
//! - Domain types ([`Subject`], [`Link`], [`TaskOutcome`], [`RunId`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config and subject loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AgentConfig, AppConfig, BridgeProcessConfig, DefaultsConfig, RunConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, load_subject, resolve_model,
};
pub use error::{ProfileCrawlError, Result};
pub use types::{Link, RunId, Subject, TaskOutcome, slugify, subject_slug};
