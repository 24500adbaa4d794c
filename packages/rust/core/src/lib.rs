//! Extraction orchestration for ProfileCrawl.
//!
//! This crate ties the strategy registry, the session pool and the agent
//! together into end-to-end runs (e.g., [`profile_subject`]).

pub mod diagnostics;
pub mod merger;
pub mod orchestrator;
pub mod task;

#[cfg(test)]
mod testing;

pub use diagnostics::{DiagnosticSink, FsDiagnostics, NoDiagnostics};
pub use merger::{MergedReport, OutcomeSummary, RETRIEVED_AT, ReportPaths, ResultMerger};
pub use orchestrator::{
    DEADLINE_EXCEEDED, Orchestrator, ProfileRun, ProgressReporter, SilentProgress,
    profile_subject,
};
pub use task::{build_request, run_extraction};
