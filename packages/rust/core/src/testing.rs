//! Stub collaborators shared by this crate's tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use profilecrawl_browser::{AgentRequest, AgentRun, ExtractionAgent, SessionProvider};
use profilecrawl_shared::{ProfileCrawlError, Result};

use crate::diagnostics::DiagnosticSink;

/// Sessions are plain ids.
#[derive(Default)]
pub struct StubProvider {
    pub created: AtomicUsize,
    pub resets: AtomicUsize,
    pub fail_create: bool,
}

#[async_trait]
impl SessionProvider for StubProvider {
    type Session = usize;

    async fn create(&self) -> Result<usize> {
        if self.fail_create {
            return Err(ProfileCrawlError::Session("browser did not start".into()));
        }
        Ok(self.created.fetch_add(1, Ordering::SeqCst))
    }

    async fn reset(&self, _session: &mut usize) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self, _session: usize) -> Result<()> {
        Ok(())
    }
}

/// What the stub agent does for a task whose description mentions a given fragment.
#[derive(Clone)]
pub enum Behavior {
    /// Return this payload verbatim.
    Answer(String),
    /// Return this payload after a delay.
    Slow(Duration, String),
    /// Use every step without producing a result.
    Exhaust,
    /// Report an internal agent error.
    Fail,
    /// Take two steps, then stop on an internal error.
    Crash,
    Panic,
    /// Never finish.
    Hang,
}

/// Agent whose behavior is scripted per URL fragment.
#[derive(Default)]
pub struct StubAgent {
    script: Vec<(String, Behavior)>,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
    pub budgets: Mutex<Vec<u32>>,
}

impl StubAgent {
    pub fn on(mut self, fragment: &str, behavior: Behavior) -> Self {
        self.script.push((fragment.to_string(), behavior));
        self
    }

    fn behavior_for(&self, task: &str) -> Behavior {
        self.script
            .iter()
            .find(|(fragment, _)| task.contains(fragment.as_str()))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or(Behavior::Exhaust)
    }
}

#[async_trait]
impl ExtractionAgent<usize> for StubAgent {
    async fn run(&self, _session: &mut usize, request: &AgentRequest) -> Result<AgentRun> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.budgets.lock().unwrap().push(request.max_steps);

        // Yield so siblings get a chance to overlap.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let result = match self.behavior_for(&request.task) {
            Behavior::Answer(payload) => Ok(finished(payload)),
            Behavior::Slow(delay, payload) => {
                tokio::time::sleep(delay).await;
                Ok(finished(payload))
            }
            Behavior::Exhaust => Ok(AgentRun {
                final_result: None,
                steps: request.max_steps,
                history: vec![serde_json::json!({"step": "scroll"})],
                failure: None,
            }),
            Behavior::Fail => Err(ProfileCrawlError::Agent("browser crashed".into())),
            Behavior::Crash => Ok(AgentRun {
                final_result: None,
                steps: 2,
                history: vec![
                    serde_json::json!({"step": "open"}),
                    serde_json::json!({"step": "click"}),
                ],
                failure: Some("tab crashed".into()),
            }),
            Behavior::Panic => panic!("agent blew up"),
            Behavior::Hang => std::future::pending().await,
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn finished(payload: String) -> AgentRun {
    AgentRun {
        final_result: Some(payload),
        steps: 3,
        history: vec![serde_json::json!({"step": "open"})],
        failure: None,
    }
}

/// Remembers what it was asked to write.
#[derive(Default)]
pub struct RecordingSink {
    pub extractions: Mutex<Vec<String>>,
    pub histories: Mutex<Vec<(String, usize)>>,
}

impl DiagnosticSink for RecordingSink {
    fn record_extraction(&self, strategy: &str, _record: &Value) {
        self.extractions.lock().unwrap().push(strategy.to_string());
    }

    fn record_history(&self, strategy: &str, history: &[Value]) {
        self.histories
            .lock()
            .unwrap()
            .push((strategy.to_string(), history.len()));
    }
}

/// A minimal record that satisfies the given record type's schema.
pub fn minimal<T: Default + serde::Serialize>() -> String {
    serde_json::to_string(&T::default()).unwrap()
}

pub fn temp_dir(label: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("pc-{label}-test-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
