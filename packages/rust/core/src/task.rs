//! One extraction: a link, its strategy, a borrowed session and the agent.

use tracing::{debug, info, instrument, warn};

use profilecrawl_browser::{AgentRequest, AgentRun, ExtractionAgent, SessionPool, SessionProvider};
use profilecrawl_shared::{Link, ProfileCrawlError, Result, Subject, TaskOutcome};
use profilecrawl_strategies::Strategy;

use crate::diagnostics::DiagnosticSink;

/// Build the agent request for a link. `step_cap` bounds the strategy's own budget.
pub fn build_request(
    subject: &Subject,
    link: &Link,
    strategy: &dyn Strategy,
    step_cap: u32,
) -> AgentRequest {
    AgentRequest {
        task: strategy.task_description(subject, link),
        schema: strategy.output_schema().clone(),
        actions: strategy.actions(),
        allowed_domains: strategy.allowed_domains(),
        max_steps: strategy.max_steps().min(step_cap),
    }
}

/// Run one extraction to completion and turn whatever happens into an outcome.
///
/// Never fails: agent errors, an exhausted step budget and schema mismatches
/// all become [`TaskOutcome::failure`]. The session is back in the pool
/// before diagnostics are written or the payload is validated. Steps taken
/// before an agent error are still recorded.
#[instrument(skip_all, fields(strategy = %strategy.name(), url = %link.url))]
pub async fn run_extraction<P, A>(
    subject: &Subject,
    link: &Link,
    strategy: &dyn Strategy,
    pool: &SessionPool<P>,
    agent: &A,
    diagnostics: &dyn DiagnosticSink,
    step_cap: u32,
) -> TaskOutcome
where
    P: SessionProvider,
    A: ExtractionAgent<P::Session>,
{
    let name = strategy.name();
    let request = build_request(subject, link, strategy, step_cap);

    let run = match run_in_session(pool, agent, &request).await {
        Ok(run) => run,
        Err(e) => {
            warn!(error = %e, "extraction failed");
            return TaskOutcome::failure(name, link.clone(), e.to_string());
        }
    };

    diagnostics.record_history(name, &run.history);

    if let Some(message) = run.failure {
        let e = ProfileCrawlError::Agent(message);
        warn!(error = %e, steps = run.steps, "extraction failed");
        return TaskOutcome::failure(name, link.clone(), e.to_string());
    }

    let Some(raw) = run.final_result else {
        let e = ProfileCrawlError::StepBudgetExhausted { steps: run.steps };
        warn!(error = %e, "extraction produced no result");
        return TaskOutcome::failure(name, link.clone(), e.to_string());
    };

    match request.schema.validate(&raw) {
        Ok(record) => {
            diagnostics.record_extraction(name, &record);
            info!(steps = run.steps, "extraction succeeded");
            TaskOutcome::success(name, link.clone(), record)
        }
        Err(e) => {
            warn!(error = %e, "agent result rejected");
            TaskOutcome::failure(name, link.clone(), e.to_string())
        }
    }
}

async fn run_in_session<P, A>(
    pool: &SessionPool<P>,
    agent: &A,
    request: &AgentRequest,
) -> Result<AgentRun>
where
    P: SessionProvider,
    A: ExtractionAgent<P::Session>,
{
    let mut lease = pool.acquire().await?;
    debug!("session acquired");
    agent.run(&mut *lease, request).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use profilecrawl_strategies::{CodeHostStrategy, CodeRepoResult, WebsiteStrategy};

    use super::*;
    use crate::testing::{Behavior, RecordingSink, StubAgent, StubProvider, minimal};

    fn ada() -> Subject {
        Subject::new("Ada Lovelace", vec![])
    }

    async fn pool() -> SessionPool<StubProvider> {
        SessionPool::warm_up(StubProvider::default(), 1).await.unwrap()
    }

    #[tokio::test]
    async fn valid_payload_succeeds() {
        let pool = pool().await;
        let agent = StubAgent::default().on("github.com", Behavior::Answer(minimal::<CodeRepoResult>()));
        let sink = RecordingSink::default();
        let link = Link::new("https://github.com/ada", "");

        let outcome = run_extraction(
            &ada(),
            &link,
            &CodeHostStrategy::generic(),
            &pool,
            &agent,
            &sink,
            250,
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.strategy, "code_repo");
        assert_eq!(outcome.record.unwrap()["contributions_last_year"], 0);
        assert_eq!(*sink.extractions.lock().unwrap(), vec!["code_repo"]);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_is_a_failure() {
        let pool = pool().await;
        let agent = StubAgent::default();
        let sink = RecordingSink::default();
        let link = Link::new("https://ada.dev", "");

        let outcome =
            run_extraction(&ada(), &link, &WebsiteStrategy::new(), &pool, &agent, &sink, 40).await;

        assert!(!outcome.success);
        assert!(outcome.record.is_none());
        assert!(outcome.error.unwrap().contains("step budget exhausted after 40 steps"));
        // history is still written for failed runs
        assert_eq!(*sink.histories.lock().unwrap(), vec![("website".to_string(), 1)]);
        assert!(sink.extractions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_failure() {
        let pool = pool().await;
        let agent = StubAgent::default().on("ada.dev", Behavior::Answer("{\"root_url\": 1}".into()));
        let link = Link::new("https://ada.dev", "");

        let outcome = run_extraction(
            &ada(),
            &link,
            &WebsiteStrategy::new(),
            &pool,
            &agent,
            &RecordingSink::default(),
            250,
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("website.v1"));
    }

    #[tokio::test]
    async fn agent_error_returns_the_session() {
        let pool = pool().await;
        let agent = StubAgent::default().on("ada.dev", Behavior::Fail);
        let link = Link::new("https://ada.dev", "");

        let outcome = run_extraction(
            &ada(),
            &link,
            &WebsiteStrategy::new(),
            &pool,
            &agent,
            &RecordingSink::default(),
            250,
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("browser crashed"));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn agent_error_mid_run_keeps_its_history() {
        let pool = pool().await;
        let agent = StubAgent::default().on("ada.dev", Behavior::Crash);
        let sink = RecordingSink::default();
        let link = Link::new("https://ada.dev", "");

        let outcome =
            run_extraction(&ada(), &link, &WebsiteStrategy::new(), &pool, &agent, &sink, 250).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("agent error: tab crashed"));
        assert_eq!(*sink.histories.lock().unwrap(), vec![("website".to_string(), 2)]);
        assert!(sink.extractions.lock().unwrap().is_empty());
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn step_cap_bounds_strategy_budget() {
        let pool = pool().await;
        let agent = StubAgent::default();
        let link = Link::new("https://ada.dev", "");

        run_extraction(&ada(), &link, &WebsiteStrategy::new(), &pool, &agent, &RecordingSink::default(), 25)
            .await;
        run_extraction(&ada(), &link, &WebsiteStrategy::new(), &pool, &agent, &RecordingSink::default(), 1_000)
            .await;

        assert_eq!(*agent.budgets.lock().unwrap(), vec![25, 250]);
        assert_eq!(pool.available(), 1);
        assert_eq!(agent.running.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn request_carries_strategy_configuration() {
        let github = CodeHostStrategy::github().unwrap();
        let link = Link::new("https://github.com/ada", "");
        let request = build_request(&ada(), &link, &github, 250);

        assert!(request.task.contains("https://github.com/ada"));
        assert_eq!(request.schema.id(), "code_repo.v1");
        assert_eq!(request.actions.len(), 1);
        assert!(request.allowed_domains.is_some());
        assert_eq!(request.max_steps, 250);
    }
}
