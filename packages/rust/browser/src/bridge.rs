//! Agent bridge: one subprocess per browser session, spoken to in JSON lines.
//!
//! The bridge process owns the browser and the LLM-driven agent loop. The
//! host sends `reset`/`run`/`action_result`/`shutdown` messages on stdin and
//! reads `ready`/`reset_done`/`step`/`action`/`result`/`error` messages from
//! stdout. Lines that are not protocol messages are logged and skipped.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, instrument, trace, warn};

use profilecrawl_shared::{AppConfig, ProfileCrawlError, Result, resolve_model};

use crate::agent::{AgentRequest, AgentRun, ExtractionAgent, SessionProvider};

/// Grace period for a bridge to exit after `shutdown`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process and agent settings for bridge-backed sessions.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub ready_timeout: Duration,
    pub reset_timeout: Duration,
    pub model: String,
    pub temperature: f32,
    pub headless: bool,
    pub storage_state: Option<String>,
}

impl From<&AppConfig> for BridgeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            command: config.bridge.command.clone(),
            args: config.bridge.args.clone(),
            working_dir: PathBuf::from(&config.bridge.working_dir),
            ready_timeout: Duration::from_secs(config.bridge.ready_timeout_secs),
            reset_timeout: Duration::from_secs(config.bridge.reset_timeout_secs),
            model: resolve_model(&config.agent),
            temperature: config.agent.temperature,
            headless: config.agent.headless,
            storage_state: config.agent.storage_state.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Host → bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage<'a> {
    Reset,
    Run {
        id: u64,
        task: &'a str,
        output_schema: &'a Value,
        allowed_domains: Option<&'a [String]>,
        max_steps: u32,
        actions: Vec<ActionSpec<'a>>,
        model: &'a str,
        temperature: f32,
        headless: bool,
        storage_state: Option<&'a str>,
    },
    ActionResult {
        call_id: String,
        ok: bool,
        content: String,
    },
    Shutdown,
}

/// Action advertised to the bridge in a `run` message.
#[derive(Debug, Serialize)]
pub struct ActionSpec<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: Value,
}

/// Bridge → host.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    Ready,
    ResetDone,
    Step {
        id: u64,
        step: Value,
    },
    Action {
        id: u64,
        call_id: String,
        name: String,
        #[serde(default)]
        args: Value,
    },
    Result {
        id: u64,
        #[serde(default)]
        final_result: Option<String>,
        #[serde(default)]
        steps: u32,
    },
    Error {
        #[serde(default)]
        id: Option<u64>,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// A live bridge connection.
pub struct BridgeSession {
    child: Option<Child>,
    writer: Writer,
    reader: Lines<BufReader<Reader>>,
}

impl BridgeSession {
    /// Wrap an arbitrary byte stream pair. Used for spawned processes and in tests.
    pub fn from_io(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        let reader: Reader = Box::new(reader);
        Self {
            child: None,
            writer: Box::new(writer),
            reader: BufReader::new(reader).lines(),
        }
    }

    pub async fn send(&mut self, message: &HostMessage<'_>) -> Result<()> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| ProfileCrawlError::Bridge(format!("failed to encode message: {e}")))?;
        line.push('\n');

        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ProfileCrawlError::Bridge(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| ProfileCrawlError::Bridge(format!("flush failed: {e}")))
    }

    pub async fn recv(&mut self) -> Result<BridgeMessage> {
        loop {
            let line = self
                .reader
                .next_line()
                .await
                .map_err(|e| ProfileCrawlError::Bridge(format!("read failed: {e}")))?
                .ok_or_else(|| ProfileCrawlError::Bridge("bridge closed its output".into()))?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<BridgeMessage>(trimmed) {
                Ok(message) => return Ok(message),
                Err(_) => trace!(line = trimmed, "non-protocol bridge output"),
            }
        }
    }

    async fn wait_ready(&mut self) -> Result<()> {
        loop {
            match self.recv().await? {
                BridgeMessage::Ready => return Ok(()),
                BridgeMessage::Error { error, .. } => {
                    return Err(ProfileCrawlError::Bridge(error));
                }
                other => debug!(?other, "ignoring message before ready"),
            }
        }
    }

    async fn reset_exchange(&mut self) -> Result<()> {
        self.send(&HostMessage::Reset).await?;
        loop {
            match self.recv().await? {
                BridgeMessage::ResetDone => return Ok(()),
                BridgeMessage::Error { error, .. } => {
                    return Err(ProfileCrawlError::Session(error));
                }
                other => debug!(?other, "ignoring message during reset"),
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "profilecrawl::bridge", "{line}");
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Spawns one bridge subprocess per session.
pub struct BridgeSessionProvider {
    config: BridgeConfig,
}

impl BridgeSessionProvider {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionProvider for BridgeSessionProvider {
    type Session = BridgeSession;

    #[instrument(skip_all, fields(command = %self.config.command))]
    async fn create(&self) -> Result<BridgeSession> {
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProfileCrawlError::Bridge(format!(
                    "failed to spawn '{}': {e}",
                    self.config.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProfileCrawlError::Bridge("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProfileCrawlError::Bridge("bridge stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let mut session = BridgeSession::from_io(stdout, stdin);
        session.child = Some(child);

        match tokio::time::timeout(self.config.ready_timeout, session.wait_ready()).await {
            Ok(Ok(())) => {
                info!("bridge ready");
                Ok(session)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProfileCrawlError::Bridge(format!(
                "bridge not ready after {}s",
                self.config.ready_timeout.as_secs()
            ))),
        }
    }

    async fn reset(&self, session: &mut BridgeSession) -> Result<()> {
        match tokio::time::timeout(self.config.reset_timeout, session.reset_exchange()).await {
            Ok(result) => result,
            Err(_) => Err(ProfileCrawlError::Session(format!(
                "bridge did not acknowledge reset within {}s",
                self.config.reset_timeout.as_secs_f32()
            ))),
        }
    }

    async fn destroy(&self, mut session: BridgeSession) -> Result<()> {
        if let Err(e) = session.send(&HostMessage::Shutdown).await {
            debug!(error = %e, "bridge did not accept shutdown");
        }

        let Some(mut child) = session.child.take() else {
            return Ok(());
        };
        drop(session);

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(ProfileCrawlError::Session(format!(
                "bridge exited with {status}"
            ))),
            Ok(Err(e)) => Err(ProfileCrawlError::Session(format!(
                "failed to wait for bridge: {e}"
            ))),
            Err(_) => {
                warn!("bridge ignored shutdown, killing it");
                child
                    .kill()
                    .await
                    .map_err(|e| ProfileCrawlError::Session(format!("failed to kill bridge: {e}")))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Drives one extraction over a bridge session and serves its action calls.
pub struct BridgeAgent {
    config: BridgeConfig,
    next_id: AtomicU64,
}

impl BridgeAgent {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Pump messages for run `id` until it reports a result, collecting steps as they arrive.
    async fn drive(
        &self,
        session: &mut BridgeSession,
        request: &AgentRequest,
        id: u64,
        history: &mut Vec<Value>,
    ) -> Result<(Option<String>, u32)> {
        loop {
            match session.recv().await? {
                BridgeMessage::Step { id: run, step } if run == id => history.push(step),
                BridgeMessage::Action {
                    id: run,
                    call_id,
                    name,
                    args,
                } if run == id => {
                    let (ok, content) = match request.actions.iter().find(|a| a.name() == name) {
                        Some(action) => match action.call(args).await {
                            Ok(content) => (true, content),
                            Err(e) => {
                                warn!(action = %name, error = %e, "action failed");
                                (false, e.to_string())
                            }
                        },
                        None => (false, format!("unknown action '{name}'")),
                    };
                    session
                        .send(&HostMessage::ActionResult {
                            call_id,
                            ok,
                            content,
                        })
                        .await?;
                }
                BridgeMessage::Result {
                    id: run,
                    final_result,
                    steps,
                } if run == id => return Ok((final_result, steps)),
                BridgeMessage::Error { id: run, error } if run.is_none_or(|r| r == id) => {
                    return Err(ProfileCrawlError::Agent(error));
                }
                other => debug!(?other, "ignoring message from another run"),
            }
        }
    }
}

#[async_trait]
impl ExtractionAgent<BridgeSession> for BridgeAgent {
    #[instrument(skip_all, fields(schema = %request.schema.id(), max_steps = request.max_steps))]
    async fn run(&self, session: &mut BridgeSession, request: &AgentRequest) -> Result<AgentRun> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let actions = request
            .actions
            .iter()
            .map(|a| ActionSpec {
                name: a.name(),
                description: a.description(),
                parameters: a.parameters(),
            })
            .collect();

        session
            .send(&HostMessage::Run {
                id,
                task: &request.task,
                output_schema: request.schema.json_schema(),
                allowed_domains: request.allowed_domains.as_deref(),
                max_steps: request.max_steps,
                actions,
                model: &self.config.model,
                temperature: self.config.temperature,
                headless: self.config.headless,
                storage_state: self.config.storage_state.as_deref(),
            })
            .await?;

        let mut history = Vec::new();
        match self.drive(session, request, id, &mut history).await {
            Ok((final_result, steps)) => {
                let steps = if steps == 0 {
                    history.len() as u32
                } else {
                    steps
                };
                debug!(steps, has_result = final_result.is_some(), "agent finished");
                Ok(AgentRun {
                    final_result,
                    steps,
                    history,
                    failure: None,
                })
            }
            Err(e) => {
                let failure = match e {
                    ProfileCrawlError::Agent(message) => message,
                    other => other.to_string(),
                };
                debug!(steps = history.len(), %failure, "agent stopped");
                Ok(AgentRun {
                    final_result: None,
                    steps: history.len() as u32,
                    history,
                    failure: Some(failure),
                })
            }
        }
    }
}
