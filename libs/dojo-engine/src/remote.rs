/// Remote Execution Client - Kotlin via a Piston-style service
///
/// **Flow:**
/// 1. Wrap the source in `fun main()` when it has no entry point
/// 2. POST it with stdin to the execute endpoint
/// 3. Map the compile and run stages onto an `ExecutionResult`
///
/// Every failure, including an unreachable service, resolves to the
/// error half of the result. There are no retries.
///
/// **Phases:**
/// When the caller passes a `PhaseSender`, progress is reported as
/// Idle → Sending → Compiling → Running → Idle. Compiling and Running are
/// each held for the configured pacing delay. The final Idle is sent by a
/// drop guard so it is emitted on every exit path.

use crate::error::EngineError;
use dojo_common::config::RemoteConfig;
use dojo_common::types::{ExecutionError, ExecutionPhase, ExecutionResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Receives every phase transition of a remote run, in order
pub type PhaseSender = mpsc::UnboundedSender<ExecutionPhase>;

static ENTRY_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfun\s+main\s*\(").expect("entry point pattern is valid")
});

static PREAMBLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(package|import)\s").expect("preamble pattern is valid")
});

/// True when the source declares `fun main(` somewhere.
/// Matches inside comments and strings count too.
pub fn has_entry_point(source: &str) -> bool {
    ENTRY_POINT.is_match(source)
}

/// Wrap top-level statements in `fun main()` when no entry point exists.
///
/// Leading `package`/`import` lines (and blank lines between them) stay
/// above the synthesized function.
pub fn ensure_entry_point(source: &str) -> Cow<'_, str> {
    if has_entry_point(source) {
        return Cow::Borrowed(source);
    }

    let lines: Vec<&str> = source.lines().collect();
    let split = lines
        .iter()
        .take_while(|line| line.trim().is_empty() || PREAMBLE_LINE.is_match(line))
        .count();
    let (preamble, body) = lines.split_at(split);

    let mut wrapped = String::with_capacity(source.len() + 32);
    for line in preamble.iter().filter(|l| !l.trim().is_empty()) {
        wrapped.push_str(line);
        wrapped.push('\n');
    }
    if !wrapped.is_empty() {
        wrapped.push('\n');
    }
    wrapped.push_str("fun main() {\n");
    for line in body {
        wrapped.push_str(line);
        wrapped.push('\n');
    }
    wrapped.push_str("}\n");

    Cow::Owned(wrapped)
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<SourceFile<'a>>,
    stdin: &'a str,
    args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StageOutput {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    signal: Option<String>,
}

impl StageOutput {
    /// Only an explicit zero exit is success. A null or missing code
    /// means the process was killed or never reported one.
    fn failed(&self) -> bool {
        self.code != Some(0) || self.signal.is_some()
    }

    fn stderr(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    compile: Option<StageOutput>,
    #[serde(default)]
    run: Option<StageOutput>,
}

/// Raw outcome of a remote run before it is split into log lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub error: Option<ExecutionError>,
}

impl RemoteOutput {
    fn failed(error: ExecutionError) -> Self {
        Self {
            stdout: String::new(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> ExecutionResult {
        let logs = if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().map(str::to_string).collect()
        };
        ExecutionResult {
            logs,
            error: self.error,
        }
    }
}

/// Emits phase transitions and resets to Idle when dropped
struct PhaseReporter<'a> {
    sender: Option<&'a PhaseSender>,
}

impl<'a> PhaseReporter<'a> {
    fn new(sender: Option<&'a PhaseSender>) -> Self {
        let reporter = Self { sender };
        reporter.set(ExecutionPhase::Idle);
        reporter
    }

    fn active(&self) -> bool {
        self.sender.is_some()
    }

    fn set(&self, phase: ExecutionPhase) {
        if let Some(sender) = self.sender {
            // Nobody listening is fine
            let _ = sender.send(phase);
        }
    }
}

impl Drop for PhaseReporter<'_> {
    fn drop(&mut self) {
        self.set(ExecutionPhase::Idle);
    }
}

/// HTTP client for the remote compile-and-run service
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteExecutor {
    pub fn new(config: RemoteConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dojo-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Run Kotlin source remotely and collect its output lines
    pub async fn run_kotlin(
        &self,
        source: &str,
        input: &str,
        phases: Option<&PhaseSender>,
    ) -> ExecutionResult {
        self.execute(source, input, phases).await.into_result()
    }

    #[instrument(skip_all, fields(endpoint = %self.config.endpoint))]
    pub async fn execute(
        &self,
        source: &str,
        input: &str,
        phases: Option<&PhaseSender>,
    ) -> RemoteOutput {
        let reporter = PhaseReporter::new(phases);
        let content = ensure_entry_point(source);
        if matches!(content, Cow::Owned(_)) {
            debug!("No entry point found, wrapped source in fun main()");
        }

        let request = ExecuteRequest {
            language: &self.config.language,
            version: &self.config.version,
            files: vec![SourceFile {
                name: &self.config.file_name,
                content: &content,
            }],
            stdin: input,
            args: Vec::new(),
        };

        reporter.set(ExecutionPhase::Sending);
        let response = match self.client.post(&self.config.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Execution service unreachable");
                return RemoteOutput::failed(ExecutionError::Transport(format!(
                    "Failed to reach execution service: {}",
                    e
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Execution service rejected request");
            return RemoteOutput::failed(ExecutionError::Transport(format!(
                "Execution service returned HTTP {}",
                status.as_u16()
            )));
        }

        reporter.set(ExecutionPhase::Compiling);
        self.hold(&reporter).await;

        let body: ExecuteResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Malformed response from execution service");
                return RemoteOutput::failed(ExecutionError::Transport(format!(
                    "Invalid response from execution service: {}",
                    e
                )));
            }
        };

        if let Some(message) = body.message {
            return RemoteOutput::failed(ExecutionError::Transport(message));
        }

        if let Some(compile) = body.compile.as_ref().filter(|c| c.failed()) {
            let stderr = compile.stderr();
            let message = if stderr.trim().is_empty() {
                "Compilation failed".to_string()
            } else {
                stderr.to_string()
            };
            debug!(code = ?compile.code, signal = ?compile.signal, "Remote compilation failed");
            return RemoteOutput::failed(ExecutionError::Compile(message));
        }

        reporter.set(ExecutionPhase::Running);
        self.hold(&reporter).await;

        let run = body.run.unwrap_or_default();
        let stdout = run.stdout.as_deref().unwrap_or("").trim().to_string();
        let error = if run.failed() && !run.stderr().is_empty() {
            Some(ExecutionError::Runtime(run.stderr().to_string()))
        } else {
            None
        };

        debug!(
            code = ?run.code,
            signal = ?run.signal,
            stdout_len = stdout.len(),
            "Remote run finished"
        );
        RemoteOutput { stdout, error }
    }

    async fn hold(&self, reporter: &PhaseReporter<'_>) {
        if reporter.active() && self.config.phase_delay_ms > 0 {
            tokio::time::sleep(self.config.phase_delay()).await;
        }
    }
}
