/// Run Orchestrator
///
/// **Responsibility:**
/// Dispatch a solution to the right backend by language and hand back an
/// `ExecutionResult`.
///
/// - TypeScript: transpiled and evaluated in-process (sandbox.rs)
/// - Kotlin: compiled and run by the remote service (remote.rs)
///
/// Nothing is cached; every call is a fresh execution.

use crate::error::EngineError;
use crate::remote::{PhaseSender, RemoteExecutor};
use crate::sandbox::Sandbox;
use async_trait::async_trait;
use dojo_common::config::EngineConfig;
use dojo_common::types::{ExecutionResult, Language};
use std::time::Instant;

/// Anything that can execute a solution against one input
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn execute(
        &self,
        language: Language,
        source: &str,
        input: &str,
        phases: Option<&PhaseSender>,
    ) -> ExecutionResult;
}

/// Production runner backed by the V8 sandbox and the remote client
#[derive(Debug, Clone)]
pub struct Executor {
    sandbox: Sandbox,
    remote: RemoteExecutor,
}

impl Executor {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            sandbox: Sandbox::new(config.sandbox.clone()),
            remote: RemoteExecutor::new(config.remote.clone())?,
        })
    }

    /// Execute once. Phases are only reported for remote languages.
    pub async fn run_code(
        &self,
        language: Language,
        source: &str,
        input: &str,
        phases: Option<&PhaseSender>,
    ) -> ExecutionResult {
        let start = Instant::now();

        let result = match language {
            Language::TypeScript => self.sandbox.run_typescript(source, input).await,
            Language::Kotlin => self.remote.run_kotlin(source, input, phases).await,
        };

        tracing::info!(
            language = %language,
            lines = result.logs.len(),
            error = result.error.as_ref().map(|e| e.kind()),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Execution finished"
        );

        result
    }
}

#[async_trait]
impl CodeRunner for Executor {
    async fn execute(
        &self,
        language: Language,
        source: &str,
        input: &str,
        phases: Option<&PhaseSender>,
    ) -> ExecutionResult {
        self.run_code(language, source, input, phases).await
    }
}
