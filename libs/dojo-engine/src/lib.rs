//! Challenge execution engine
//!
//! Runs user solutions for coding challenges. TypeScript is transpiled with
//! swc and evaluated in a fresh V8 isolate; Kotlin is compiled and run by a
//! remote Piston-style service. Submissions run every test case and score
//! the normalized output.

pub mod error;
pub mod evaluator;
pub mod executor;
pub mod remote;
pub mod sandbox;
pub mod session;
pub mod transpiler;


pub use error::{EngineError, SessionError, SubmissionError};
pub use evaluator::{normalize_output, Celebration, CelebrationError, TestSuiteRunner};
pub use executor::{CodeRunner, Executor};
pub use remote::PhaseSender;
pub use session::{ChallengeSession, SessionOutcome, SessionState, SessionView};

use dojo_common::config::EngineConfig;
use dojo_common::types::{ExecutionResult, Language, SubmissionResult, TestCase};
use std::sync::Arc;

/// Entry point used by the binaries: one runner shared by interactive runs
/// and submissions
#[derive(Clone)]
pub struct ChallengeEngine {
    runner: Arc<dyn CodeRunner>,
    suite: TestSuiteRunner,
}

impl ChallengeEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let executor = Executor::new(&config)?;
        Ok(Self::with_runner(Arc::new(executor)))
    }

    pub fn with_runner(runner: Arc<dyn CodeRunner>) -> Self {
        Self {
            suite: TestSuiteRunner::new(runner.clone()),
            runner,
        }
    }

    pub fn with_celebration(mut self, celebration: Arc<dyn Celebration>) -> Self {
        self.suite = self.suite.with_celebration(celebration);
        self
    }

    /// Execute once against `input`, reporting remote phases to `phases`
    pub async fn run_code(
        &self,
        language: Language,
        source: &str,
        input: &str,
        phases: Option<&PhaseSender>,
    ) -> ExecutionResult {
        self.runner.execute(language, source, input, phases).await
    }

    pub async fn submit_code(
        &self,
        language: Language,
        source: &str,
        test_cases: &[TestCase],
    ) -> Result<SubmissionResult, SubmissionError> {
        self.suite.submit_code(language, source, test_cases).await
    }
}
