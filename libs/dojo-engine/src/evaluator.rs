/// Test Suite Runner - Output Normalization and Submission Scoring
///
/// **Core Responsibility:**
/// Run a solution against every test case of a challenge and count how
/// many produce the expected output.
///
/// **Rules:**
/// - Cases run one after another, in order, without phase reporting
/// - An execution error aborts the submission; later cases never run
/// - An output mismatch only fails that case; the suite continues
/// - A fully passing submission triggers the celebration hook once
///
/// **Normalization Rules (Applied to All Languages):**
/// - CRLF becomes LF (any run of CR before LF is dropped)
/// - Leading and trailing whitespace is trimmed
/// - Internal whitespace and case are preserved

use crate::error::SubmissionError;
use crate::executor::CodeRunner;
use dojo_common::types::{CaseVerdict, ExecutionResult, Language, SubmissionResult, TestCase};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Error type returned by celebration hooks
pub type CelebrationError = Box<dyn std::error::Error + Send + Sync>;

/// Side effect fired after a submission passes every case
pub trait Celebration: Send + Sync {
    fn celebrate(&self, result: &SubmissionResult) -> Result<(), CelebrationError>;
}

/// Normalize output for comparison. `None` normalizes to "".
///
/// **Preserves:**
/// - Internal whitespace
/// - Case sensitivity
/// - Empty lines within content
pub fn normalize_output<'a>(output: impl Into<Option<&'a str>>) -> String {
    match output.into() {
        Some(text) => {
            let mut unified = String::with_capacity(text.len());
            for ch in text.chars() {
                // Every CR directly before LF is dropped
                if ch == '\n' {
                    while unified.ends_with('\r') {
                        unified.pop();
                    }
                }
                unified.push(ch);
            }
            unified.trim().to_string()
        }
        None => String::new(),
    }
}

/// Compare one successful execution against a test case's expected output
pub fn evaluate_case(result: &ExecutionResult, test_case: &TestCase) -> bool {
    normalize_output(result.output().as_str()) == normalize_output(test_case.output.as_str())
}

/// Runs every test case of a challenge against a solution
#[derive(Clone)]
pub struct TestSuiteRunner {
    runner: Arc<dyn CodeRunner>,
    celebration: Option<Arc<dyn Celebration>>,
}

impl TestSuiteRunner {
    pub fn new(runner: Arc<dyn CodeRunner>) -> Self {
        Self {
            runner,
            celebration: None,
        }
    }

    pub fn with_celebration(mut self, celebration: Arc<dyn Celebration>) -> Self {
        self.celebration = Some(celebration);
        self
    }

    #[instrument(skip_all, fields(language = %language, cases = test_cases.len()))]
    pub async fn submit_code(
        &self,
        language: Language,
        source: &str,
        test_cases: &[TestCase],
    ) -> Result<SubmissionResult, SubmissionError> {
        if test_cases.is_empty() {
            return Err(SubmissionError::NoTestCases);
        }

        let mut verdicts = Vec::with_capacity(test_cases.len());
        for (index, test_case) in test_cases.iter().enumerate() {
            let result = self
                .runner
                .execute(language, source, &test_case.input, None)
                .await;

            if let Some(error) = result.error {
                warn!(case = index, error = %error, "Execution failed, aborting submission");
                return Err(SubmissionError::TestFailed { case: index, error });
            }

            let passed = evaluate_case(&result, test_case);
            if !passed {
                debug!(
                    case = index,
                    expected = %normalize_output(test_case.output.as_str()),
                    actual = %normalize_output(result.output().as_str()),
                    "Output mismatch"
                );
            }
            verdicts.push(CaseVerdict { index, passed });
        }

        let summary = SubmissionResult::from_verdicts(verdicts);
        info!(
            passed = summary.passed(),
            total = summary.total(),
            success = summary.success(),
            "Submission evaluated"
        );

        if summary.success() {
            if let Some(celebration) = &self.celebration {
                if let Err(e) = celebration.celebrate(&summary) {
                    warn!(error = %e, "Celebration failed");
                }
            }
        }

        Ok(summary)
    }
}
