use dojo_common::types::ExecutionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Why a submission produced no `SubmissionResult`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Challenge has no test cases to run")]
    NoTestCases,

    /// Execution failed on the test case at `case` (zero-based); later cases were not run
    #[error("Test failed: {error}")]
    TestFailed { case: usize, error: ExecutionError },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A run or submission is already in progress")]
    Busy,

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
