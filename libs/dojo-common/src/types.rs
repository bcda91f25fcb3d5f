use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Languages a challenge can be solved in.
///
/// TypeScript is transpiled and evaluated in-process; Kotlin is delegated
/// to the remote compile-and-run service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Kotlin,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Kotlin => "kotlin",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::Kotlin => "Kotlin",
        }
    }

    /// Whether code in this language runs inside the engine process
    pub fn runs_in_process(&self) -> bool {
        matches!(self, Language::TypeScript)
    }

    pub fn all() -> [Language; 2] {
        [Language::TypeScript, Language::Kotlin]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language '{0}' (expected typescript or kotlin)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ts" | "typescript" => Ok(Language::TypeScript),
            "kt" | "kotlin" => Ok(Language::Kotlin),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    /// Expected output, compared after normalization
    pub output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// A coding challenge as defined in the static content catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub slug: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub points: u32,
    pub description: String,
    pub input_format: String,
    pub output_format: String,
    pub sample_input: String,
    pub sample_output: String,
    #[serde(default)]
    pub starter_code: HashMap<Language, String>,
    pub test_cases: Vec<TestCase>,
}

impl Challenge {
    pub fn starter_code(&self, language: Language) -> Option<&str> {
        self.starter_code.get(&language).map(String::as_str)
    }
}

/// Failure of a single execution.
///
/// Display yields the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Runtime(String),
    #[error("{0}")]
    Transport(String),
}

impl ExecutionError {
    pub fn message(&self) -> &str {
        match self {
            ExecutionError::Compile(msg)
            | ExecutionError::Runtime(msg)
            | ExecutionError::Transport(msg) => msg,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::Compile(_) => "compile",
            ExecutionError::Runtime(_) => "runtime",
            ExecutionError::Transport(_) => "transport",
        }
    }
}

/// Outcome of one run: captured output lines plus an optional error.
/// Logs captured before a failure are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub logs: Vec<String>,
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn ok(logs: Vec<String>) -> Self {
        Self { logs, error: None }
    }

    pub fn failed(logs: Vec<String>, error: ExecutionError) -> Self {
        Self {
            logs,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Captured output as one newline-joined string
    pub fn output(&self) -> String {
        self.logs.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseVerdict {
    /// Zero-based position in the challenge's test case list
    pub index: usize,
    pub passed: bool,
}

/// Aggregate of a full submission. `passed <= total` always holds, and
/// `success` is exactly `passed == total`. Only `from_verdicts` builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    passed: usize,
    total: usize,
    success: bool,
    cases: Vec<CaseVerdict>,
}

impl SubmissionResult {
    pub fn from_verdicts(cases: Vec<CaseVerdict>) -> Self {
        let total = cases.len();
        let passed = cases.iter().filter(|c| c.passed).count();
        Self {
            passed,
            total,
            success: passed == total,
            cases,
        }
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Per-case verdicts in test case order
    pub fn cases(&self) -> &[CaseVerdict] {
        &self.cases
    }
}

/// Progress of a remote round-trip, observable while a run is in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    #[default]
    Idle,
    Sending,
    Compiling,
    Running,
}

impl ExecutionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionPhase::Idle => "Idle",
            ExecutionPhase::Sending => "Sending code...",
            ExecutionPhase::Compiling => "Compiling...",
            ExecutionPhase::Running => "Running...",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionPhase::Idle => "idle",
            ExecutionPhase::Sending => "sending",
            ExecutionPhase::Compiling => "compiling",
            ExecutionPhase::Running => "running",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("ts".parse::<Language>(), Ok(Language::TypeScript));
        assert_eq!("TypeScript".parse::<Language>(), Ok(Language::TypeScript));
        assert_eq!(" kotlin ".parse::<Language>(), Ok(Language::Kotlin));
        assert_eq!("kt".parse::<Language>(), Ok(Language::Kotlin));
        assert!("python".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_serde_is_lowercase() {
        let json = serde_json::to_string(&Language::TypeScript).unwrap();
        assert_eq!(json, "\"typescript\"");
        let lang: Language = serde_json::from_str("\"kotlin\"").unwrap();
        assert_eq!(lang, Language::Kotlin);
    }

    #[test]
    fn test_execution_error_serializes_with_kind() {
        let err = ExecutionError::Compile("Expected ';'".to_string());
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "compile");
        assert_eq!(value["message"], "Expected ';'");
        assert_eq!(err.to_string(), "Expected ';'");
    }

    #[test]
    fn test_submission_result_counts() {
        let result = SubmissionResult::from_verdicts(vec![
            CaseVerdict { index: 0, passed: true },
            CaseVerdict { index: 1, passed: false },
            CaseVerdict { index: 2, passed: true },
        ]);
        assert_eq!(result.passed(), 2);
        assert_eq!(result.total(), 3);
        assert!(!result.success());
        assert_eq!(result.cases().len(), 3);

        let all = SubmissionResult::from_verdicts(vec![CaseVerdict { index: 0, passed: true }]);
        assert!(all.success());

        let empty = SubmissionResult::from_verdicts(Vec::new());
        assert_eq!((empty.passed(), empty.total()), (0, 0));
    }

    #[test]
    fn test_submission_result_serializes_all_fields() {
        let result = SubmissionResult::from_verdicts(vec![
            CaseVerdict { index: 0, passed: true },
            CaseVerdict { index: 1, passed: false },
        ]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["passed"], 1);
        assert_eq!(value["total"], 2);
        assert_eq!(value["success"], false);
        assert_eq!(value["cases"][1]["passed"], false);
    }

    #[test]
    fn test_phase_defaults_to_idle() {
        assert_eq!(ExecutionPhase::default(), ExecutionPhase::Idle);
        assert_eq!(ExecutionPhase::Compiling.to_string(), "compiling");
    }
}
