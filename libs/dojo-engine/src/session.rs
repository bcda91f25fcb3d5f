// Challenge session
// One editor's view of a challenge: at most one run or submission in flight,
// and the outcome of the last one.

use crate::error::SessionError;
use crate::remote::PhaseSender;
use crate::ChallengeEngine;
use dojo_common::types::{Challenge, Language, SubmissionResult};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Success,
    PartialFailure,
    ExecutionError,
}

/// Snapshot of what the session currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub logs: Vec<String>,
    pub error: Option<String>,
    pub submission: Option<SubmissionResult>,
    pub outcome: Option<SessionOutcome>,
}

pub struct ChallengeSession {
    engine: Arc<ChallengeEngine>,
    challenge: Challenge,
    busy: AtomicBool,
    view: Mutex<SessionView>,
}

/// Holds the busy flag for one invocation and clears it on every exit path
struct BusyGuard<'a> {
    session: &'a ChallengeSession,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.session.update(|view| view.state = SessionState::Idle);
        self.session.busy.store(false, Ordering::Release);
    }
}

impl ChallengeSession {
    pub fn new(engine: Arc<ChallengeEngine>, challenge: Challenge) -> Self {
        Self {
            engine,
            challenge,
            busy: AtomicBool::new(false),
            view: Mutex::new(SessionView::default()),
        }
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn view(&self) -> SessionView {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn update(&self, apply: impl FnOnce(&mut SessionView)) {
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut view);
    }

    fn begin(&self, state: SessionState) -> Result<BusyGuard<'_>, SessionError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }

        self.update(|view| {
            *view = SessionView {
                state,
                ..SessionView::default()
            }
        });
        Ok(BusyGuard { session: self })
    }

    /// Run the solution once. `input` defaults to the challenge's sample input.
    pub async fn run(
        &self,
        language: Language,
        source: &str,
        input: Option<&str>,
        phases: Option<&PhaseSender>,
    ) -> Result<SessionView, SessionError> {
        let _guard = self.begin(SessionState::Running)?;
        let input = input.unwrap_or(&self.challenge.sample_input);

        let result = self.engine.run_code(language, source, input, phases).await;

        let outcome = if result.is_ok() {
            SessionOutcome::Success
        } else {
            SessionOutcome::ExecutionError
        };
        self.update(|view| {
            *view = SessionView {
                state: view.state,
                error: result.error.as_ref().map(|e| e.to_string()),
                logs: result.logs,
                submission: None,
                outcome: Some(outcome),
            }
        });

        Ok(self.finished_view())
    }

    /// Submit against every test case of the challenge
    pub async fn submit(
        &self,
        language: Language,
        source: &str,
    ) -> Result<SubmissionResult, SessionError> {
        let _guard = self.begin(SessionState::Submitting)?;

        let outcome = self
            .engine
            .submit_code(language, source, &self.challenge.test_cases)
            .await;

        match outcome {
            Ok(result) => {
                let outcome = if result.success() {
                    SessionOutcome::Success
                } else {
                    SessionOutcome::PartialFailure
                };
                self.update(|view| {
                    *view = SessionView {
                        state: view.state,
                        submission: Some(result.clone()),
                        outcome: Some(outcome),
                        ..SessionView::default()
                    }
                });
                Ok(result)
            }
            Err(e) => {
                self.update(|view| {
                    *view = SessionView {
                        state: view.state,
                        error: Some(e.to_string()),
                        outcome: Some(SessionOutcome::ExecutionError),
                        ..SessionView::default()
                    }
                });
                Err(e.into())
            }
        }
    }

    fn finished_view(&self) -> SessionView {
        let mut view = self.view();
        view.state = SessionState::Idle;
        view
    }
}
