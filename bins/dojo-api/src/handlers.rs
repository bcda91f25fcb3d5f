// HTTP route handlers for the Dojo API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use dojo_common::types::{Challenge, Difficulty, Language};
use dojo_engine::SubmissionError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub language: Language,
    pub source_code: String,
    /// Falls back to the challenge's sample input
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub language: Language,
    pub source_code: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeSummary {
    pub slug: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub points: u32,
}

impl From<&Challenge> for ChallengeSummary {
    fn from(challenge: &Challenge) -> Self {
        Self {
            slug: challenge.slug.clone(),
            title: challenge.title.clone(),
            difficulty: challenge.difficulty,
            points: challenge.points,
        }
    }
}

/// Public view of a challenge; hidden test cases stay on the server
#[derive(Debug, Serialize)]
pub struct ChallengeDetail<'a> {
    #[serde(flatten)]
    pub summary: ChallengeSummary,
    pub description: &'a str,
    pub input_format: &'a str,
    pub output_format: &'a str,
    pub sample_input: &'a str,
    pub sample_output: &'a str,
    pub starter_code: &'a std::collections::HashMap<Language, String>,
    pub test_case_count: usize,
}

fn unknown_challenge(slug: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": format!("Unknown challenge: {}", slug)
        })),
    )
        .into_response()
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /challenges - List every challenge
pub async fn list_challenges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let challenges: Vec<ChallengeSummary> =
        state.catalog.list().iter().map(ChallengeSummary::from).collect();
    Json(challenges)
}

/// GET /challenges/{slug} - Challenge statement and starter code
pub async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    let Some(challenge) = state.catalog.get(&slug) else {
        return unknown_challenge(&slug);
    };

    Json(ChallengeDetail {
        summary: ChallengeSummary::from(challenge),
        description: &challenge.description,
        input_format: &challenge.input_format,
        output_format: &challenge.output_format,
        sample_input: &challenge.sample_input,
        sample_output: &challenge.sample_output,
        starter_code: &challenge.starter_code,
        test_case_count: challenge.test_cases.len(),
    })
    .into_response()
}

/// POST /challenges/{slug}/run - Execute once against custom or sample input
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(payload): Json<RunRequest>,
) -> Response {
    let Some(challenge) = state.catalog.get(&slug) else {
        return unknown_challenge(&slug);
    };

    let request_id = Uuid::new_v4();
    let input = payload.input.as_deref().unwrap_or(&challenge.sample_input);

    let result = state
        .engine
        .run_code(payload.language, &payload.source_code, input, None)
        .await;

    let outcome = result.error.as_ref().map(|e| e.kind()).unwrap_or("ok");
    metrics::record_run(payload.language.as_str(), outcome);
    info!(
        request_id = %request_id,
        challenge = %slug,
        language = %payload.language,
        outcome = outcome,
        lines = result.logs.len(),
        "Run finished"
    );

    (StatusCode::OK, Json(result)).into_response()
}

/// POST /challenges/{slug}/submit - Run every test case
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Response {
    let Some(challenge) = state.catalog.get(&slug) else {
        return unknown_challenge(&slug);
    };

    let request_id = Uuid::new_v4();
    let language = payload.language;

    match state
        .engine
        .submit_code(language, &payload.source_code, &challenge.test_cases)
        .await
    {
        Ok(result) => {
            let outcome = if result.success() { "passed" } else { "failed" };
            metrics::record_submission(language.as_str(), outcome);
            info!(
                request_id = %request_id,
                challenge = %slug,
                language = %language,
                passed = result.passed(),
                total = result.total(),
                "Submission evaluated"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            metrics::record_submission(language.as_str(), "error");
            warn!(
                request_id = %request_id,
                challenge = %slug,
                language = %language,
                error = %e,
                "Submission aborted"
            );
            let body = match &e {
                SubmissionError::TestFailed { case, error } => serde_json::json!({
                    "error": e.to_string(),
                    "case": case,
                    "kind": error.kind(),
                }),
                SubmissionError::NoTestCases => serde_json::json!({ "error": e.to_string() }),
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
    }
}
