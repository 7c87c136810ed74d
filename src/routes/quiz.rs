use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{Job, JobStatus};
use crate::models::quiz::QuizResult;
use crate::services::store::JobStore;

/// Request to generate a quiz from a content reference.
#[derive(Debug, Deserialize, Validate)]
pub struct QuizRequest {
    #[garde(length(min = 1, max = 2048))]
    pub url: String,

    #[garde(range(min = 1, max = 20))]
    pub question_count: u32,
}

/// Response after submitting a quiz job.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Response for querying job status.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
    pub result: Option<QuizResult>,
}

/// POST /api/v1/quiz — submit a content reference for quiz generation.
///
/// Returns as soon as the job record exists; the pipeline runs detached.
pub async fn submit_quiz(
    State(state): State<AppState>,
    Json(request): Json<QuizRequest>,
) -> Result<Json<SubmitResponse>, StatusCode> {
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let job = Job::queued(Uuid::new_v4());
    state.store.create(&job).await.map_err(|err| {
        tracing::error!(error = %err, "failed to create job record");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    metrics::counter!("quiz_jobs_submitted_total").increment(1);
    tracing::info!(
        job_id = %job.id,
        url = %request.url,
        question_count = request.question_count,
        "quiz job submitted"
    );

    let _detached = state
        .orchestrator
        .spawn(job.id, request.url, request.question_count);

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: job.status,
        message: job.message,
    }))
}

/// GET /api/v1/quiz/{job_id} — check quiz job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let job = state.store.read(job_id).await.map_err(|err| {
        tracing::error!(job_id = %job_id, error = %err, "failed to read job record");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match job {
        Some(job) => Ok(Json(JobStatusResponse {
            job_id: job.id,
            status: job.status,
            message: job.message,
            result: job.result,
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}
