use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a quiz generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are final: a job never leaves either.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One tracked quiz generation request, from submission to terminal status.
///
/// The record lives in the job store for a fixed TTL window; the orchestrator
/// is its single writer after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub message: String,
    pub result: Option<crate::models::quiz::QuizResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly submitted job, not yet picked up by the pipeline.
    pub fn queued(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            message: "queued".to_string(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}
