use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};
use crate::models::quiz::QuizResult;

/// Every write (create and update alike) refreshes the record to this full
/// TTL window; expiry is the only deletion mechanism.
const JOB_TTL_SECS: u64 = 30 * 60;

fn job_key(job_id: Uuid) -> String {
    format!("quiz:job:{}", job_id)
}

/// Typed access to the TTL key-value store holding job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Write a freshly created job record.
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Read a job record; `None` when it never existed or already expired.
    async fn read(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Read-modify-write of status, message and result.
    ///
    /// A no-op when the record is gone (expired mid-pipeline) or already
    /// terminal; neither case is an error.
    async fn update(
        &self,
        job_id: Uuid,
        status: JobStatus,
        message: &str,
        result: Option<QuizResult>,
    ) -> Result<(), StoreError>;

    /// Store connectivity check (for health checks).
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Redis-backed job store with per-record TTL.
pub struct RedisJobStore {
    client: redis::Client,
}

impl RedisJobStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(StoreError::Redis)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::Redis)?;
        let payload = serde_json::to_string(job).map_err(StoreError::Serialize)?;
        conn.set_ex::<_, _, ()>(job_key(job.id), payload, JOB_TTL_SECS)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn read(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::Redis)?;
        let payload: Option<String> = conn
            .get(job_key(job_id))
            .await
            .map_err(StoreError::Redis)?;

        match payload {
            Some(raw) => {
                let job: Job = serde_json::from_str(&raw).map_err(StoreError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        job_id: Uuid,
        status: JobStatus,
        message: &str,
        result: Option<QuizResult>,
    ) -> Result<(), StoreError> {
        let mut job = match self.read(job_id).await? {
            Some(job) => job,
            None => {
                // Expired or never existed: the job is already gone.
                tracing::debug!(job_id = %job_id, "dropping update for missing job record");
                return Ok(());
            }
        };

        if job.status.is_terminal() {
            tracing::debug!(job_id = %job_id, status = ?job.status, "dropping update for terminal job");
            return Ok(());
        }

        job.status = status;
        job.message = message.to_string();
        job.result = result;
        job.updated_at = chrono::Utc::now();

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::Redis)?;
        let payload = serde_json::to_string(&job).map_err(StoreError::Serialize)?;
        conn.set_ex::<_, _, ()>(job_key(job_id), payload, JOB_TTL_SECS)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
