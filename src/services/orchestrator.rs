use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::job::JobStatus;
use crate::models::quiz::QuizResult;
use crate::services::generator::{
    quiz_system_instruction, ContentPart, Generator, GeneratorError, RemoteMediaHandle,
};
use crate::services::ingest::{
    classify, remove_if_present, ContentKind, Extractor, IngestError, MediaFetcher,
};
use crate::services::poller::{self, PollError, PollPolicy};
use crate::services::store::JobStore;

const ARTICLE_TASK_PROMPT: &str = "Analyze the key ideas of the provided text in depth and build a \
                                   high-quality study quiz that verifies the important concepts.";
const VIDEO_TASK_PROMPT: &str = "Analyze the audiovisual content of the uploaded video in depth and \
                                 build a high-quality study quiz that verifies the important concepts.";

/// Handle to one job's detached pipeline task.
///
/// The submission route drops it (fire-and-forget); tests join it. Wrapping
/// the raw task keeps the spawn site local for a future durable-queue
/// replacement.
pub struct JobHandle {
    job_id: Uuid,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Cancel the pipeline task; outstanding waits and further stages abort.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the pipeline task to settle (complete or aborted).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Drives a job from `PENDING` through the acquire → (upload + poll) →
/// generate → persist sequence, and is the single writer of job state after
/// submission.
pub struct QuizOrchestrator {
    store: Arc<dyn JobStore>,
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn MediaFetcher>,
    generator: Arc<dyn Generator>,
    poll_policy: PollPolicy,
}

impl QuizOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        extractor: Arc<dyn Extractor>,
        fetcher: Arc<dyn MediaFetcher>,
        generator: Arc<dyn Generator>,
        poll_policy: PollPolicy,
    ) -> Self {
        Self {
            store,
            extractor,
            fetcher,
            generator,
            poll_policy,
        }
    }

    /// Launch the pipeline for a freshly created job and return immediately.
    pub fn spawn(self: Arc<Self>, job_id: Uuid, reference: String, question_count: u32) -> JobHandle {
        let task = tokio::spawn(async move {
            self.run(job_id, &reference, question_count).await;
        });
        JobHandle { job_id, task }
    }

    /// One full job lifecycle: transition to `PROCESSING`, drive the stages,
    /// reconcile the outcome into the store. Every pipeline failure lands
    /// here as a `FAILED` record with a short message; the full error chain
    /// goes to the log only.
    async fn run(&self, job_id: Uuid, reference: &str, question_count: u32) {
        let started = std::time::Instant::now();

        if let Err(err) = self
            .store
            .update(job_id, JobStatus::Processing, "generating quiz", None)
            .await
        {
            tracing::error!(job_id = %job_id, error = %err, "failed to mark job processing");
        }

        match self.drive(job_id, reference, question_count).await {
            Ok(quiz) => {
                metrics::counter!("quiz_jobs_completed_total").increment(1);
                metrics::histogram!("quiz_generation_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    job_id = %job_id,
                    questions = quiz.questions.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "quiz generation completed"
                );
                if let Err(err) = self
                    .store
                    .update(
                        job_id,
                        JobStatus::Completed,
                        "quiz generation complete",
                        Some(quiz),
                    )
                    .await
                {
                    tracing::error!(job_id = %job_id, error = %err, "failed to persist completed job");
                }
            }
            Err(err) => {
                metrics::counter!("quiz_jobs_failed_total").increment(1);
                tracing::error!(job_id = %job_id, error = ?err, "quiz pipeline failed");
                if let Err(store_err) = self
                    .store
                    .update(job_id, JobStatus::Failed, err.user_message(), None)
                    .await
                {
                    tracing::error!(job_id = %job_id, error = %store_err, "failed to persist failed job");
                }
            }
        }
    }

    /// The stage sequence proper. Branches on content kind exactly once;
    /// both branches reconverge at the generation call.
    async fn drive(
        &self,
        job_id: Uuid,
        reference: &str,
        question_count: u32,
    ) -> Result<QuizResult, PipelineError> {
        let parts = match classify(reference) {
            ContentKind::Article => {
                tracing::info!(job_id = %job_id, "detected content type: article");
                let text = self.extractor.extract(reference).await?;
                tracing::info!(job_id = %job_id, length = text.len(), "article extracted");
                vec![
                    ContentPart::Text(text),
                    ContentPart::Text(ARTICLE_TASK_PROMPT.to_string()),
                ]
            }
            ContentKind::Video => {
                tracing::info!(job_id = %job_id, "detected content type: video");
                let handle = self.upload_video(job_id, reference).await?;
                tracing::info!(job_id = %job_id, uri = %handle.uri, "media uploaded, awaiting processing");
                poller::wait_until_active(
                    || self.generator.media_state(&handle),
                    self.poll_policy,
                )
                .await?;
                vec![
                    ContentPart::Media(handle),
                    ContentPart::Text(VIDEO_TASK_PROMPT.to_string()),
                ]
            }
        };

        let instruction = quiz_system_instruction(question_count);
        let completion = self
            .generator
            .complete(&instruction, parts)
            .await
            .map_err(PipelineError::Generation)?;

        let quiz: QuizResult =
            serde_json::from_str(&completion).map_err(PipelineError::Parse)?;
        if quiz.questions.is_empty() {
            return Err(PipelineError::EmptyQuiz);
        }

        Ok(quiz)
    }

    /// Fetch the video locally and push it through the two-phase upload.
    /// The local file is removed once the upload resolves, success or not.
    async fn upload_video(
        &self,
        job_id: Uuid,
        reference: &str,
    ) -> Result<RemoteMediaHandle, PipelineError> {
        let media_path = self.fetcher.fetch(reference).await?;
        tracing::info!(job_id = %job_id, path = %media_path.display(), "media downloaded");

        let uploaded = self.push_media(&media_path).await;
        remove_if_present(&media_path).await;
        uploaded
    }

    async fn push_media(&self, path: &Path) -> Result<RemoteMediaHandle, PipelineError> {
        let session = self
            .generator
            .begin_upload(path)
            .await
            .map_err(PipelineError::Upload)?;
        self.generator
            .send_bytes(session, path)
            .await
            .map_err(PipelineError::Upload)
    }
}

/// Everything that can go wrong between accepting a job and persisting its
/// result. Recovered at the orchestrator boundary, never propagated to the
/// client beyond a short message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("content ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("media upload failed: {0}")]
    Upload(#[source] GeneratorError),

    #[error("waiting for remote media processing failed: {0}")]
    Poll(#[from] PollError),

    #[error("generation call failed: {0}")]
    Generation(#[source] GeneratorError),

    #[error("completion was not a valid quiz document: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("completion contained an empty question list")]
    EmptyQuiz,
}

impl PipelineError {
    /// Short client-facing text stored on the failed job. "Gave up waiting"
    /// and "remote side rejected it" stay distinguishable.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::Ingest(err) => match err {
                IngestError::Http(_) | IngestError::NoContent => {
                    "Could not read article content from the URL."
                }
                IngestError::FetcherExit { .. }
                | IngestError::MissingFile
                | IngestError::Io(_) => "Could not download the video.",
            },
            PipelineError::Upload(_) => "Could not upload the video for processing.",
            PipelineError::Poll(PollError::Timeout { .. }) => {
                "Timed out waiting for the video to be processed."
            }
            PipelineError::Poll(PollError::RemoteFailed) => {
                "The video could not be processed by the generation service."
            }
            PipelineError::Poll(PollError::Query(_)) => {
                "Could not check video processing status."
            }
            PipelineError::Generation(_) | PipelineError::EmptyQuiz => "Quiz generation failed.",
            PipelineError::Parse(_) => "The generated quiz was not in a usable format.",
        }
    }
}
