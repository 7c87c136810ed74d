//! Scripted collaborator doubles for pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use quizgen::models::job::{Job, JobStatus};
use quizgen::models::quiz::QuizResult;
use quizgen::services::generator::{
    ContentPart, Generator, GeneratorError, RemoteMediaHandle, RemoteState, UploadSession,
};
use quizgen::services::ingest::{Extractor, IngestError, MediaFetcher};
use quizgen::services::orchestrator::QuizOrchestrator;
use quizgen::services::poller::PollPolicy;
use quizgen::services::store::{JobStore, StoreError};

/// In-memory job store recording every applied status for transition-order
/// assertions. Mirrors the redis adapter's no-op rules.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    status_log: Mutex<Vec<JobStatus>>,
}

impl MemoryJobStore {
    pub fn applied_statuses(&self) -> Vec<JobStatus> {
        self.status_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        self.status_log.lock().unwrap().push(job.status);
        Ok(())
    }

    async fn read(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn update(
        &self,
        job_id: Uuid,
        status: JobStatus,
        message: &str,
        result: Option<QuizResult>,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(());
        };
        if job.status.is_terminal() {
            return Ok(());
        }
        job.status = status;
        job.message = message.to_string();
        job.result = result;
        job.updated_at = chrono::Utc::now();
        self.status_log.lock().unwrap().push(status);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Extractor double: a fixed article body, or extraction failure.
pub struct MockExtractor {
    body: Option<String>,
    pub calls: AtomicU32,
}

impl MockExtractor {
    pub fn returning(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: None,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, _url: &str) -> Result<String, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body.clone().ok_or(IngestError::NoContent)
    }
}

/// Fetcher double: writes a real file into the test temp dir so deletion
/// behavior is observable, or fails without producing one.
pub struct MockFetcher {
    temp_dir: PathBuf,
    succeed: bool,
    pub calls: AtomicU32,
}

impl MockFetcher {
    pub fn writing_into(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            succeed: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            succeed: false,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<PathBuf, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        if !self.succeed {
            return Err(IngestError::MissingFile);
        }
        let path = self.temp_dir.join(format!("{}.mp4", Uuid::new_v4()));
        tokio::fs::write(&path, b"fake mp4 bytes").await?;
        Ok(path)
    }
}

/// Generator double: scripted completion text, media states served in order,
/// and call counters for branch-exclusivity assertions.
pub struct MockGenerator {
    completion: Option<String>,
    states: Mutex<VecDeque<RemoteState>>,
    fail_upload: bool,
    pub complete_calls: AtomicU32,
    pub begin_upload_calls: AtomicU32,
    pub send_bytes_calls: AtomicU32,
    pub media_state_calls: AtomicU32,
}

impl MockGenerator {
    pub fn completing_with(completion: impl Into<String>) -> Self {
        Self {
            completion: Some(completion.into()),
            states: Mutex::new(VecDeque::new()),
            fail_upload: false,
            complete_calls: AtomicU32::new(0),
            begin_upload_calls: AtomicU32::new(0),
            send_bytes_calls: AtomicU32::new(0),
            media_state_calls: AtomicU32::new(0),
        }
    }

    pub fn failing_completion() -> Self {
        let mut generator = Self::completing_with("");
        generator.completion = None;
        generator
    }

    /// States served to successive `media_state` calls; `Active` once the
    /// script runs out.
    pub fn with_states(self, states: &[RemoteState]) -> Self {
        *self.states.lock().unwrap() = states.iter().copied().collect();
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn complete(
        &self,
        _system_instruction: &str,
        _parts: Vec<ContentPart>,
    ) -> Result<String, GeneratorError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.completion.clone().ok_or(GeneratorError::NoCandidate)
    }

    async fn begin_upload(&self, path: &Path) -> Result<UploadSession, GeneratorError> {
        self.begin_upload_calls.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "upload started for a missing file");
        if self.fail_upload {
            return Err(GeneratorError::NoUploadUrl);
        }
        Ok(UploadSession {
            continuation_url: "mock://upload-session".to_string(),
        })
    }

    async fn send_bytes(
        &self,
        _session: UploadSession,
        path: &Path,
    ) -> Result<RemoteMediaHandle, GeneratorError> {
        self.send_bytes_calls.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "bytes sent for a missing file");
        Ok(RemoteMediaHandle {
            uri: "https://generativelanguage.googleapis.com/v1beta/files/mock-media".to_string(),
        })
    }

    async fn media_state(
        &self,
        _handle: &RemoteMediaHandle,
    ) -> Result<RemoteState, GeneratorError> {
        self.media_state_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RemoteState::Active))
    }
}

/// A valid generator completion carrying `count` questions.
pub fn quiz_completion(count: usize) -> String {
    let questions: Vec<serde_json::Value> = (1..=count)
        .map(|id| {
            serde_json::json!({
                "id": id,
                "question": format!("Question {id}?"),
                "options": ["a", "b", "c", "d"],
                "answer": "a",
                "explanation": "because",
                "codeSnippet": ""
            })
        })
        .collect();

    serde_json::json!({ "title": "Generated Quiz", "questions": questions }).to_string()
}

/// Everything a pipeline scenario needs, wired the way `main` wires it.
pub struct TestHarness {
    pub store: Arc<MemoryJobStore>,
    pub extractor: Arc<MockExtractor>,
    pub fetcher: Arc<MockFetcher>,
    pub generator: Arc<MockGenerator>,
    pub orchestrator: Arc<QuizOrchestrator>,
    pub temp_dir: PathBuf,
}

impl TestHarness {
    pub fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("quizgen-test-{}", Uuid::new_v4()))
    }

    pub fn new(
        temp_dir: PathBuf,
        extractor: MockExtractor,
        fetcher: MockFetcher,
        generator: MockGenerator,
    ) -> Self {
        Self::with_poll_policy(
            temp_dir,
            extractor,
            fetcher,
            generator,
            PollPolicy {
                interval: std::time::Duration::from_millis(1),
                max_attempts: 120,
            },
        )
    }

    pub fn with_poll_policy(
        temp_dir: PathBuf,
        extractor: MockExtractor,
        fetcher: MockFetcher,
        generator: MockGenerator,
        poll_policy: PollPolicy,
    ) -> Self {
        let store = Arc::new(MemoryJobStore::default());
        let extractor = Arc::new(extractor);
        let fetcher = Arc::new(fetcher);
        let generator = Arc::new(generator);
        let orchestrator = Arc::new(QuizOrchestrator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::clone(&extractor) as Arc<dyn Extractor>,
            Arc::clone(&fetcher) as Arc<dyn MediaFetcher>,
            Arc::clone(&generator) as Arc<dyn Generator>,
            poll_policy,
        ));
        Self {
            store,
            extractor,
            fetcher,
            generator,
            orchestrator,
            temp_dir,
        }
    }

    /// Submit a job the way the route does, wait for the detached pipeline
    /// task, and return the stored record.
    pub async fn run_job(&self, url: &str, question_count: u32) -> Job {
        let job = Job::queued(Uuid::new_v4());
        self.store.create(&job).await.unwrap();
        Arc::clone(&self.orchestrator)
            .spawn(job.id, url.to_string(), question_count)
            .join()
            .await;
        self.store.read(job.id).await.unwrap().expect("job record")
    }

    /// Files left behind in the media temp dir (empty when cleanup held).
    pub fn leftover_media_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.temp_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.temp_dir);
    }
}
