use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use uuid::Uuid;

/// Video-host URL grammar: host variants plus the `watch?v=`, `shorts/`,
/// `embed/` and `v/` path forms, ending in an 11-character id.
static VIDEO_URL: OnceLock<Regex> = OnceLock::new();

fn video_url_pattern() -> &'static Regex {
    VIDEO_URL.get_or_init(|| {
        Regex::new(
            r"^(https?://)?(www\.|m\.)?(youtube\.com|youtu\.be)/(watch\?v=|shorts/|embed/|v/)?([A-Za-z0-9_-]{11}).*$",
        )
        .expect("valid video url pattern")
    })
}

/// What kind of content a submitted reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Article,
    Video,
}

/// Anything not matching the video-host grammar is treated as an article.
pub fn classify(reference: &str) -> ContentKind {
    if video_url_pattern().is_match(reference) {
        ContentKind::Video
    } else {
        ContentKind::Article
    }
}

/// Pulls readable article text out of a web page.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, IngestError>;
}

/// Downloads a video reference to a local media file. The caller owns
/// deleting the returned file on every exit path.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PathBuf, IngestError>;
}

/// Containers tried in order when locating the article body. Platform-specific
/// entries first (Naver smart editor, Tistory, Velog), generic ones after.
const CONTENT_SELECTORS: &[&str] = &[
    ".se-main-container",
    "article",
    "main",
    ".tt_article_useless_p_margin",
    ".post-content",
    ".entry-content",
    ".markdown-body",
    "div[role='main']",
    "#content",
    ".content",
    ".atom-one",
];

/// A container shorter than this is assumed to be navigation, not the body.
const MIN_CONTENT_LEN: usize = 100;

/// Reqwest + CSS-selector article extractor.
pub struct ArticleExtractor {
    http: reqwest::Client,
}

impl ArticleExtractor {
    pub fn new() -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            )
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Extractor for ArticleExtractor {
    async fn extract(&self, url: &str) -> Result<String, IngestError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;

        readable_text(&body).ok_or(IngestError::NoContent)
    }
}

/// Locate the article body in raw HTML and collapse it to plain text.
///
/// Kept synchronous: `scraper::Html` is not `Send`, so it must not live
/// across an await point.
fn readable_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let sel = Selector::parse(selector).expect("valid selector");
        if let Some(element) = document.select(&sel).next() {
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if text.len() > MIN_CONTENT_LEN {
                tracing::debug!(selector, length = text.len(), "located article body");
                return Some(text);
            }
        }
    }

    None
}

/// Downloads videos through the external yt-dlp tool into a temp directory.
pub struct YtDlpFetcher {
    yt_dlp_path: String,
    temp_dir: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: String, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            yt_dlp_path,
            temp_dir: temp_dir.into(),
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf, IngestError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let path = self.temp_dir.join(format!("{}.mp4", Uuid::new_v4()));

        tracing::info!(url, path = %path.display(), "starting media download");

        let output = Command::new(&self.yt_dlp_path)
            .arg("-f")
            .arg("worst[ext=mp4]")
            .arg("--force-ipv4")
            .arg("--extractor-args")
            .arg("youtube:player_client=android")
            .arg("-o")
            .arg(&path)
            .arg(url)
            .output()
            .await?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(tool = "yt-dlp", "{}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            tracing::debug!(tool = "yt-dlp", "{}", line);
        }

        if !output.status.success() {
            // yt-dlp may leave a partial file behind on failure.
            remove_if_present(&path).await;
            return Err(IngestError::FetcherExit {
                status: output.status,
            });
        }

        if !tokio::fs::try_exists(&path).await? {
            return Err(IngestError::MissingFile);
        }

        Ok(path)
    }
}

/// Best-effort local file removal; failures are logged, never propagated.
pub async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed local media file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove local media file")
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("article fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no readable article content found")]
    NoContent,

    #[error("media download tool exited with {status}")]
    FetcherExit { status: std::process::ExitStatus },

    #[error("media download produced no file")]
    MissingFile,

    #[error("media download I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
