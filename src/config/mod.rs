use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the job store
    pub redis_url: String,

    /// Gemini API key
    pub gemini_api_key: String,

    /// Gemini model name used for quiz generation
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Directory for downloaded media awaiting upload
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Path to the yt-dlp executable
    #[serde(default = "default_yt_dlp_path")]
    pub yt_dlp_path: String,

    /// Fixed delay between remote-media status polls, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum status polls before giving up on remote media processing
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("quizgen-media")
}

fn default_yt_dlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_poll_max_attempts() -> u32 {
    120
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
