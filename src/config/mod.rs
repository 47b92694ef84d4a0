use serde::Deserialize;
use std::path::PathBuf;

use crate::models::clip::ExportTarget;

/// Environment variable prefix for every setting (e.g. `CREACLIPS_DATA_DIR`).
pub const ENV_PREFIX: &str = "CREACLIPS_";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Root of all job artifacts, also served under `public_data_prefix`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding `presets.json` and the background videos it names
    #[serde(default = "default_background_dir")]
    pub background_dir: PathBuf,

    #[serde(default = "default_jobs_dir_name")]
    pub jobs_dir_name: String,

    /// Whisper model name passed to the transcriber
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,

    #[serde(default = "default_whisper_language")]
    pub whisper_language: String,

    /// Upper bound on concurrently running pipelines
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,

    #[serde(default = "default_max_clips")]
    pub max_clips: u32,

    #[serde(default = "default_clip_length_seconds")]
    pub clip_length_seconds: u32,

    #[serde(default = "default_min_clip_length_seconds")]
    pub min_clip_length_seconds: u32,

    /// Stride of the interval strategy
    #[serde(default = "default_interval_seconds")]
    pub default_interval_seconds: u32,

    /// Comma-separated list, e.g. "tiktok,reels,shorts"
    #[serde(default = "default_export_targets")]
    pub export_targets: Vec<String>,

    /// URL prefix under which `data_dir` is served
    #[serde(default = "default_public_data_prefix")]
    pub public_data_prefix: String,

    /// Request body limit for uploads, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,

    /// Finished jobs older than this are dropped from memory. Unset keeps them forever.
    #[serde(default)]
    pub job_retention_secs: Option<u64>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_background_dir() -> PathBuf {
    PathBuf::from("shared/backgrounds")
}

fn default_jobs_dir_name() -> String {
    "jobs".to_string()
}

fn default_whisper_model() -> String {
    "small".to_string()
}

fn default_whisper_language() -> String {
    "fr".to_string()
}

fn default_max_parallel_jobs() -> usize {
    2
}

fn default_max_clips() -> u32 {
    5
}

fn default_clip_length_seconds() -> u32 {
    35
}

fn default_min_clip_length_seconds() -> u32 {
    15
}

fn default_interval_seconds() -> u32 {
    30
}

fn default_export_targets() -> Vec<String> {
    vec!["tiktok".to_string(), "reels".to_string(), "shorts".to_string()]
}

fn default_public_data_prefix() -> String {
    "/media".to_string()
}

fn default_max_upload_mb() -> usize {
    2048
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env()
    }

    /// Directory under which every job gets its own working tree.
    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join(&self.jobs_dir_name)
    }

    pub fn export_targets(&self) -> Result<Vec<ExportTarget>, ConfigError> {
        self.export_targets
            .iter()
            .map(|raw| {
                raw.trim()
                    .parse::<ExportTarget>()
                    .map_err(|_| ConfigError::UnknownExportTarget(raw.clone()))
            })
            .collect()
    }

    /// Public prefix without a trailing slash.
    pub fn public_prefix(&self) -> String {
        let trimmed = self.public_data_prefix.trim_end_matches('/');
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown export target: {0}")]
    UnknownExportTarget(String),
}
