use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::models::request::SourceType;
use crate::services::context::PipelineContext;
use crate::services::media::{run_tool, MediaError};
use crate::services::stages::SourceFetcher;

/// Resolves uploads in place, remote pages through yt-dlp and direct links over HTTP.
pub struct DefaultFetcher {
    http: reqwest::Client,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_with_yt_dlp(&self, url: &str, source_dir: &Path) -> Result<PathBuf, MediaError> {
        tokio::fs::create_dir_all(source_dir).await?;
        let template = source_dir.join("source.%(ext)s").to_string_lossy().to_string();

        let output = run_tool(
            "yt-dlp",
            [
                "--no-playlist",
                "--no-warnings",
                "-f",
                "bestvideo+bestaudio/best",
                "--merge-output-format",
                "mp4",
                "-o",
                template.as_str(),
                "--print",
                "after_move:filepath",
                url,
            ],
        )
        .await
        .map_err(|e| match e {
            MediaError::ToolFailed { message, .. } => MediaError::DownloadFailed(message),
            other => other,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let downloaded = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| source_dir.join("source.mp4"));

        if !downloaded.exists() {
            return Err(MediaError::DownloadFailed(format!(
                "yt-dlp reported {} but the file is missing",
                downloaded.display()
            )));
        }

        ensure_mp4(downloaded).await
    }

    async fn fetch_over_http(&self, url: &str, source_dir: &Path) -> Result<PathBuf, MediaError> {
        tokio::fs::create_dir_all(source_dir).await?;
        let target = source_dir.join(format!("source.{}", extension_from_url(url)));

        let mut response = self.http.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(&target).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::DownloadFailed(format!("empty response from {}", url)));
        }

        debug!(url, bytes = written, "Downloaded source over HTTP");
        Ok(target)
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, ctx: &PipelineContext) -> Result<PathBuf, MediaError> {
        let request = &ctx.request;

        let path = match request.source_type {
            SourceType::Upload => {
                let path = ctx.uploaded_source.clone().ok_or(MediaError::MissingUpload)?;
                if !path.exists() {
                    return Err(MediaError::MissingUpload);
                }
                path
            }
            SourceType::Youtube | SourceType::Url => {
                let url = request
                    .youtube_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| MediaError::DownloadFailed("missing source URL".to_string()))?;

                if request.source_type == SourceType::Youtube {
                    self.fetch_with_yt_dlp(url, &ctx.source_dir).await?
                } else {
                    self.fetch_over_http(url, &ctx.source_dir).await?
                }
            }
        };

        info!(job_id = %ctx.job_id, path = %path.display(), "Source ready");
        Ok(path)
    }
}

/// Rename a non-mp4 download so later stages see a uniform container name.
async fn ensure_mp4(path: PathBuf) -> Result<PathBuf, MediaError> {
    if path.extension().and_then(|e| e.to_str()) == Some("mp4") {
        return Ok(path);
    }
    let target = path.with_extension("mp4");
    tokio::fs::rename(&path, &target).await?;
    Ok(target)
}

fn extension_from_url(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    // Only the path after the authority can carry a file extension.
    let Some(path) = after_scheme.find('/').map(|i| &after_scheme[i..]) else {
        return "mp4";
    };
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("mp4")
}
