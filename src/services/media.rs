//! ffmpeg / ffprobe adapters for probing, audio extraction, cutting and
//! vertical composition.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use crate::models::clip::ClipWindow;
use crate::services::backgrounds::BackgroundCatalog;
use crate::services::stages::{ClipCutter, Compositor, SignalExtractor};
use crate::services::window_selector::{AudioSignal, SIGNAL_SAMPLE_RATE};

/// Output frame of every composed clip.
pub const TARGET_WIDTH: u32 = 1080;
pub const TARGET_HEIGHT: u32 = 1920;

/// Keep this many trailing stderr bytes in error messages.
const STDERR_TAIL: usize = 600;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: &'static str, message: String },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("No uploaded file received")]
    MissingUpload,

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MediaError {
    pub fn tool_failed(tool: &'static str, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool,
            message: message.into(),
        }
    }
}

/// Run an external tool to completion, capturing its output.
pub(crate) async fn run_tool<I, S>(tool: &'static str, args: I) -> Result<Output, MediaError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    which::which(tool).map_err(|_| MediaError::ToolNotFound(tool))?;

    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::tool_failed(
            tool,
            format!(
                "exit code {:?}: {}",
                output.status.code(),
                stderr_tail(&output.stderr)
            ),
        ));
    }

    Ok(output)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let mut cut = text.len().saturating_sub(STDERR_TAIL);
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    text[cut..].to_string()
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
}

/// What the pipeline needs to know about a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration: f64,
    pub has_audio: bool,
    pub has_video: bool,
}

fn parse_probe(json: &[u8]) -> Result<MediaInfo, MediaError> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::InvalidMedia("unknown duration".to_string()))?;

    Ok(MediaInfo {
        duration,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
        has_video: probe.streams.iter().any(|s| s.codec_type == "video"),
    })
}

/// Escape a path for use inside an ffmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

fn subtitle_filter(subtitles: &Path) -> String {
    format!(
        "subtitles='{}':force_style='FontName=Arial,Bold=1,FontSize=18,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,Outline=2,Alignment=2,MarginV=60'",
        escape_filter_path(subtitles)
    )
}

/// Filter graph for the vertical frame. With a background input it sits on
/// stream 1, otherwise a blurred fill of the clip itself is used.
fn composition_graph(has_background: bool, subtitles: Option<&Path>) -> String {
    let (w, h) = (TARGET_WIDTH, TARGET_HEIGHT);
    let fill = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1"
    );

    let mut graph = if has_background {
        format!(
            "[1:v]{fill}[bg];[0:v]scale={w}:-2,setsar=1[fg];[bg][fg]overlay=(W-w)/2:(H-h)/2:shortest=1[base]"
        )
    } else {
        format!(
            "[0:v]split=2[a][b];[a]{fill},boxblur=25:5[bg];[b]scale={w}:-2,setsar=1[fg];[bg][fg]overlay=(W-w)/2:(H-h)/2[base]"
        )
    };

    match subtitles {
        Some(path) => graph.push_str(&format!(";[base]{}[v]", subtitle_filter(path))),
        None => graph.push_str(";[base]null[v]"),
    }
    graph
}

/// ffmpeg-backed implementation of the media stages.
pub struct FfmpegMedia {
    backgrounds: Arc<BackgroundCatalog>,
}

impl FfmpegMedia {
    pub fn new(backgrounds: Arc<BackgroundCatalog>) -> Self {
        Self { backgrounds }
    }

    pub async fn probe(&self, media: &Path) -> Result<MediaInfo, MediaError> {
        if !media.exists() {
            return Err(MediaError::InvalidMedia(format!(
                "file not found: {}",
                media.display()
            )));
        }

        let input = media.to_string_lossy().to_string();
        let output = run_tool(
            "ffprobe",
            [
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                input.as_str(),
            ],
        )
        .await?;

        parse_probe(&output.stdout)
    }
}

#[async_trait]
impl SignalExtractor for FfmpegMedia {
    async fn probe_duration(&self, media: &Path) -> Result<f64, MediaError> {
        Ok(self.probe(media).await?.duration)
    }

    async fn extract(&self, media: &Path) -> Result<Option<AudioSignal>, MediaError> {
        let info = self.probe(media).await?;
        if !info.has_audio {
            return Ok(None);
        }

        let rate = SIGNAL_SAMPLE_RATE.to_string();
        let input = media.to_string_lossy().to_string();
        let output = run_tool(
            "ffmpeg",
            [
                "-v",
                "error",
                "-i",
                input.as_str(),
                "-vn",
                "-ac",
                "1",
                "-ar",
                rate.as_str(),
                "-f",
                "f32le",
                "pipe:1",
            ],
        )
        .await?;

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        debug!(
            path = %media.display(),
            samples = samples.len(),
            "Extracted audio signal"
        );

        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(AudioSignal::mono(samples, SIGNAL_SAMPLE_RATE)))
    }
}

#[async_trait]
impl ClipCutter for FfmpegMedia {
    async fn cut(
        &self,
        source: &Path,
        window: &ClipWindow,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        let start = format!("{:.3}", window.start);
        let length = format!("{:.3}", window.duration());
        let input = source.to_string_lossy().to_string();
        let target = output.to_string_lossy().to_string();

        run_tool(
            "ffmpeg",
            [
                "-y",
                "-v",
                "error",
                "-ss",
                start.as_str(),
                "-i",
                input.as_str(),
                "-t",
                length.as_str(),
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
                target.as_str(),
            ],
        )
        .await?;

        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl Compositor for FfmpegMedia {
    async fn compose(
        &self,
        clip: &Path,
        subtitles: Option<&Path>,
        background_id: &str,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let background = self
            .backgrounds
            .video_path(background_id)
            .filter(|path| path.exists());
        let subtitles = subtitles.filter(|path| path.exists());

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-i".into(),
            clip.to_string_lossy().into_owned(),
        ];
        if let Some(bg) = &background {
            args.extend([
                "-stream_loop".into(),
                "-1".into(),
                "-i".into(),
                bg.to_string_lossy().into_owned(),
            ]);
        }
        args.extend([
            "-filter_complex".into(),
            composition_graph(background.is_some(), subtitles),
            "-map".into(),
            "[v]".into(),
            "-map".into(),
            "0:a?".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            "20".into(),
            "-r".into(),
            "30".into(),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
            "-movflags".into(),
            "+faststart".into(),
            output.to_string_lossy().into_owned(),
        ]);

        debug!(
            clip = %clip.display(),
            background = ?background,
            subtitles = subtitles.is_some(),
            "Composing vertical clip"
        );

        run_tool("ffmpeg", &args).await?;
        Ok(output.to_path_buf())
    }
}
