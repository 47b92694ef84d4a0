use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::services::media::{run_tool, MediaError};
use crate::services::stages::Transcriber;
use crate::services::subtitles::TranscriptSegment;

/// Speech-to-text through the `whisper` command line tool.
pub struct WhisperTranscriber {
    model: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

impl WhisperTranscriber {
    pub fn new(model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            language: language.into(),
        }
    }
}

fn parse_segments(raw: &str) -> Result<Vec<TranscriptSegment>, MediaError> {
    let output: WhisperOutput = serde_json::from_str(raw)?;
    Ok(output.segments)
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, clip: &Path) -> Result<Vec<TranscriptSegment>, MediaError> {
        let out_dir = tempfile::tempdir()?;
        let input = clip.to_string_lossy().to_string();
        let out_path = out_dir.path().to_string_lossy().to_string();

        run_tool(
            "whisper",
            [
                input.as_str(),
                "--model",
                self.model.as_str(),
                "--language",
                self.language.as_str(),
                "--task",
                "transcribe",
                "--output_format",
                "json",
                "--output_dir",
                out_path.as_str(),
                "--verbose",
                "False",
                "--fp16",
                "False",
            ],
        )
        .await?;

        let stem = clip
            .file_stem()
            .ok_or_else(|| MediaError::InvalidMedia(format!("no file name: {}", clip.display())))?;
        let json_path = out_dir.path().join(stem).with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path).await?;
        let segments = parse_segments(&raw)?;

        debug!(clip = %clip.display(), segments = segments.len(), "Transcription complete");
        Ok(segments)
    }
}
