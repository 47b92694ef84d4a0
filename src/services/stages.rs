//! Narrow interfaces to the external collaborators of the pipeline.
//!
//! Each stage is a black box returning a file path or structured result;
//! the executor only sequences them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::models::clip::{ClipOutput, ClipWindow};
use crate::services::context::PipelineContext;
use crate::services::media::MediaError;
use crate::services::subtitles::TranscriptSegment;
use crate::services::window_selector::AudioSignal;

/// Produces a local media file for the job's source.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, ctx: &PipelineContext) -> Result<PathBuf, MediaError>;
}

/// Reads duration and audio out of a media file.
#[async_trait]
pub trait SignalExtractor: Send + Sync {
    async fn probe_duration(&self, media: &Path) -> Result<f64, MediaError>;

    /// `None` when the file has no audio track.
    async fn extract(&self, media: &Path) -> Result<Option<AudioSignal>, MediaError>;
}

/// Cuts `window` out of the source into `output`.
#[async_trait]
pub trait ClipCutter: Send + Sync {
    async fn cut(
        &self,
        source: &Path,
        window: &ClipWindow,
        output: &Path,
    ) -> Result<PathBuf, MediaError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &Path) -> Result<Vec<TranscriptSegment>, MediaError>;
}

/// Recomposes a clip over a background, burning subtitles in when given.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn compose(
        &self,
        clip: &Path,
        subtitles: Option<&Path>,
        background_id: &str,
        output: &Path,
    ) -> Result<PathBuf, MediaError>;
}

/// Turns a composed master into the labeled per-platform outputs.
#[async_trait]
pub trait VariantExporter: Send + Sync {
    async fn export(
        &self,
        master: &Path,
        subtitles: Option<&Path>,
        clip_index: usize,
    ) -> Result<Vec<ClipOutput>, MediaError>;
}
