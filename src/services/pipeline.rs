//! Stage sequencing for one job: fetch, select, then per window
//! cut / transcribe / compose / export.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::Display;
use tracing::{debug, info};

use crate::models::clip::{ClipOutput, ClipWindow};
use crate::models::request::{ClipRequest, ClipStrategy};
use crate::services::context::PipelineContext;
use crate::services::media::MediaError;
use crate::services::stages::{
    ClipCutter, Compositor, SignalExtractor, SourceFetcher, Transcriber, VariantExporter,
};
use crate::services::subtitles::segments_to_srt;
use crate::services::window_selector::{self, SelectionError, SelectionParams};

/// Fraction of the progress range reached once windows are selected.
const SELECTED_PROGRESS: f64 = 0.2;
/// Fraction apportioned across the per-window work.
const WINDOWS_PROGRESS_SPAN: f64 = 0.7;

/// Receives progress reports from a running pipeline.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: f64, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    Analyze,
    Cut,
    Transcribe,
    Compose,
    Export,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Source retrieval failed: {0}")]
    Retrieval(#[source] MediaError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("No clip detected. Adjust the parameters.")]
    NoWindows,

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: MediaError,
    },

    #[error("Job cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn stage(stage: PipelineStage) -> impl FnOnce(MediaError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}

/// Server-side fallbacks for the optional request knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionDefaults {
    pub clip_length_seconds: u32,
    pub min_clip_length_seconds: u32,
    pub max_clips: u32,
    pub interval_seconds: u32,
}

impl SelectionDefaults {
    /// Absent or zero request values fall back to the defaults.
    pub fn params_for(&self, request: &ClipRequest) -> SelectionParams {
        let pick = |value: Option<u32>, default: u32| value.filter(|v| *v > 0).unwrap_or(default);

        SelectionParams::new(
            f64::from(pick(request.clip_length_seconds, self.clip_length_seconds)),
            f64::from(pick(request.min_clip_length_seconds, self.min_clip_length_seconds)),
            pick(request.max_clips, self.max_clips) as usize,
            f64::from(pick(request.interval_seconds, self.interval_seconds)),
        )
    }
}

/// The external collaborators one pipeline run calls into.
#[derive(Clone)]
pub struct PipelineStages {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub extractor: Arc<dyn SignalExtractor>,
    pub cutter: Arc<dyn ClipCutter>,
    pub transcriber: Arc<dyn Transcriber>,
    pub compositor: Arc<dyn Compositor>,
    pub exporter: Arc<dyn VariantExporter>,
}

pub struct PipelineExecutor {
    stages: PipelineStages,
    defaults: SelectionDefaults,
}

impl PipelineExecutor {
    pub fn new(stages: PipelineStages, defaults: SelectionDefaults) -> Self {
        Self { stages, defaults }
    }

    pub fn defaults(&self) -> &SelectionDefaults {
        &self.defaults
    }

    /// Run every stage in order. Either all outputs are returned or none.
    pub async fn run(
        &self,
        ctx: &PipelineContext,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<ClipOutput>, PipelineError> {
        checkpoint(ctx)?;
        progress.report(0.05, "Downloading source…");
        let source = self
            .stages
            .fetcher
            .fetch(ctx)
            .await
            .map_err(PipelineError::Retrieval)?;

        checkpoint(ctx)?;
        progress.report(0.15, "Detecting highlights…");
        let windows = self.select_windows(ctx, &source).await?;
        let total = windows.len();
        progress.report(SELECTED_PROGRESS, &format!("{} clip(s) selected", total));

        let mut outputs = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            let index = i + 1;
            checkpoint(ctx)?;
            let produced = self.process_window(ctx, &source, window, index).await?;
            outputs.extend(produced);

            let value = SELECTED_PROGRESS + WINDOWS_PROGRESS_SPAN * (index as f64 / total as f64);
            progress.report(value, &format!("Clip {}/{} exported.", index, total));
        }

        progress.report(1.0, "Pipeline finished");
        Ok(outputs)
    }

    async fn select_windows(
        &self,
        ctx: &PipelineContext,
        source: &Path,
    ) -> Result<Vec<ClipWindow>, PipelineError> {
        let request = &ctx.request;
        let params = self.defaults.params_for(request);
        let extractor = &self.stages.extractor;

        let duration = extractor
            .probe_duration(source)
            .await
            .map_err(stage(PipelineStage::Analyze))?;

        let signal = match request.clip_strategy {
            ClipStrategy::Highlights => extractor
                .extract(source)
                .await
                .map_err(stage(PipelineStage::Analyze))?,
            ClipStrategy::Interval => None,
        };

        let windows =
            window_selector::select(request.clip_strategy, duration, signal.as_ref(), &params)?;

        info!(
            job_id = %ctx.job_id,
            strategy = %request.clip_strategy,
            duration,
            clip_length = params.clip_length,
            max_clips = params.max_clips,
            windows = windows.len(),
            "Window selection complete"
        );

        if windows.is_empty() {
            return Err(PipelineError::NoWindows);
        }
        Ok(windows)
    }

    async fn process_window(
        &self,
        ctx: &PipelineContext,
        source: &Path,
        window: &ClipWindow,
        index: usize,
    ) -> Result<Vec<ClipOutput>, PipelineError> {
        debug!(
            job_id = %ctx.job_id,
            index,
            start = window.start,
            end = window.end,
            "Processing window"
        );

        let clip = self
            .stages
            .cutter
            .cut(source, window, &ctx.clip_path(index))
            .await
            .map_err(stage(PipelineStage::Cut))?;

        let subtitles: Option<PathBuf> = if ctx.request.generate_subtitles {
            let segments = self
                .stages
                .transcriber
                .transcribe(&clip)
                .await
                .map_err(stage(PipelineStage::Transcribe))?;
            let path = ctx.subtitle_path(index);
            tokio::fs::write(&path, segments_to_srt(&segments)).await?;
            Some(path)
        } else {
            None
        };

        checkpoint(ctx)?;
        let master = self
            .stages
            .compositor
            .compose(
                &clip,
                subtitles.as_deref(),
                &ctx.request.background_id,
                &ctx.master_path(index),
            )
            .await
            .map_err(stage(PipelineStage::Compose))?;

        self.stages
            .exporter
            .export(&master, subtitles.as_deref(), index)
            .await
            .map_err(stage(PipelineStage::Export))
    }
}

fn checkpoint(ctx: &PipelineContext) -> Result<(), PipelineError> {
    if ctx.cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::SourceType;

    fn defaults() -> SelectionDefaults {
        SelectionDefaults {
            clip_length_seconds: 35,
            min_clip_length_seconds: 15,
            max_clips: 5,
            interval_seconds: 30,
        }
    }

    #[test]
    fn test_params_fall_back_to_defaults() {
        let request = ClipRequest::new(SourceType::Upload);
        let params = defaults().params_for(&request);
        assert_eq!(params, SelectionParams::new(35.0, 15.0, 5, 30.0));
    }

    #[test]
    fn test_params_use_request_values() {
        let mut request = ClipRequest::new(SourceType::Upload);
        request.clip_length_seconds = Some(20);
        request.min_clip_length_seconds = Some(25);
        request.max_clips = Some(2);
        request.interval_seconds = Some(0);

        let params = defaults().params_for(&request);
        assert_eq!(params.clip_length, 20.0);
        assert_eq!(params.min_clip_length, 20.0);
        assert_eq!(params.max_clips, 2);
        assert_eq!(params.stride, 30.0);
    }

    #[test]
    fn test_stage_error_message() {
        let err = PipelineError::Stage {
            stage: PipelineStage::Compose,
            source: MediaError::ToolNotFound("ffmpeg"),
        };
        assert_eq!(err.to_string(), "compose stage failed: ffmpeg not found in PATH");
    }

    #[test]
    fn test_missing_audio_message() {
        let err = PipelineError::from(SelectionError::MissingAudio);
        assert!(err.to_string().contains("audio"));
    }
}
