//! In-process fakes for the pipeline stages.
//!
//! The fakes write small placeholder files where the real adapters would
//! produce media, so jobs run end to end without ffmpeg, yt-dlp or whisper.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use creaclips::models::clip::{ClipOutput, ClipWindow, ExportTarget};
use creaclips::models::job::JobRecord;
use creaclips::services::context::PipelineContext;
use creaclips::services::job_manager::JobManager;
use creaclips::services::job_store::JobStore;
use creaclips::services::media::MediaError;
use creaclips::services::pipeline::{PipelineExecutor, PipelineStages, SelectionDefaults};
use creaclips::services::stages::{
    ClipCutter, Compositor, SignalExtractor, SourceFetcher, Transcriber, VariantExporter,
};
use creaclips::services::subtitles::TranscriptSegment;
use creaclips::services::window_selector::{AudioSignal, SIGNAL_SAMPLE_RATE};

pub const QUIET: f32 = 0.01;
pub const LOUD: f32 = 0.8;

/// One fake standing in for every stage.
pub struct FakeMedia {
    pub duration: f64,
    pub signal: Option<AudioSignal>,
    pub cut_delay: Duration,
    pub panic_on_cut: bool,
    active_cuts: AtomicUsize,
    peak_cuts: AtomicUsize,
    transcriptions: AtomicUsize,
}

impl FakeMedia {
    pub fn new(duration: f64, signal: Option<AudioSignal>) -> Self {
        Self {
            duration,
            signal,
            cut_delay: Duration::ZERO,
            panic_on_cut: false,
            active_cuts: AtomicUsize::new(0),
            peak_cuts: AtomicUsize::new(0),
            transcriptions: AtomicUsize::new(0),
        }
    }

    /// A source with an audio track that is quiet except inside `loud`.
    pub fn with_loud_ranges(duration: f64, loud: &[(f64, f64)]) -> Self {
        Self::new(duration, Some(signal_with_loud_ranges(duration, loud)))
    }

    pub fn silent_video(duration: f64) -> Self {
        Self::new(duration, None)
    }

    pub fn cut_delay(mut self, delay: Duration) -> Self {
        self.cut_delay = delay;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_cut = true;
        self
    }

    /// Most cuts observed in flight at the same time.
    pub fn peak_concurrent_cuts(&self) -> usize {
        self.peak_cuts.load(Ordering::SeqCst)
    }

    pub fn transcriptions(&self) -> usize {
        self.transcriptions.load(Ordering::SeqCst)
    }
}

pub fn signal_with_loud_ranges(duration: f64, loud: &[(f64, f64)]) -> AudioSignal {
    let rate = f64::from(SIGNAL_SAMPLE_RATE);
    let frames = (duration * rate) as usize;
    let samples = (0..frames)
        .map(|i| {
            let t = i as f64 / rate;
            if loud.iter().any(|(s, e)| t >= *s && t < *e) {
                LOUD
            } else {
                QUIET
            }
        })
        .collect();
    AudioSignal::mono(samples, SIGNAL_SAMPLE_RATE)
}

#[async_trait]
impl SourceFetcher for FakeMedia {
    async fn fetch(&self, ctx: &PipelineContext) -> Result<PathBuf, MediaError> {
        if let Some(upload) = &ctx.uploaded_source {
            return Ok(upload.clone());
        }
        let path = ctx.source_dir.join("source.mp4");
        tokio::fs::write(&path, b"source").await?;
        Ok(path)
    }
}

#[async_trait]
impl SignalExtractor for FakeMedia {
    async fn probe_duration(&self, _media: &Path) -> Result<f64, MediaError> {
        Ok(self.duration)
    }

    async fn extract(&self, _media: &Path) -> Result<Option<AudioSignal>, MediaError> {
        Ok(self.signal.clone())
    }
}

#[async_trait]
impl ClipCutter for FakeMedia {
    async fn cut(
        &self,
        _source: &Path,
        window: &ClipWindow,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        if self.panic_on_cut {
            panic!("cutter crashed");
        }

        let active = self.active_cuts.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_cuts.fetch_max(active, Ordering::SeqCst);
        if !self.cut_delay.is_zero() {
            tokio::time::sleep(self.cut_delay).await;
        }
        self.active_cuts.fetch_sub(1, Ordering::SeqCst);

        let body = format!("{:.1}-{:.1}", window.start, window.end);
        tokio::fs::write(output, body).await?;
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl Transcriber for FakeMedia {
    async fn transcribe(&self, _clip: &Path) -> Result<Vec<TranscriptSegment>, MediaError> {
        self.transcriptions.fetch_add(1, Ordering::SeqCst);
        Ok(vec![TranscriptSegment {
            start: 0.0,
            end: 1.5,
            text: "Bonjour à tous".to_string(),
        }])
    }
}

#[async_trait]
impl Compositor for FakeMedia {
    async fn compose(
        &self,
        clip: &Path,
        _subtitles: Option<&Path>,
        _background_id: &str,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        tokio::fs::copy(clip, output).await?;
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl VariantExporter for FakeMedia {
    async fn export(
        &self,
        master: &Path,
        subtitles: Option<&Path>,
        clip_index: usize,
    ) -> Result<Vec<ClipOutput>, MediaError> {
        let target = ExportTarget::Tiktok;
        Ok(vec![ClipOutput {
            label: target.label().to_string(),
            target,
            clip_index,
            video_path: master.to_path_buf(),
            subtitle_path: subtitles.map(Path::to_path_buf),
            video_url: format!("/media/clip_{:02}.mp4", clip_index),
            subtitle_url: subtitles.map(|_| format!("/media/clip_{:02}.srt", clip_index)),
        }])
    }
}

pub fn stages(fake: Arc<FakeMedia>) -> PipelineStages {
    PipelineStages {
        fetcher: fake.clone(),
        extractor: fake.clone(),
        cutter: fake.clone(),
        transcriber: fake.clone(),
        compositor: fake.clone(),
        exporter: fake,
    }
}

pub fn defaults() -> SelectionDefaults {
    SelectionDefaults {
        clip_length_seconds: 10,
        min_clip_length_seconds: 5,
        max_clips: 3,
        interval_seconds: 10,
    }
}

pub fn manager(fake: Arc<FakeMedia>, max_parallel_jobs: usize, jobs_dir: &Path) -> JobManager {
    JobManager::new(
        Arc::new(JobStore::new()),
        Arc::new(PipelineExecutor::new(stages(fake), defaults())),
        jobs_dir,
        max_parallel_jobs,
    )
}

/// Poll until the job is terminal, panicking after `timeout`.
pub async fn wait_terminal(manager: &JobManager, id: Uuid, timeout: Duration) -> JobRecord {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let record = manager.get(id).expect("job should exist");
        if record.is_terminal() {
            return record;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("job {} did not finish in time: {:?}", id, record);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
