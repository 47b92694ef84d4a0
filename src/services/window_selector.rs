//! Candidate window selection.
//!
//! Two strategies turn a source into an ordered list of non-overlapping
//! windows: `interval` tiles the timeline at a fixed stride, `highlights`
//! ranks fixed-size chunks of the audio track by RMS energy and greedily
//! keeps the loudest ones. Both return windows sorted by start time.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::models::clip::ClipWindow;
use crate::models::request::ClipStrategy;

/// Sample rate the highlight strategy expects its signal at.
pub const SIGNAL_SAMPLE_RATE: u32 = 8000;

/// Decoded audio track, interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, 1, sample_rate)
    }

    /// Average all channels of each frame into one sample.
    /// Borrows the samples when the signal is already mono.
    pub fn downmix(&self) -> Cow<'_, [f32]> {
        let channels = usize::from(self.channels.max(1));
        if channels == 1 {
            return Cow::Borrowed(&self.samples);
        }
        Cow::Owned(
            self.samples
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect(),
        )
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() || self.sample_rate == 0
    }
}

/// Window sizing shared by both strategies, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionParams {
    pub clip_length: f64,
    pub min_clip_length: f64,
    pub max_clips: usize,
    pub stride: f64,
}

impl SelectionParams {
    /// `min_clip_length` is clamped down to `clip_length`; a non-positive
    /// stride falls back to `clip_length`.
    pub fn new(clip_length: f64, min_clip_length: f64, max_clips: usize, stride: f64) -> Self {
        let stride = if stride > 0.0 { stride } else { clip_length };
        Self {
            clip_length,
            min_clip_length: min_clip_length.min(clip_length),
            max_clips,
            stride,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("No audio track detected, cannot compute highlights")]
    MissingAudio,

    #[error("Clip length must be positive, got {0}")]
    InvalidClipLength(f64),
}

/// Select windows for `strategy`. `signal` is only consulted for highlights.
pub fn select(
    strategy: ClipStrategy,
    duration: f64,
    signal: Option<&AudioSignal>,
    params: &SelectionParams,
) -> Result<Vec<ClipWindow>, SelectionError> {
    if !(params.clip_length > 0.0) {
        return Err(SelectionError::InvalidClipLength(params.clip_length));
    }

    match strategy {
        ClipStrategy::Interval => Ok(interval_windows(duration, params)),
        ClipStrategy::Highlights => highlight_windows(duration, signal, params),
    }
}

/// Fixed tiling from `t = 0`: each start is `k * stride`.
pub fn interval_windows(duration: f64, params: &SelectionParams) -> Vec<ClipWindow> {
    let mut windows = Vec::new();
    if !(params.stride > 0.0) {
        return windows;
    }

    let mut k: u32 = 0;
    loop {
        let start = f64::from(k) * params.stride;
        if start >= duration || windows.len() >= params.max_clips {
            break;
        }
        let end = (start + params.clip_length).min(duration);
        if end - start >= params.min_clip_length {
            windows.push(ClipWindow::new(start, end));
        }
        k += 1;
    }

    windows
}

#[derive(Debug, Clone, Copy)]
struct Chunk {
    start: f64,
    rms: f64,
}

/// Energy-ranked greedy selection over `min_clip_length` chunks.
pub fn highlight_windows(
    duration: f64,
    signal: Option<&AudioSignal>,
    params: &SelectionParams,
) -> Result<Vec<ClipWindow>, SelectionError> {
    let signal = signal
        .filter(|s| !s.is_empty())
        .ok_or(SelectionError::MissingAudio)?;

    let mut chunks = score_chunks(signal, params.min_clip_length);

    // Loudest first; equal energy keeps the earlier chunk first.
    chunks.sort_by(|a, b| {
        b.rms
            .total_cmp(&a.rms)
            .then_with(|| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal))
    });

    let latest_start = (duration - params.clip_length).max(0.0);
    let mut selected: Vec<ClipWindow> = Vec::new();

    for chunk in chunks {
        if selected.len() >= params.max_clips {
            break;
        }

        let start = chunk.start.min(latest_start);
        let end = (start + params.clip_length).min(duration);
        let candidate = ClipWindow::scored(start, end, chunk.rms);

        if candidate.duration() < params.min_clip_length {
            continue;
        }
        if selected.iter().any(|w| w.overlaps(&candidate)) {
            continue;
        }
        selected.push(candidate);
    }

    selected.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(selected)
}

fn score_chunks(signal: &AudioSignal, chunk_seconds: f64) -> Vec<Chunk> {
    let mono = signal.downmix();
    let rate = f64::from(signal.sample_rate);
    let chunk_len = ((rate * chunk_seconds) as usize).max(1);

    mono.chunks(chunk_len)
        .enumerate()
        .map(|(i, chunk)| Chunk {
            start: (i * chunk_len) as f64 / rate,
            rms: rms(chunk),
        })
        .collect()
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}
