use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

/// A `[start, end)` interval of the source, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub end: f64,
    /// Selection confidence; `None` for strategies that do not score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ClipWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            score: None,
        }
    }

    pub fn scored(start: f64, end: f64, score: f64) -> Self {
        Self {
            start,
            end,
            score: Some(score),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Intervals overlap unless one ends at or before the other starts.
    pub fn overlaps(&self, other: &ClipWindow) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

/// Platform variants produced for every composed clip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExportTarget {
    Tiktok,
    Reels,
    Shorts,
}

impl ExportTarget {
    pub fn label(self) -> &'static str {
        match self {
            ExportTarget::Tiktok => "TikTok 1080x1920 (60s)",
            ExportTarget::Reels => "Instagram Reels",
            ExportTarget::Shorts => "YouTube Shorts",
        }
    }
}

/// One exported artifact of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipOutput {
    pub label: String,
    pub target: ExportTarget,
    /// 1-based position of the source window, in time order.
    pub clip_index: usize,
    pub video_path: PathBuf,
    pub subtitle_path: Option<PathBuf>,
    pub video_url: String,
    pub subtitle_url: Option<String>,
}
