use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::background::BackgroundPreset;

pub const PRESETS_FILE: &str = "presets.json";

/// Background presets read once from `<background_dir>/presets.json`.
#[derive(Debug, Clone, Default)]
pub struct BackgroundCatalog {
    dir: PathBuf,
    presets: Vec<BackgroundPreset>,
}

impl BackgroundCatalog {
    pub fn new(dir: impl Into<PathBuf>, presets: Vec<BackgroundPreset>) -> Self {
        Self {
            dir: dir.into(),
            presets,
        }
    }

    /// A missing presets file yields an empty catalog; a malformed one is an error.
    pub async fn load(dir: &Path) -> Result<Self, BackgroundError> {
        let file = dir.join(PRESETS_FILE);
        let raw = match tokio::fs::read_to_string(&file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %file.display(), "No background presets file, using blurred fill only");
                return Ok(Self::new(dir, Vec::new()));
            }
            Err(e) => return Err(BackgroundError::Io(e)),
        };

        let presets: Vec<BackgroundPreset> = serde_json::from_str(&raw)?;
        info!(count = presets.len(), "Loaded background presets");
        Ok(Self::new(dir, presets))
    }

    pub fn presets(&self) -> &[BackgroundPreset] {
        &self.presets
    }

    pub fn get(&self, id: &str) -> Option<&BackgroundPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Video file behind preset `id`, when the preset names one.
    pub fn video_path(&self, id: &str) -> Option<PathBuf> {
        self.get(id)
            .and_then(|p| p.file.as_deref())
            .map(|file| self.dir.join(file))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("Failed to read background presets: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed background presets: {0}")]
    Parse(#[from] serde_json::Error),
}
