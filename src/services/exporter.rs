use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::models::clip::{ClipOutput, ExportTarget};
use crate::services::media::MediaError;
use crate::services::stages::VariantExporter;

/// Maps files under the data directory to their public URL.
#[derive(Debug, Clone)]
pub struct PublicPaths {
    data_dir: PathBuf,
    prefix: String,
}

impl PublicPaths {
    pub fn new(data_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Files outside the data directory keep their filesystem path.
    pub fn url_for(&self, path: &Path) -> String {
        match path.strip_prefix(&self.data_dir) {
            Ok(relative) => {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                format!("{}/{}", self.prefix, parts.join("/"))
            }
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

/// One copy of the master per export target, named `<stem>_<target><ext>`.
pub struct CopyExporter {
    targets: Vec<ExportTarget>,
    paths: PublicPaths,
}

impl CopyExporter {
    pub fn new(targets: Vec<ExportTarget>, paths: PublicPaths) -> Self {
        Self { targets, paths }
    }
}

fn variant_path(master: &Path, target: ExportTarget) -> PathBuf {
    let stem = master
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    let name = match master.extension() {
        Some(ext) => format!("{}_{}.{}", stem, target, ext.to_string_lossy()),
        None => format!("{}_{}", stem, target),
    };
    master.with_file_name(name)
}

#[async_trait]
impl VariantExporter for CopyExporter {
    async fn export(
        &self,
        master: &Path,
        subtitles: Option<&Path>,
        clip_index: usize,
    ) -> Result<Vec<ClipOutput>, MediaError> {
        let mut outputs = Vec::with_capacity(self.targets.len());

        for &target in &self.targets {
            let path = variant_path(master, target);
            tokio::fs::copy(master, &path).await?;

            outputs.push(ClipOutput {
                label: target.label().to_string(),
                target,
                clip_index,
                video_url: self.paths.url_for(&path),
                video_path: path,
                subtitle_path: subtitles.map(Path::to_path_buf),
                subtitle_url: subtitles.map(|s| self.paths.url_for(s)),
            });
        }

        Ok(outputs)
    }
}
