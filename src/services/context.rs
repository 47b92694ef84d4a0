use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::request::ClipRequest;
use crate::services::upload::UploadedFile;

/// Per-job working environment, owned by the worker running that job.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub job_id: Uuid,
    pub request: ClipRequest,
    pub job_dir: PathBuf,
    pub source_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Staged upload, set for `upload` requests.
    pub uploaded_source: Option<PathBuf>,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    /// Lay out `<jobs_dir>/<job_id>/{source,clips,exports,temp}`.
    pub fn new(
        job_id: Uuid,
        request: ClipRequest,
        jobs_dir: &Path,
        cancel: CancellationToken,
    ) -> Self {
        let job_dir = jobs_dir.join(job_id.to_string());
        Self {
            job_id,
            request,
            source_dir: job_dir.join("source"),
            clips_dir: job_dir.join("clips"),
            exports_dir: job_dir.join("exports"),
            temp_dir: job_dir.join("temp"),
            job_dir,
            uploaded_source: None,
            cancel,
        }
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.job_dir,
            &self.source_dir,
            &self.clips_dir,
            &self.exports_dir,
            &self.temp_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Move a spooled upload to `source/upload.<ext>`, keeping the original extension.
    pub fn stage_upload(&mut self, upload: UploadedFile) -> std::io::Result<PathBuf> {
        let ext = upload
            .file_name()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4")
            .to_string();

        let target = self.source_dir.join(format!("upload.{}", ext));
        upload.persist(&target)?;
        self.uploaded_source = Some(target.clone());
        Ok(target)
    }

    /// Paths for the `index`-th window (1-based).
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.clips_dir.join(format!("clip_{:02}.mp4", index))
    }

    pub fn subtitle_path(&self, index: usize) -> PathBuf {
        self.clips_dir.join(format!("clip_{:02}.srt", index))
    }

    pub fn master_path(&self, index: usize) -> PathBuf {
        self.exports_dir.join(format!("clip_{:02}_master.mp4", index))
    }
}
