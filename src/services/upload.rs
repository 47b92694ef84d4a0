//! Streaming of uploaded files to disk.
//!
//! An upload is spooled chunk by chunk into a temporary file under the jobs
//! directory, then moved into its job's `source/` once the job exists. A
//! spool that never gets staged is removed when dropped.

use std::io;
use std::path::Path;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// Spool directory name under the jobs directory. Staying on the same
/// filesystem keeps staging a rename.
pub const INCOMING_DIR: &str = ".incoming";

/// An upload being written to disk.
pub struct UploadSpool {
    file: tokio::fs::File,
    path: TempPath,
    file_name: Option<String>,
    size: u64,
}

impl UploadSpool {
    pub async fn create(dir: &Path, file_name: Option<String>) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)?
            .into_parts();

        Ok(Self {
            file: tokio::fs::File::from_std(file),
            path,
            file_name,
            size: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flush and close the spool file.
    pub async fn finish(self) -> io::Result<UploadedFile> {
        let Self {
            mut file,
            path,
            file_name,
            size,
        } = self;
        file.flush().await?;
        drop(file);

        tracing::debug!(path = %path.display(), size, "Upload spooled");
        Ok(UploadedFile {
            file_name,
            path,
            size,
        })
    }
}

/// A fully received upload, still in the spool directory.
#[derive(Debug)]
pub struct UploadedFile {
    file_name: Option<String>,
    path: TempPath,
    size: u64,
}

impl UploadedFile {
    /// Client-side file name, used only for its extension.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the spooled file to `target`.
    pub fn persist(self, target: &Path) -> io::Result<()> {
        self.path.persist(target).map_err(|e| e.error)
    }
}
