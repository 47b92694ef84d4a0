//! Test helper utilities for E2E testing against a running server

#![allow(dead_code)]

use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Subset of a job snapshot the E2E tests inspect
#[derive(Debug, Deserialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: String,
    pub progress: f64,
    pub message: String,
    pub outputs: Vec<serde_json::Value>,
}

/// Error body returned for request-level failures
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Upload a video to the upload endpoint with optional form fields
pub async fn upload_video(
    client: &reqwest::Client,
    base_url: &str,
    video_path: &Path,
    fields: &[(&str, &str)],
) -> Result<JobSnapshot, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(video_path)?;
    let filename = video_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.mp4")
        .to_string();

    let mut form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("video/mp4")?,
    );
    for (name, value) in fields {
        form = form.text(name.to_string(), value.to_string());
    }

    let response = client
        .post(format!("{}/jobs/upload", base_url))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<JobSnapshot>().await?)
}

/// Poll a job until it is completed or failed (with timeout)
pub async fn poll_job(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobSnapshot, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/jobs/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let snapshot = response.json::<JobSnapshot>().await?;
        match snapshot.status.as_str() {
            "completed" | "failed" => return Ok(snapshot),
            "pending" | "running" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!(
                        "  ... {:.0}% {} (attempt {}/{})",
                        snapshot.progress * 100.0,
                        snapshot.message,
                        attempt,
                        max_attempts
                    );
                }
                sleep(Duration::from_millis(500)).await;
            }
            other => return Err(format!("Unknown job status: {}", other).into()),
        }
    }

    Err(format!("Job did not finish within {} seconds", timeout_secs).into())
}
