use axum::extract::{Multipart, Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::JobRecord;
use crate::models::request::{ClipRequest, ClipStrategy, SourceType};
use crate::routes::error::ApiError;
use crate::services::job_manager::JobError;
use crate::services::upload::UploadedFile;

/// GET /jobs — every known job, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobRecord>> {
    Json(state.manager.list())
}

/// GET /jobs/{job_id} — latest snapshot of one job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    let id = Uuid::parse_str(&job_id).map_err(|_| ApiError::not_found("Job not found"))?;
    Ok(Json(state.manager.get(id)?))
}

/// POST /jobs — submit a job for a YouTube or direct URL source.
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<ClipRequest>,
) -> Result<Json<JobRecord>, ApiError> {
    let record = state.manager.submit(request, None).await?;
    Ok(Json(record))
}

/// POST /jobs/upload — submit a job for an uploaded file.
///
/// The file arrives in the `file` part and is streamed to disk; the
/// remaining parts carry the request knobs as form text. Empty text parts
/// count as absent.
pub async fn create_job_from_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<JobRecord>, ApiError> {
    let mut request = ClipRequest::new(SourceType::Upload);
    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            let file_name = field.file_name().map(str::to_string);
            let mut spool = state.manager.open_upload(file_name).await?;
            while let Some(chunk) = field.chunk().await? {
                spool.write_chunk(&chunk).await.map_err(JobError::Setup)?;
            }
            if spool.size() == 0 {
                return Err(ApiError::bad_request("Uploaded file is empty"));
            }
            upload = Some(spool.finish().await.map_err(JobError::Setup)?);
        } else {
            let value = field.text().await?;
            apply_form_field(&mut request, &name, value.trim())?;
        }
    }

    let record = state.manager.submit(request, upload).await?;
    Ok(Json(record))
}

/// Set one upload form field on `request`. Unknown fields are ignored.
pub fn apply_form_field(
    request: &mut ClipRequest,
    name: &str,
    value: &str,
) -> Result<(), ApiError> {
    let text = (!value.is_empty()).then(|| value.to_string());
    match name {
        "clip_strategy" => {
            if let Some(text) = text {
                request.clip_strategy = text
                    .parse::<ClipStrategy>()
                    .map_err(|_| ApiError::bad_request(format!("Unknown clip_strategy: {}", text)))?;
            }
        }
        "interval_seconds" => request.interval_seconds = parse_number(name, value)?,
        "clip_length_seconds" => request.clip_length_seconds = parse_number(name, value)?,
        "min_clip_length_seconds" => request.min_clip_length_seconds = parse_number(name, value)?,
        "max_clips" => request.max_clips = parse_number(name, value)?,
        "background_id" => {
            if let Some(text) = text {
                request.background_id = text;
            }
        }
        "generate_subtitles" => {
            if !value.is_empty() {
                request.generate_subtitles = parse_flag(name, value)?;
            }
        }
        "request_name" => request.request_name = text,
        _ => {}
    }
    Ok(())
}

fn parse_number(name: &str, value: &str) -> Result<Option<u32>, ApiError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{} must be a positive integer", name)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ApiError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ApiError::bad_request(format!("{} must be a boolean", name))),
    }
}
