use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
    pub jobs: JobCounts,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub ffmpeg: ComponentHealth,
    pub ffprobe: ComponentHealth,
    pub yt_dlp: ComponentHealth,
    pub whisper: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct JobCounts {
    pub running: usize,
    pub queued: usize,
    pub max_parallel: usize,
}

fn tool_health(tool: &str) -> ComponentHealth {
    match which::which(tool) {
        Ok(path) => ComponentHealth {
            status: "ok".to_string(),
            path: Some(path.display().to_string()),
        },
        Err(_) => ComponentHealth {
            status: "missing".to_string(),
            path: None,
        },
    }
}

/// GET /health — service status plus availability of the external tools.
///
/// Only ffmpeg and ffprobe are required for the service to be healthy;
/// yt-dlp and whisper gate individual features.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let checks = HealthChecks {
        ffmpeg: tool_health("ffmpeg"),
        ffprobe: tool_health("ffprobe"),
        yt_dlp: tool_health("yt-dlp"),
        whisper: tool_health("whisper"),
    };

    let healthy = checks.ffmpeg.status == "ok" && checks.ffprobe.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
        jobs: JobCounts {
            running: state.manager.running_count(),
            queued: state.manager.queued_count(),
            max_parallel: state.manager.max_parallel_jobs(),
        },
    };

    (status_code, Json(response))
}
