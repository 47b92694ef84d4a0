use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::background::BackgroundPreset;

/// GET /backgrounds — the configured background presets.
pub async fn list_backgrounds(State(state): State<AppState>) -> Json<Vec<BackgroundPreset>> {
    Json(state.backgrounds.presets().to_vec())
}
