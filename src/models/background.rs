use serde::{Deserialize, Serialize};

/// A selectable background video shown behind the vertical clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackgroundPreset {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// File name relative to the background directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}
