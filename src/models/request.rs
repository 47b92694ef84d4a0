use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where the source video comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    /// Any page yt-dlp can resolve (YouTube and friends).
    Youtube,
    /// A file posted alongside the request.
    Upload,
    /// A direct link to a media file.
    Url,
}

impl SourceType {
    pub fn is_remote(self) -> bool {
        !matches!(self, SourceType::Upload)
    }
}

/// How candidate windows are chosen from the source.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClipStrategy {
    /// Loudest non-overlapping moments.
    #[default]
    Highlights,
    /// Fixed-size tiles at a fixed stride.
    Interval,
}

/// Parameters of a clip job, immutable once the job is submitted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ClipRequest {
    #[garde(skip)]
    pub source_type: SourceType,

    #[serde(default, alias = "source_url")]
    #[garde(length(min = 1, max = 2048))]
    pub youtube_url: Option<String>,

    #[serde(default)]
    #[garde(skip)]
    pub clip_strategy: ClipStrategy,

    #[serde(default)]
    #[garde(range(min = 1, max = 3600))]
    pub interval_seconds: Option<u32>,

    #[serde(default)]
    #[garde(range(min = 1, max = 600))]
    pub clip_length_seconds: Option<u32>,

    #[serde(default)]
    #[garde(range(min = 1, max = 600))]
    pub min_clip_length_seconds: Option<u32>,

    #[serde(default = "default_background_id")]
    #[garde(length(min = 1, max = 100))]
    pub background_id: String,

    #[serde(default = "default_generate_subtitles")]
    #[garde(skip)]
    pub generate_subtitles: bool,

    #[serde(default)]
    #[garde(range(min = 1, max = 50))]
    pub max_clips: Option<u32>,

    #[serde(default)]
    #[garde(length(max = 200))]
    pub request_name: Option<String>,
}

fn default_background_id() -> String {
    "gta-drive".to_string()
}

fn default_generate_subtitles() -> bool {
    true
}

impl ClipRequest {
    /// A request with every optional knob left to the server defaults.
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            youtube_url: None,
            clip_strategy: ClipStrategy::default(),
            interval_seconds: None,
            clip_length_seconds: None,
            min_clip_length_seconds: None,
            background_id: default_background_id(),
            generate_subtitles: default_generate_subtitles(),
            max_clips: None,
            request_name: None,
        }
    }

    /// Shorthand for a remote request.
    pub fn remote(source_type: SourceType, url: impl Into<String>) -> Self {
        Self {
            youtube_url: Some(url.into()),
            ..Self::new(source_type)
        }
    }

    /// Field-level rules plus the source reference check.
    pub fn check(&self) -> Result<(), RequestError> {
        self.validate()?;

        if self.source_type.is_remote() {
            let url = self
                .youtube_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or(RequestError::MissingSourceUrl(self.source_type))?;

            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(RequestError::InvalidSourceUrl(url.to_string()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] garde::Report),

    #[error("youtube_url is required when source_type={0}")]
    MissingSourceUrl(SourceType),

    #[error("Source URL must be http(s): {0}")]
    InvalidSourceUrl(String),

    #[error("An uploaded file is required when source_type=upload")]
    MissingUpload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let request: ClipRequest =
            serde_json::from_str(r#"{"source_type":"youtube","youtube_url":"https://youtu.be/x"}"#)
                .unwrap();
        assert_eq!(request.clip_strategy, ClipStrategy::Highlights);
        assert_eq!(request.background_id, "gta-drive");
        assert!(request.generate_subtitles);
        assert!(request.check().is_ok());
    }

    #[test]
    fn test_source_url_alias() {
        let request: ClipRequest =
            serde_json::from_str(r#"{"source_type":"url","source_url":"https://cdn.test/a.mp4"}"#)
                .unwrap();
        assert_eq!(request.youtube_url.as_deref(), Some("https://cdn.test/a.mp4"));
    }

    #[test]
    fn test_remote_requires_url() {
        let request = ClipRequest::new(SourceType::Youtube);
        assert!(matches!(
            request.check(),
            Err(RequestError::MissingSourceUrl(SourceType::Youtube))
        ));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let request = ClipRequest::remote(SourceType::Url, "file:///etc/passwd");
        assert!(matches!(request.check(), Err(RequestError::InvalidSourceUrl(_))));
    }

    #[test]
    fn test_range_rules() {
        let mut request = ClipRequest::new(SourceType::Upload);
        request.max_clips = Some(0);
        assert!(matches!(request.check(), Err(RequestError::Invalid(_))));

        request.max_clips = Some(3);
        assert!(request.check().is_ok());
    }

    #[test]
    fn test_strategy_parses_from_form_value() {
        assert_eq!("interval".parse::<ClipStrategy>().unwrap(), ClipStrategy::Interval);
        assert!("loudest".parse::<ClipStrategy>().is_err());
    }
}
