use serde::{Deserialize, Serialize};

/// One timed line of speech, relative to the start of the clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Render segments as SubRip. Blank segments are skipped without
/// renumbering gaps.
pub fn segments_to_srt(segments: &[TranscriptSegment]) -> String {
    let mut blocks = Vec::new();
    let mut index = 0;

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        index += 1;
        blocks.push(format!(
            "{}\n{} --> {}\n{}\n",
            index,
            format_timestamp(segment.start),
            format_timestamp(segment.end),
            text
        ));
    }

    let mut srt = blocks.join("\n");
    if srt.is_empty() {
        srt.push('\n');
    }
    srt
}

/// `HH:MM:SS,mmm`, truncating sub-millisecond precision.
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0) as u64;
    let millis = total_millis % 1000;
    let secs = total_millis / 1000;
    let (hours, rem) = (secs / 3600, secs % 3600);
    let (mins, secs) = (rem / 60, rem % 60);
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}
