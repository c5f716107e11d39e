use crate::{TranscriptSegment, VideoInfo};

/// Format seconds as `HH:MM:SS`, wrapping at 24 hours
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64 % 86_400;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn format_srt_timestamp(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let (secs, ms) = (millis / 1000, millis % 1000);
    format!("{:02}:{:02}:{:02},{ms:03}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Render the transcript one segment per line, optionally prefixed with `[HH:MM:SS]`
pub fn render_text(segments: &[TranscriptSegment], timestamps: bool) -> String {
    segments
        .iter()
        .map(|s| {
            if timestamps {
                format!("[{}] {}", format_timestamp(s.start_time), s.text)
            } else {
                s.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the transcript as SubRip
pub fn render_srt(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                format_srt_timestamp(s.start_time),
                format_srt_timestamp(s.end_time),
                s.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(segments: &[TranscriptSegment]) -> String {
    serde_json::to_string_pretty(segments).unwrap_or_else(|_| "[]".to_string())
}

/// Title block shown above a transcript
pub fn render_header(info: &VideoInfo, selected_language: &str) -> String {
    let languages = info
        .available_languages
        .iter()
        .map(|lang| {
            if lang == selected_language {
                format!("*{lang}")
            } else {
                lang.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\nhttps://www.youtube.com/watch?v={}\nThumbnail: {}\nLanguages: {languages}",
        info.title, info.id, info.thumbnail
    )
}
