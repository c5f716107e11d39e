pub mod captions;
pub mod client;
pub mod config;
pub mod error;
pub mod metadata;
pub mod output;
pub mod server;
pub mod transcript;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Display name of the default caption track
pub const DEFAULT_LANGUAGE: &str = "English";

/// Language tag the default endpoint puts on its segments
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#)
        .expect("video id pattern is valid")
});

/// The 11-character token YouTube uses to address a video
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A raw caption cue as returned by the captions source
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// A single normalized transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub id: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub language: String,
}

impl TranscriptSegment {
    pub fn from_cue(index: usize, cue: Cue, language: &str) -> Self {
        // a negative duration would put the end before the start
        let duration = cue.duration.max(0.0);
        Self {
            id: index.to_string(),
            text: cue.text,
            start_time: cue.start,
            end_time: cue.start + duration,
            language: language.to_string(),
        }
    }
}

/// Video metadata plus the languages a transcript can be requested in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub available_languages: Vec<String>,
}

/// Whether a requested language name means the default track
pub fn is_default_language(name: &str) -> bool {
    name.eq_ignore_ascii_case(DEFAULT_LANGUAGE)
}

/// Extract the video ID from a YouTube URL
///
/// Accepts `watch?v=`, `embed/`, `e/`, `v/`, the legacy long form
/// `youtube.com/<user>/<...>/ID` and `youtu.be/ID`. Whether the video
/// exists is left to the fetchers.
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    VIDEO_ID_RE
        .captures(input)
        .map(|caps| VideoId(caps[1].to_string()))
}
