use std::sync::LazyLock;

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::{Cue, VideoId};

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("api key pattern is valid"));

static API_KEY_FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).expect("api key pattern is valid"));

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// How a captions request failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptionsError {
    #[error("video not found")]
    NotFound,

    #[error("no captions available")]
    NoCaptions,

    #[error("captions request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for CaptionsError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(StatusCode::NOT_FOUND) {
            CaptionsError::NotFound
        } else {
            CaptionsError::Other(err.to_string())
        }
    }
}

/// One caption track published for a video
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub language_code: String,
    pub name: String,
    pub base_url: String,
    pub is_generated: bool,
    pub is_translatable: bool,
}

/// A language the default track can be machine-translated into
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationLanguage {
    pub name: String,
    pub code: String,
}

/// Every caption track of a video plus its translation targets
#[derive(Debug, Clone)]
pub struct TranscriptList {
    pub video_id: VideoId,
    pub tracks: Vec<Track>,
    pub default_index: usize,
    pub translation_languages: Vec<TranslationLanguage>,
}

impl TranscriptList {
    pub fn default_track(&self) -> Result<&Track, CaptionsError> {
        self.tracks
            .get(self.default_index)
            .or_else(|| self.tracks.first())
            .ok_or(CaptionsError::NoCaptions)
    }

    /// Look up a translation target by its display name
    pub fn translation_code(&self, name: &str) -> Option<&str> {
        self.translation_languages
            .iter()
            .find(|lang| lang.name == name)
            .map(|lang| lang.code.as_str())
    }

    pub fn translation_names(&self) -> impl Iterator<Item = &str> {
        self.translation_languages.iter().map(|lang| lang.name.as_str())
    }
}

/// The captions service as seen by the transcript fetcher
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn list_transcripts(&self, video_id: &VideoId) -> Result<TranscriptList, CaptionsError>;

    async fn fetch(&self, track: &Track) -> Result<Vec<Cue>, CaptionsError>;

    async fn translate(&self, track: &Track, language_code: &str) -> Result<Vec<Cue>, CaptionsError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InnerTubePlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTracklistRenderer {
    caption_tracks: Option<Vec<CaptionTrack>>,
    translation_languages: Option<Vec<RawTranslationLanguage>>,
    audio_tracks: Option<Vec<AudioTrack>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    name: Option<LocalizedText>,
    kind: Option<String>,
    is_translatable: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTranslationLanguage {
    language_code: String,
    language_name: Option<LocalizedText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioTrack {
    default_caption_track_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalizedText {
    simple_text: Option<String>,
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl LocalizedText {
    fn text(&self) -> Option<String> {
        if let Some(ref s) = self.simple_text {
            return Some(s.clone());
        }
        let runs = self.runs.as_ref()?;
        let joined: String = runs.iter().map(|r| r.text.as_str()).collect();
        (!joined.is_empty()).then_some(joined)
    }
}

/// Captions client backed by YouTube's InnerTube player endpoint
#[derive(Clone)]
pub struct InnerTubeClient {
    client: reqwest::Client,
}

impl InnerTubeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_cues(&self, url: &str) -> Result<Vec<Cue>, CaptionsError> {
        if url.contains("&exp=xpe") {
            return Err(CaptionsError::Other("caption track requires a PO token".to_string()));
        }

        debug!("Fetching caption track: {url}");
        let caption_xml = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_caption_xml(&caption_xml)
    }
}

#[async_trait]
impl CaptionSource for InnerTubeClient {
    async fn list_transcripts(&self, video_id: &VideoId) -> Result<TranscriptList, CaptionsError> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let watch_url = video_id.watch_url();
        debug!("Fetching watch page: {watch_url}");

        let page_html = self
            .client
            .get(&watch_url)
            .header("User-Agent", USER_AGENT)
            .header("Accept-Language", "en-US")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key: {api_key}");

        // Step 2: Call InnerTube player endpoint. WEB client tracks demand a
        // PO token, the ANDROID client ones do not.
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": "en",
                    "clientName": "ANDROID",
                    "clientVersion": "20.10.38"
                }
            },
            "videoId": video_id.as_str()
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_transcript_list(video_id, resp)
    }

    async fn fetch(&self, track: &Track) -> Result<Vec<Cue>, CaptionsError> {
        self.fetch_cues(&track.base_url).await
    }

    async fn translate(&self, track: &Track, language_code: &str) -> Result<Vec<Cue>, CaptionsError> {
        if !track.is_translatable {
            return Err(CaptionsError::Other(format!(
                "track {} cannot be translated",
                track.language_code
            )));
        }
        let url = format!("{}&tlang={language_code}", track.base_url);
        self.fetch_cues(&url).await
    }
}

fn extract_api_key(html: &str) -> Result<String, CaptionsError> {
    if let Some(caps) = API_KEY_RE.captures(html) {
        return Ok(caps[1].to_string());
    }

    // Fallback: try the newer pattern
    if let Some(caps) = API_KEY_FALLBACK_RE.captures(html) {
        return Ok(caps[1].to_string());
    }

    if html.contains("g-recaptcha") {
        return Err(CaptionsError::Other("request blocked by YouTube".to_string()));
    }

    Err(CaptionsError::Other(
        "could not extract InnerTube API key from watch page".to_string(),
    ))
}

fn check_playability(status: Option<&PlayabilityStatus>) -> Result<(), CaptionsError> {
    let Some(status) = status else {
        return Ok(());
    };
    let reason = status.reason.as_deref().unwrap_or("");
    match status.status.as_deref() {
        None | Some("OK") => Ok(()),
        Some("ERROR") => Err(CaptionsError::NotFound),
        Some(other) => Err(CaptionsError::Other(format!("video unplayable ({other}): {reason}"))),
    }
}

fn parse_transcript_list(video_id: &VideoId, resp: InnerTubePlayerResponse) -> Result<TranscriptList, CaptionsError> {
    check_playability(resp.playability_status.as_ref())?;

    let renderer = resp
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .ok_or(CaptionsError::NoCaptions)?;

    let tracks: Vec<Track> = renderer
        .caption_tracks
        .unwrap_or_default()
        .into_iter()
        .map(|t| Track {
            name: t.name.and_then(|n| n.text()).unwrap_or_else(|| t.language_code.clone()),
            base_url: t.base_url.replace("&fmt=srv3", ""),
            is_generated: t.kind.as_deref() == Some("asr"),
            is_translatable: t.is_translatable.unwrap_or(false),
            language_code: t.language_code,
        })
        .collect();

    if tracks.is_empty() {
        return Err(CaptionsError::NoCaptions);
    }

    let default_index = renderer
        .audio_tracks
        .as_ref()
        .and_then(|a| a.first())
        .and_then(|a| a.default_caption_track_index)
        .filter(|&i| i < tracks.len())
        .unwrap_or(0);

    let translation_languages = renderer
        .translation_languages
        .unwrap_or_default()
        .into_iter()
        .filter_map(|lang| {
            let name = lang.language_name?.text()?;
            Some(TranslationLanguage {
                name,
                code: lang.language_code,
            })
        })
        .collect();

    let default = &tracks[default_index];
    debug!(
        "Video {video_id}: {} caption tracks, default={} ({}, {})",
        tracks.len(),
        default.language_code,
        default.name,
        if default.is_generated { "auto-generated" } else { "manual" }
    );

    Ok(TranscriptList {
        video_id: video_id.clone(),
        tracks,
        default_index,
        translation_languages,
    })
}

fn parse_caption_xml(xml: &str) -> Result<Vec<Cue>, CaptionsError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut cues = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dur: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut dur = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"start" => {
                            start = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        b"dur" => {
                            dur = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        _ => {}
                    }
                }
                current_start = start;
                // a missing dur means a zero-length cue
                current_dur = dur.or(Some(0.0));
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(start), Some(dur)) = (current_start.take(), current_dur.take()) {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    let text = html_escape::decode_html_entities(&raw_text).to_string();
                    if !text.is_empty() {
                        cues.push(Cue {
                            text,
                            start,
                            duration: dur,
                        });
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                current_start = None;
                current_dur = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CaptionsError::Other(format!("error parsing caption XML: {e}"))),
            _ => {}
        }
    }

    Ok(cues)
}
