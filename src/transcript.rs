use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::captions::{CaptionSource, CaptionsError};
use crate::error::{ApiError, ApiResult};
use crate::metadata::{MetadataError, MetadataSource};
use crate::{DEFAULT_LANGUAGE, DEFAULT_LANGUAGE_CODE, TranscriptSegment, VideoId, VideoInfo, is_default_language};

/// Body of a successful `POST /api/transcript`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub transcript: Vec<TranscriptSegment>,
    pub video_info: VideoInfo,
}

/// Body of a successful `POST /api/transcript/{language}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageTranscriptResponse {
    pub transcript: Vec<TranscriptSegment>,
}

/// Normalized segments plus the translation targets of the default track
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTranscript {
    pub segments: Vec<TranscriptSegment>,
    pub translation_languages: Vec<String>,
}

fn captions_error(video_id: &VideoId, err: CaptionsError, translated: bool) -> ApiError {
    warn!("Captions for {video_id} failed: {err}");
    match err {
        CaptionsError::NotFound => ApiError::VideoNotFound,
        CaptionsError::NoCaptions => ApiError::NoCaptionsAvailable,
        CaptionsError::Other(_) => ApiError::TranscriptFetchFailed { translated },
    }
}

fn metadata_error(video_id: &VideoId, err: MetadataError) -> ApiError {
    warn!("Metadata for {video_id} failed: {err}");
    match err {
        MetadataError::VideoNotFound => ApiError::VideoNotFound,
        MetadataError::Failed(_) => ApiError::MetadataFetchFailed,
    }
}

/// Fetch a video's transcript, translated when a non-English language is named
///
/// `None` returns the default track tagged `en`. A name equal to "English" in
/// any case also returns the default track, tagged `English`. Any other name
/// must match one of the translation languages exactly.
pub async fn fetch_transcript(
    source: &dyn CaptionSource,
    video_id: &VideoId,
    language: Option<&str>,
) -> ApiResult<FetchedTranscript> {
    let translated = language.is_some();
    let fail = |err| captions_error(video_id, err, translated);

    let list = source.list_transcripts(video_id).await.map_err(fail)?;
    let track = list.default_track().map_err(fail)?;

    let (cues, tag) = match language {
        None => (source.fetch(track).await.map_err(fail)?, DEFAULT_LANGUAGE_CODE),
        Some(name) if is_default_language(name) => (source.fetch(track).await.map_err(fail)?, DEFAULT_LANGUAGE),
        Some(name) => {
            let code = list.translation_code(name).ok_or_else(|| {
                warn!("Language {name:?} not available for {video_id}");
                ApiError::LanguageUnavailable
            })?;
            debug!("Translating {} from {} to {code}", list.video_id, track.language_code);
            (source.translate(track, code).await.map_err(fail)?, name)
        }
    };

    let segments = cues
        .into_iter()
        .enumerate()
        .map(|(index, cue)| TranscriptSegment::from_cue(index, cue, tag))
        .collect();

    Ok(FetchedTranscript {
        segments,
        translation_languages: list.translation_names().map(str::to_string).collect(),
    })
}

/// "English" followed by the translation targets, English listed once
pub fn available_languages(translation_languages: &[String]) -> Vec<String> {
    std::iter::once(DEFAULT_LANGUAGE.to_string())
        .chain(
            translation_languages
                .iter()
                .filter(|name| !is_default_language(name))
                .cloned(),
        )
        .collect()
}

/// Default transcript plus video info; both lookups run concurrently
pub async fn default_transcript(
    captions: &dyn CaptionSource,
    metadata: &dyn MetadataSource,
    video_id: &VideoId,
) -> ApiResult<TranscriptResponse> {
    let (transcript, meta) = tokio::join!(
        fetch_transcript(captions, video_id, None),
        metadata.fetch_video_info(video_id)
    );

    // transcript failures take precedence when both fail
    let transcript = transcript?;
    let meta = meta.map_err(|err| metadata_error(video_id, err))?;

    Ok(TranscriptResponse {
        video_info: VideoInfo {
            id: video_id.to_string(),
            title: meta.title,
            thumbnail: meta.thumbnail,
            available_languages: available_languages(&transcript.translation_languages),
        },
        transcript: transcript.segments,
    })
}

/// Transcript in the named language; video info is not fetched again
pub async fn transcript_in_language(
    captions: &dyn CaptionSource,
    video_id: &VideoId,
    language: &str,
) -> ApiResult<LanguageTranscriptResponse> {
    let transcript = fetch_transcript(captions, video_id, Some(language)).await?;
    Ok(LanguageTranscriptResponse {
        transcript: transcript.segments,
    })
}
