use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::transcript::{LanguageTranscriptResponse, TranscriptResponse};
use crate::{DEFAULT_LANGUAGE, TranscriptSegment, VideoInfo};

const GENERIC_FAILURE: &str = "Failed to fetch transcript";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server answered with an error body
    #[error("{message}")]
    Server { status: u16, message: String },

    /// No usable response at all
    #[error("Failed to fetch transcript")]
    Network(String),

    /// A success status whose body is not a transcript response
    #[error("Unexpected response from server")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the transcript API
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: url::Url,
}

impl ApiClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> eyre::Result<Self> {
        let base_url = url::Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            eyre::bail!("server URL cannot be used as a base: {base_url}");
        }
        Ok(Self { client, base_url })
    }

    /// `{base}/api/transcript[/{language}]` with the language percent-encoded
    fn endpoint(&self, language: Option<&str>) -> url::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("api").push("transcript");
            if let Some(language) = language {
                segments.push(language);
            }
        }
        url
    }

    async fn post<T: DeserializeOwned>(&self, url: url::Url, video_url: &str) -> Result<T, ClientError> {
        debug!("POST {url}");
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({ "url": video_url }))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        resp.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    pub async fn get_transcript(&self, video_url: &str) -> Result<TranscriptResponse, ClientError> {
        self.post(self.endpoint(None), video_url).await
    }

    /// Ask for a translated transcript using the canonical watch URL of `video_id`
    pub async fn get_transcript_in_language(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<LanguageTranscriptResponse, ClientError> {
        let video_url = format!("https://www.youtube.com/watch?v={video_id}");
        self.post(self.endpoint(Some(language)), &video_url).await
    }
}

/// Everything the viewer renders from
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub is_loading: bool,
    pub error: Option<String>,
    pub transcript: Option<Vec<TranscriptSegment>>,
    pub video_info: Option<VideoInfo>,
    pub selected_language: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            is_loading: false,
            error: None,
            transcript: None,
            video_info: None,
            selected_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Identifies one in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Owns the view state and applies fetch results to it
///
/// Every request takes a ticket from a generation counter. A result whose
/// ticket is older than the latest one is dropped, so the last submitted
/// request wins no matter which response arrives last.
#[derive(Debug, Default)]
pub struct Controller {
    state: ViewState,
    generation: u64,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    fn next_ticket(&mut self) -> Ticket {
        self.generation += 1;
        Ticket(self.generation)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }

    pub fn begin_submit(&mut self) -> Ticket {
        self.state.is_loading = true;
        self.state.error = None;
        self.state.transcript = None;
        self.next_ticket()
    }

    /// Apply a default-transcript result; false when the ticket is stale
    pub fn finish_submit(&mut self, ticket: Ticket, result: Result<TranscriptResponse, ClientError>) -> bool {
        if !self.is_current(ticket) {
            debug!("Dropping stale submit result {ticket:?}");
            return false;
        }
        self.state.is_loading = false;
        match result {
            Ok(resp) => {
                self.state.transcript = Some(resp.transcript);
                self.state.video_info = Some(resp.video_info);
                self.state.selected_language = DEFAULT_LANGUAGE.to_string();
            }
            Err(err) => {
                self.state.error = Some(err.to_string());
                self.state.transcript = None;
                self.state.video_info = None;
            }
        }
        true
    }

    /// Start a language change; `None` until a video has loaded
    pub fn begin_language_change(&mut self) -> Option<Ticket> {
        self.state.video_info.as_ref()?;
        self.state.is_loading = true;
        self.state.error = None;
        Some(self.next_ticket())
    }

    /// Apply a translated-transcript result; false when the ticket is stale
    pub fn finish_language_change(
        &mut self,
        ticket: Ticket,
        language: &str,
        result: Result<LanguageTranscriptResponse, ClientError>,
    ) -> bool {
        if !self.is_current(ticket) {
            debug!("Dropping stale language result {ticket:?}");
            return false;
        }
        self.state.is_loading = false;
        match result {
            Ok(resp) => {
                self.state.transcript = Some(resp.transcript);
                self.state.selected_language = language.to_string();
            }
            Err(err) => {
                debug!("Language change to {language} failed: {err}");
                self.state.error = Some(format!("Failed to load transcript in {language}"));
            }
        }
        true
    }
}

/// An `ApiClient` driving a `Controller`
pub struct Session {
    api: ApiClient,
    controller: Controller,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            controller: Controller::new(),
        }
    }

    pub fn state(&self) -> &ViewState {
        self.controller.state()
    }

    pub async fn submit(&mut self, video_url: &str) -> &ViewState {
        let ticket = self.controller.begin_submit();
        let result = self.api.get_transcript(video_url).await;
        self.controller.finish_submit(ticket, result);
        self.controller.state()
    }

    pub async fn change_language(&mut self, language: &str) -> &ViewState {
        let Some(video_id) = self.controller.state().video_info.as_ref().map(|v| v.id.clone()) else {
            return self.controller.state();
        };
        if let Some(ticket) = self.controller.begin_language_change() {
            let result = self.api.get_transcript_in_language(&video_id, language).await;
            self.controller.finish_language_change(ticket, language, result);
        }
        self.controller.state()
    }
}
