use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use eyre::{Result, WrapErr};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::signal;

use crate::captions::{CaptionSource, InnerTubeClient};
use crate::config::{RateLimitSettings, ServerSettings};
use crate::error::{ApiError, ApiResult};
use crate::metadata::{DataApiClient, MetadataSource};
use crate::transcript::{self, LanguageTranscriptResponse, TranscriptResponse};
use crate::{VideoId, extract_video_id};

#[derive(Clone)]
pub struct AppState {
    pub captions: Arc<dyn CaptionSource>,
    pub metadata: Arc<dyn MetadataSource>,
    pub limiter: Arc<RateLimiter>,
}

#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    url: String,
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by caller address
pub struct RateLimiter {
    settings: RateLimitSettings,
    windows: Mutex<HashMap<Option<IpAddr>, Window>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request; false once the caller is over the cap
    pub fn check(&self, caller: Option<IpAddr>) -> bool {
        self.check_at(caller, Instant::now())
    }

    fn check_at(&self, caller: Option<IpAddr>, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        windows.retain(|_, w| now.duration_since(w.started) < self.settings.window);

        let window = windows.entry(caller).or_insert(Window { started: now, count: 0 });
        if window.count >= self.settings.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/transcript", post(get_transcript))
        .route("/api/transcript/{language}", post(get_transcript_in_language))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

/// Bind and run the API server until Ctrl+C
pub async fn serve(settings: ServerSettings) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .build()
        .wrap_err("building HTTP client")?;

    let state = AppState {
        captions: Arc::new(InnerTubeClient::new(client.clone())),
        metadata: Arc::new(DataApiClient::new(client, settings.metadata_api_url, settings.api_key)),
        limiter: Arc::new(RateLimiter::new(settings.rate_limit)),
    };

    let addr = settings.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    info!("API server listening on http://{addr}");
    println!("Server running at http://{addr}");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .wrap_err("running API server")?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {err}");
    }
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let caller = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !state.limiter.check(caller) {
        warn!("Rate limit exceeded for {caller:?}");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

async fn fallback(req: Request) -> ApiError {
    warn!("No route for {} {}", req.method(), req.uri().path());
    ApiError::EndpointNotFound
}

fn parse_request(body: &[u8]) -> ApiResult<VideoId> {
    let request: TranscriptRequest = serde_json::from_slice(body).map_err(|_| ApiError::InvalidRequestFormat)?;
    if request.url.is_empty() || url::Url::parse(&request.url).is_err() {
        return Err(ApiError::InvalidRequestFormat);
    }
    extract_video_id(&request.url).ok_or(ApiError::InvalidUrl)
}

fn log_outcome<T>(route: &str, result: &ApiResult<T>) {
    if let Err(err) = result {
        let status = err.status();
        if status.is_server_error() {
            error!("{route} -> {status}: {err}");
        } else {
            warn!("{route} -> {status}: {err}");
        }
    }
}

/// Run a transcript pipeline on its own task; a panic inside it becomes a 500
async fn run_pipeline<T, F>(pipeline: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: Future<Output = ApiResult<T>> + Send + 'static,
{
    tokio::spawn(pipeline).await.unwrap_or_else(|err| {
        error!("Transcript pipeline aborted: {err}");
        Err(ApiError::InternalFailure)
    })
}

async fn get_transcript(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<TranscriptResponse>> {
    let result: ApiResult<_> = async {
        let video_id = parse_request(&body)?;
        let (captions, metadata, id) = (state.captions.clone(), state.metadata.clone(), video_id.clone());
        let resp =
            run_pipeline(async move { transcript::default_transcript(captions.as_ref(), metadata.as_ref(), &id).await })
                .await?;
        info!(
            "Transcript for {video_id}: {} segments, {} languages",
            resp.transcript.len(),
            resp.video_info.available_languages.len()
        );
        Ok(Json(resp))
    }
    .await;

    log_outcome("POST /api/transcript", &result);
    result
}

async fn get_transcript_in_language(
    State(state): State<AppState>,
    Path(language): Path<String>,
    body: Bytes,
) -> ApiResult<Json<LanguageTranscriptResponse>> {
    let result: ApiResult<_> = async {
        let video_id = parse_request(&body)?;
        let (captions, id, lang) = (state.captions.clone(), video_id.clone(), language.clone());
        let resp =
            run_pipeline(async move { transcript::transcript_in_language(captions.as_ref(), &id, &lang).await }).await?;
        info!("Transcript for {video_id} in {language}: {} segments", resp.transcript.len());
        Ok(Json(resp))
    }
    .await;

    log_outcome(&format!("POST /api/transcript/{language}"), &result);
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;

    use async_trait::async_trait;

    use super::*;
    use crate::Cue;
    use crate::captions::{CaptionsError, Track, TranscriptList};
    use crate::client::{ApiClient, ClientError, Session};
    use crate::metadata::MetadataError;
    use crate::transcript::tests::{FakeCaptions, FakeMetadata};

    struct PanickingCaptions;

    #[async_trait]
    impl CaptionSource for PanickingCaptions {
        async fn list_transcripts(&self, _video_id: &VideoId) -> Result<TranscriptList, CaptionsError> {
            panic!("caption source blew up");
        }

        async fn fetch(&self, _track: &Track) -> Result<Vec<Cue>, CaptionsError> {
            panic!("caption source blew up");
        }

        async fn translate(&self, _track: &Track, _language_code: &str) -> Result<Vec<Cue>, CaptionsError> {
            panic!("caption source blew up");
        }
    }

    /// Serve `state` on an ephemeral port, returning its base URL
    async fn spawn_server(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state).into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    fn state_with(captions: FakeCaptions, metadata: FakeMetadata) -> AppState {
        AppState {
            captions: Arc::new(captions),
            metadata: Arc::new(metadata),
            limiter: Arc::new(RateLimiter::new(RateLimitSettings {
                window: Duration::from_secs(60),
                max_requests: 100,
            })),
        }
    }

    fn state() -> AppState {
        state_with(FakeCaptions::default(), FakeMetadata::default())
    }

    fn body(json: serde_json::Value) -> Bytes {
        Bytes::from(json.to_string())
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_parse_request() {
        let id = parse_request(br#"{"url": "https://youtu.be/abcdEFGH12J"}"#).unwrap();
        assert_eq!(id.as_str(), "abcdEFGH12J");
    }

    #[test]
    fn test_parse_request_rejects_malformed_bodies() {
        let bodies: [&[u8]; 5] = [
            b"{}",
            b"not json",
            br#"{"url": ""}"#,
            br#"{"url": 42}"#,
            br#"{"url": "youtube.com/watch?v=abcdEFGH12J"}"#,
        ];
        for raw in bodies {
            assert_eq!(parse_request(raw).unwrap_err(), ApiError::InvalidRequestFormat);
        }
    }

    #[test]
    fn test_parse_request_unrecognized_url() {
        let err = parse_request(br#"{"url": "https://example.com/video/1"}"#).unwrap_err();
        assert_eq!(err, ApiError::InvalidUrl);
    }

    #[tokio::test]
    async fn test_default_endpoint_success() {
        let Json(resp) = get_transcript(
            State(state()),
            body(serde_json::json!({"url": "https://www.youtube.com/watch?v=abcdEFGH12J"})),
        )
        .await
        .unwrap();

        assert_eq!(resp.transcript.len(), 2);
        assert_eq!(resp.transcript[1].end_time, 3.5);
        assert_eq!(resp.video_info.available_languages[0], "English");

        let wire = serde_json::to_value(&resp).unwrap();
        assert!(wire.get("videoInfo").is_some());
        assert!(wire["videoInfo"].get("availableLanguages").is_some());
    }

    #[tokio::test]
    async fn test_empty_body_rejected_by_both_endpoints() {
        let err = get_transcript(State(state()), body(serde_json::json!({}))).await.unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "Invalid request format"}));

        let err = get_transcript_in_language(
            State(state()),
            Path("Spanish".to_string()),
            body(serde_json::json!({})),
        )
        .await
        .unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "Invalid request format"}));
    }

    #[tokio::test]
    async fn test_metadata_not_found_is_404() {
        let state = state_with(
            FakeCaptions::default(),
            FakeMetadata {
                result: Err(MetadataError::VideoNotFound),
            },
        );
        let err = get_transcript(
            State(state),
            body(serde_json::json!({"url": "https://www.youtube.com/watch?v=abcdEFGH12J"})),
        )
        .await
        .unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, serde_json::json!({"error": "Video not found"}));
    }

    #[tokio::test]
    async fn test_no_captions_is_404_on_both_endpoints() {
        let make = || {
            state_with(
                FakeCaptions {
                    list_error: Some(CaptionsError::NoCaptions),
                    ..Default::default()
                },
                FakeMetadata::default(),
            )
        };
        let url = serde_json::json!({"url": "https://youtu.be/abcdEFGH12J"});

        let err = get_transcript(State(make()), body(url.clone())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = get_transcript_in_language(State(make()), Path("French".to_string()), body(url))
            .await
            .unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, serde_json::json!({"error": "No captions available for this video"}));
    }

    #[tokio::test]
    async fn test_language_endpoint() {
        let url = serde_json::json!({"url": "https://www.youtube.com/watch?v=abcdEFGH12J"});

        let Json(resp) = get_transcript_in_language(State(state()), Path("French".to_string()), body(url.clone()))
            .await
            .unwrap();
        assert!(resp.transcript.iter().all(|s| s.language == "French"));

        let err = get_transcript_in_language(State(state()), Path("Klingon".to_string()), body(url))
            .await
            .unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "Language not available"}));
    }

    #[tokio::test]
    async fn test_language_endpoint_invalid_url() {
        let err = get_transcript_in_language(
            State(state()),
            Path("English".to_string()),
            body(serde_json::json!({"url": "https://vimeo.com/1"})),
        )
        .await
        .unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "Invalid YouTube URL"}));
    }

    #[test]
    fn test_rate_limiter_caps_per_caller() {
        let limiter = RateLimiter::new(RateLimitSettings {
            window: Duration::from_secs(60),
            max_requests: 2,
        });
        let alice: Option<IpAddr> = Some("10.0.0.1".parse().unwrap());
        let bob: Option<IpAddr> = Some("10.0.0.2".parse().unwrap());
        let now = Instant::now();

        assert!(limiter.check_at(alice, now));
        assert!(limiter.check_at(alice, now));
        assert!(!limiter.check_at(alice, now));
        assert!(limiter.check_at(bob, now));
    }

    #[test]
    fn test_rate_limiter_window_resets() {
        let limiter = RateLimiter::new(RateLimitSettings {
            window: Duration::from_secs(60),
            max_requests: 1,
        });
        let now = Instant::now();
        assert!(limiter.check_at(None, now));
        assert!(!limiter.check_at(None, now + Duration::from_secs(30)));
        assert!(limiter.check_at(None, now + Duration::from_secs(61)));
    }

    #[tokio::test]
    async fn test_pipeline_panic_is_internal_failure() {
        let state = AppState {
            captions: Arc::new(PanickingCaptions),
            ..state()
        };
        let url = serde_json::json!({"url": "https://youtu.be/abcdEFGH12J"});

        let err = get_transcript(State(state.clone()), body(url.clone())).await.unwrap_err();
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, serde_json::json!({"error": "Internal server error"}));

        let err = get_transcript_in_language(State(state), Path("Spanish".to_string()), body(url))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InternalFailure);
    }

    #[tokio::test]
    async fn test_router_serves_session() {
        let captions = FakeCaptions {
            translations: vec![("Spanish", "es"), ("Chinese (Traditional)", "zh-Hant")],
            ..Default::default()
        };
        let base = spawn_server(state_with(captions, FakeMetadata::default())).await;
        let mut session = Session::new(ApiClient::new(reqwest::Client::new(), &base).unwrap());

        let state = session.submit("https://www.youtube.com/watch?v=abcdEFGH12J").await;
        assert!(state.error.is_none());
        assert_eq!(
            state.video_info.as_ref().unwrap().available_languages,
            vec!["English", "Spanish", "Chinese (Traditional)"]
        );

        let state = session.change_language("Chinese (Traditional)").await;
        assert!(state.error.is_none());
        assert_eq!(state.selected_language, "Chinese (Traditional)");
        let transcript = state.transcript.as_ref().unwrap();
        assert!(transcript.iter().all(|s| s.language == "Chinese (Traditional)"));
        assert_eq!(transcript[0].text, "[zh-Hant] Hi");

        let state = session.submit("https://vimeo.com/1").await;
        assert_eq!(state.error.as_deref(), Some("Invalid YouTube URL"));
        assert!(state.video_info.is_none());
    }

    #[tokio::test]
    async fn test_router_unknown_endpoint() {
        let base = spawn_server(state()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/nope"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json, serde_json::json!({"error": "endpoint not found"}));
    }

    #[tokio::test]
    async fn test_router_rate_limits_caller() {
        let state = AppState {
            limiter: Arc::new(RateLimiter::new(RateLimitSettings {
                window: Duration::from_secs(60),
                max_requests: 1,
            })),
            ..state()
        };
        let base = spawn_server(state).await;
        let api = ApiClient::new(reqwest::Client::new(), &base).unwrap();
        let url = "https://youtu.be/abcdEFGH12J";

        assert!(api.get_transcript(url).await.is_ok());
        let err = api.get_transcript(url).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Server {
                status: 429,
                message: "Too many requests, please try again later.".to_string(),
            }
        );
    }
}
