use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::VideoId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Video not found")]
    VideoNotFound,

    #[error("metadata request failed: {0}")]
    Failed(String),
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        MetadataError::Failed(err.to_string())
    }
}

/// Title and thumbnail of a video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub title: String,
    pub thumbnail: String,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_video_info(&self, video_id: &VideoId) -> Result<VideoMeta, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    items: Option<Vec<VideoItem>>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        [self.maxres, self.standard, self.high, self.medium, self.default]
            .into_iter()
            .flatten()
            .map(|t| t.url)
            .next()
    }
}

/// YouTube Data API v3 client
#[derive(Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl DataApiClient {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for DataApiClient {
    async fn fetch_video_info(&self, video_id: &VideoId) -> Result<VideoMeta, MetadataError> {
        debug!("Fetching metadata for {video_id}");

        let resp = self
            .client
            .get(&self.api_url)
            .query(&[("id", video_id.as_str()), ("part", "snippet"), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MetadataError::Failed(format!("YouTube Data API returned {status}: {body}")));
        }

        let list: VideoListResponse = resp.json().await?;
        video_meta_from_response(list)
    }
}

fn video_meta_from_response(list: VideoListResponse) -> Result<VideoMeta, MetadataError> {
    let item = list
        .items
        .and_then(|items| items.into_iter().next())
        .ok_or(MetadataError::VideoNotFound)?;

    let thumbnail = item
        .snippet
        .thumbnails
        .best()
        .ok_or_else(|| MetadataError::Failed("video has no thumbnails".to_string()))?;

    Ok(VideoMeta {
        title: item.snippet.title,
        thumbnail,
    })
}
