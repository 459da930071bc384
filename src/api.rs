// Remote video service: the capability surface the rest of the crate
// depends on, and a small blocking HTTP client for the YouTube Data API
// that implements it.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use chrono::Utc;
use reqwest::blocking::{Body, Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::VideoSummary;
use crate::category::PrivacyStatus;
use crate::client::AuthenticatedHandle;
use crate::error::ServiceError;

/// Operations ytup needs from the remote service.
pub trait VideoService {
    /// Most recent uploads of the authenticated user, newest first.
    fn list_recent_uploads(&self, max_results: u32) -> Result<Vec<VideoSummary>, ServiceError>;

    /// Tags and category id of one video. `ServiceError::NotFound` when
    /// the service has no such video.
    fn video_fields(&self, video_id: &str) -> Result<VideoFields, ServiceError>;

    /// Create a video and return its remote id.
    fn create_video(&self, metadata: &VideoMetadata, video: File) -> Result<String, ServiceError>;

    fn set_thumbnail(
        &self,
        video_id: &str,
        thumbnail: File,
        content_type: &str,
    ) -> Result<(), ServiceError>;
}

/// Fields not included in the search listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoFields {
    pub tags: Vec<String>,
    pub category_id: Option<String>,
}

/// Body of the video creation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    /// The API answers 400 to an empty tag list, so it is left out instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: PrivacyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
}

/// Content type for a thumbnail upload, picked from the file extension.
pub fn image_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[derive(Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: Option<ResourceId>,
    snippet: Option<SearchSnippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Deserialize)]
struct VideoResource {
    snippet: Option<ResourceSnippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSnippet {
    #[serde(default)]
    tags: Vec<String>,
    category_id: Option<String>,
}

#[derive(Deserialize)]
struct InsertResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// `VideoService` over HTTP, authenticated with the session handle.
pub struct YouTubeApi {
    client: Client,
    handle: AuthenticatedHandle,
}

impl YouTubeApi {
    pub fn new(handle: AuthenticatedHandle) -> Result<Self, ServiceError> {
        let client = Client::builder().build()?;
        Ok(YouTubeApi { client, handle })
    }

    fn data_url(&self, resource: &str) -> String {
        format!("{}/youtube/v3/{}", self.handle.api_base_url(), resource)
    }

    fn upload_url(&self, resource: &str) -> String {
        format!("{}/upload/youtube/v3/{}", self.handle.api_base_url(), resource)
    }

    /// Pass successful responses through and turn the rest into
    /// `ServiceError`s carrying the remote message.
    fn check(res: Response) -> Result<Response, ServiceError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let txt = res.text().unwrap_or_default();
        Err(remote_error(status, &txt))
    }
}

fn remote_error(status: StatusCode, body: &str) -> ServiceError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    if status == StatusCode::UNAUTHORIZED {
        ServiceError::Unauthorized(message)
    } else {
        ServiceError::Remote {
            status: status.as_u16(),
            message,
        }
    }
}

/// Leading and trailing parts of a `multipart/related` body that wraps the
/// JSON metadata and the raw media.
fn related_parts(metadata: &VideoMetadata, boundary: &str) -> Result<(String, String), ServiceError> {
    let json = serde_json::to_string(metadata)?;
    let head = format!(
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n\
         --{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n"
    );
    let tail = format!("\r\n--{boundary}--\r\n");
    Ok((head, tail))
}

impl VideoService for YouTubeApi {
    fn list_recent_uploads(&self, max_results: u32) -> Result<Vec<VideoSummary>, ServiceError> {
        let max_results = max_results.to_string();
        let res = self
            .client
            .get(self.data_url("search"))
            .bearer_auth(self.handle.access_token())
            .query(&[
                ("part", "snippet"),
                ("forMine", "true"),
                ("maxResults", max_results.as_str()),
                ("order", "date"),
                ("type", "video"),
            ])
            .send()?;

        let listing: SearchListResponse = Self::check(res)?.json()?;
        let videos: Vec<VideoSummary> = listing
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id?.video_id?;
                let snippet = item.snippet?;
                Some(VideoSummary {
                    title: snippet.title,
                    description: snippet.description,
                    video_id,
                })
            })
            .collect();
        debug!("Listed {} recent uploads", videos.len());
        Ok(videos)
    }

    fn video_fields(&self, video_id: &str) -> Result<VideoFields, ServiceError> {
        let res = self
            .client
            .get(self.data_url("videos"))
            .bearer_auth(self.handle.access_token())
            .query(&[("part", "snippet"), ("id", video_id)])
            .send()?;

        let listing: VideoListResponse = Self::check(res)?.json()?;
        let video = listing
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(video_id.to_string()))?;
        Ok(video.snippet.map_or_else(VideoFields::default, |s| VideoFields {
            tags: s.tags,
            category_id: s.category_id,
        }))
    }

    fn create_video(&self, metadata: &VideoMetadata, video: File) -> Result<String, ServiceError> {
        let boundary = format!("ytup-{}", Utc::now().timestamp_millis());
        let (head, tail) = related_parts(metadata, &boundary)?;
        let length = head.len() as u64 + video.metadata()?.len() + tail.len() as u64;
        let reader = Cursor::new(head.into_bytes())
            .chain(video)
            .chain(Cursor::new(tail.into_bytes()));

        let res = self
            .client
            .post(self.upload_url("videos"))
            .bearer_auth(self.handle.access_token())
            .query(&[("uploadType", "multipart"), ("part", "snippet,status")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(Body::sized(reader, length))
            .send()?;

        let created: InsertResponse = Self::check(res)?.json()?;
        Ok(created.id)
    }

    fn set_thumbnail(
        &self,
        video_id: &str,
        thumbnail: File,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let res = self
            .client
            .post(self.upload_url("thumbnails/set"))
            .bearer_auth(self.handle.access_token())
            .query(&[("videoId", video_id), ("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(Body::from(thumbnail))
            .send()?;

        Self::check(res)?;
        Ok(())
    }
}
