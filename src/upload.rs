// Two-step upload: create the video, then attach the thumbnail. The steps
// fail independently and a thumbnail failure never undoes the video.

use std::fs::File;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::api::{image_content_type, VideoMetadata, VideoService, VideoSnippet, VideoStatus};
use crate::category::{self, PrivacyStatus};
use crate::error::UploadError;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub video_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Category name as listed in `category::CATEGORIES`.
    pub category: String,
    pub privacy_status: PrivacyStatus,
    /// RFC 3339 instant. `None` or blank publishes immediately.
    pub publish_at: Option<String>,
}

impl UploadRequest {
    /// Body of the creation call. Empty tag lists and blank publish times
    /// are left out of it entirely.
    pub fn metadata(&self) -> Result<VideoMetadata, UploadError> {
        let category_id = category::code_for(&self.category)
            .ok_or_else(|| UploadError::UnknownCategory(self.category.clone()))?;

        let publish_at = match self.publish_at.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => {
                let at = DateTime::parse_from_rfc3339(value).map_err(|source| {
                    UploadError::InvalidPublishAt {
                        value: value.to_string(),
                        source,
                    }
                })?;
                Some(
                    at.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                )
            }
            _ => None,
        };

        Ok(VideoMetadata {
            snippet: VideoSnippet {
                title: self.title.clone(),
                description: self.description.clone(),
                tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
                category_id: category_id.to_string(),
            },
            status: VideoStatus {
                privacy_status: self.privacy_status,
                publish_at,
            },
        })
    }
}

#[derive(Debug)]
pub enum VideoOutcome {
    Created { video_id: String },
    Failed(UploadError),
}

#[derive(Debug)]
pub enum ThumbnailOutcome {
    /// No thumbnail path was given.
    Skipped,
    Failed(UploadError),
    Succeeded,
}

/// Result of both steps. `thumbnail` is `None` when the video step failed
/// and the thumbnail step was never reached.
#[derive(Debug)]
pub struct UploadResult {
    pub video: VideoOutcome,
    pub thumbnail: Option<ThumbnailOutcome>,
}

impl UploadResult {
    pub fn video_id(&self) -> Option<&str> {
        match &self.video {
            VideoOutcome::Created { video_id } => Some(video_id),
            VideoOutcome::Failed(_) => None,
        }
    }

    pub fn video_error(&self) -> Option<&UploadError> {
        match &self.video {
            VideoOutcome::Failed(err) => Some(err),
            VideoOutcome::Created { .. } => None,
        }
    }

    pub fn thumbnail_error(&self) -> Option<&UploadError> {
        match &self.thumbnail {
            Some(ThumbnailOutcome::Failed(err)) => Some(err),
            _ => None,
        }
    }
}

/// Run both steps against `service`.
pub fn upload<S: VideoService + ?Sized>(service: &S, request: &UploadRequest) -> UploadResult {
    let video_id = match upload_video(service, request) {
        Ok(id) => id,
        Err(err) => {
            warn!("Video step failed: {err}");
            return UploadResult {
                video: VideoOutcome::Failed(err),
                thumbnail: None,
            };
        }
    };
    info!("Created video {video_id}");

    let thumbnail = attach_thumbnail(service, request, &video_id);
    UploadResult {
        video: VideoOutcome::Created { video_id },
        thumbnail: Some(thumbnail),
    }
}

fn upload_video<S: VideoService + ?Sized>(
    service: &S,
    request: &UploadRequest,
) -> Result<String, UploadError> {
    let video = File::open(&request.video_path).map_err(|source| UploadError::Open {
        path: request.video_path.clone(),
        source,
    })?;
    let metadata = request.metadata()?;

    info!(
        "Uploading {} as \"{}\" ({})",
        request.video_path.display(),
        request.title,
        request.privacy_status
    );
    Ok(service.create_video(&metadata, video)?)
}

fn attach_thumbnail<S: VideoService + ?Sized>(
    service: &S,
    request: &UploadRequest,
    video_id: &str,
) -> ThumbnailOutcome {
    let Some(path) = request.thumbnail_path.as_ref() else {
        return ThumbnailOutcome::Skipped;
    };

    let thumbnail = match File::open(path) {
        Ok(file) => file,
        Err(source) => {
            let err = UploadError::Open {
                path: path.clone(),
                source,
            };
            warn!("Thumbnail step failed: {err}");
            return ThumbnailOutcome::Failed(err);
        }
    };

    match service.set_thumbnail(video_id, thumbnail, image_content_type(path)) {
        Ok(()) => {
            info!("Thumbnail {} attached to {video_id}", path.display());
            ThumbnailOutcome::Succeeded
        }
        Err(err) => {
            warn!("Thumbnail step failed: {err}");
            ThumbnailOutcome::Failed(err.into())
        }
    }
}
