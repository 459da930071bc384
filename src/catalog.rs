// Local snapshot of the user's latest uploads, used to prefill the
// metadata of a new upload.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::VideoService;
use crate::category;
use crate::error::{CatalogError, ServiceError};
use crate::store;

/// How many uploads a refresh asks for.
pub const RECENT_UPLOADS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub title: String,
    pub description: String,
    pub video_id: String,
}

impl std::fmt::Display for VideoSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Fields of a previous upload that the listing does not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoExtras {
    pub tags: Vec<String>,
    pub category: &'static str,
}

pub struct VideoCatalogCache<'a, S: ?Sized> {
    path: PathBuf,
    service: &'a S,
}

impl<'a, S: VideoService + ?Sized> VideoCatalogCache<'a, S> {
    pub fn new(path: impl Into<PathBuf>, service: &'a S) -> Self {
        VideoCatalogCache {
            path: path.into(),
            service,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// With `use_cache` the local file is decoded (an empty or missing file
    /// is an empty list); otherwise the remote listing replaces the file.
    pub fn list(&self, use_cache: bool) -> Result<Vec<VideoSummary>, CatalogError> {
        if use_cache {
            return self.read_cached();
        }

        let videos = self.service.list_recent_uploads(RECENT_UPLOADS)?;
        store::write_json(&self.path, &videos)?;
        info!(
            "Cached {} recent uploads in {}",
            videos.len(),
            self.path.display()
        );
        Ok(videos)
    }

    fn read_cached(&self) -> Result<Vec<VideoSummary>, CatalogError> {
        store::touch(&self.path)?;
        let data = store::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let videos: Vec<VideoSummary> = store::read_json(&self.path)?;
        info!("Read {} uploads from {}", videos.len(), self.path.display());
        Ok(videos)
    }

    /// Tags and category name of `video_id`. Category ids the table does
    /// not know map to its first entry.
    pub fn fetch_extras(&self, video_id: &str) -> Result<VideoExtras, ServiceError> {
        let fields = self.service.video_fields(video_id)?;
        let category = fields
            .category_id
            .as_deref()
            .map_or(category::CATEGORIES[0].0, category::name_for_id_or_default);
        Ok(VideoExtras {
            tags: fields.tags,
            category,
        })
    }
}
