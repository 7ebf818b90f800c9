//! Catalog asset types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Tier;

/// File name used when a storage path has no usable last segment
pub const FALLBACK_FILE_NAME: &str = "asset";

/// Unique asset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub Uuid);

impl AssetId {
    /// Create a new random asset ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A downloadable item in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub required_tier: Tier,
    #[serde(default)]
    pub tags: Vec<String>,
    pub storage_object_path: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Preview kind, from the storage path extension
    pub fn media_type(&self) -> MediaType {
        MediaType::from_path(&self.storage_object_path)
    }

    /// Name offered to the browser for a forced download
    pub fn download_file_name(&self) -> &str {
        match self.storage_object_path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => FALLBACK_FILE_NAME,
        }
    }

    /// Case-insensitive exact tag match
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }
}

/// How an asset can be previewed inline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Image,
    /// No inline preview; offered as a link
    File,
}

impl MediaType {
    /// Classify by lowercase file extension
    pub fn from_path(path: &str) -> Self {
        let ext = path
            .rfind('.')
            .map(|idx| path[idx + 1..].to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mp4" | "webm" | "mov" | "m4v" => Self::Video,
            "mp3" | "wav" | "ogg" | "m4a" | "flac" => Self::Audio,
            "jpg" | "jpeg" | "png" | "gif" | "webp" => Self::Image,
            _ => Self::File,
        }
    }
}
