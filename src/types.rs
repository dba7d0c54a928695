use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque post identifier assigned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for PostId {
    fn from(s: String) -> Self { Self(s) }
}

/// Stored shape of the detail-image field.
///
/// Older rows hold a bare URL, newer rows a JSON-encoded array, and JSON-speaking stores
/// may hand back a native array. `images::normalize` is the only place that looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    List(Vec<String>),
    Text(String),
}

/// A post as the record store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub views: Option<i64>,
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPostRecord {
    pub title: String,
    pub content: String,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<ImageRef>,
}

/// Partial update. `None` leaves a column alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub thumbnail_url: Option<Option<String>>,
    pub image_url: Option<Option<ImageRef>>,
    pub views: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostPatch {
    pub fn views(count: u64) -> Self {
        Self { views: Some(i64::try_from(count).unwrap_or(i64::MAX)), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.thumbnail_url.is_none()
            && self.image_url.is_none()
            && self.views.is_none()
            && self.updated_at.is_none()
    }
}

/// Canonical post used everywhere past the storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub thumbnail_url: Option<String>,
    /// Detail images in display order; uploads cap this at three.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub views: Option<u64>,
}

impl Post {
    /// Image shown on the listing card: the thumbnail, else the first detail image.
    pub fn card_thumbnail(&self) -> Option<&str> {
        self.thumbnail_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.images.first().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
}

/// One file picked in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// What the editor submits for a new post or an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub thumbnail: Option<Upload>,
    pub images: Vec<Upload>,
}
