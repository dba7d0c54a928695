use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{NewPostRecord, PostId, PostPatch, PostRecord, User};

/// Relational store holding the `posts` table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Newest first. `filter` is a case-insensitive substring match on the title.
    async fn list(&self, filter: Option<&str>) -> Result<Vec<PostRecord>>;
    async fn get(&self, id: &PostId) -> Result<Option<PostRecord>>;
    async fn insert(&self, post: &NewPostRecord) -> Result<PostId>;
    async fn update(&self, id: &PostId, patch: &PostPatch) -> Result<()>;
    async fn delete(&self, id: &PostId) -> Result<()>;
}

/// Public bucket for uploaded images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;
    fn public_url(&self, path: &str) -> Result<Url>;
    async fn remove(&self, paths: &[String]) -> Result<()>;
}

/// Who is signed in, if anyone. Only used to gate admin affordances.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedImage {
    pub url: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetches image bytes for the detail view.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<LoadedImage>;
}
