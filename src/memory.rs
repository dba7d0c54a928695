//! In-process record store, for embedding and tests.

use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::storage::RecordStore;
use crate::types::{NewPostRecord, PostId, PostPatch, PostRecord};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<PostRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seed with records as-is (ids and timestamps included).
    pub fn with_records(records: Vec<PostRecord>) -> Self {
        Self { rows: Mutex::new(records) }
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, Vec<PostRecord>>> {
        self.rows.lock().map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, filter: Option<&str>) -> Result<Vec<PostRecord>> {
        let needle = filter.map(str::to_lowercase);
        let mut out: Vec<PostRecord> = self
            .rows()?
            .iter()
            .filter(|r| match &needle {
                Some(n) => r.title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get(&self, id: &PostId) -> Result<Option<PostRecord>> {
        Ok(self.rows()?.iter().find(|r| &r.id == id).cloned())
    }

    async fn insert(&self, post: &NewPostRecord) -> Result<PostId> {
        let id = PostId(uuid::Uuid::new_v4().to_string());
        self.rows()?.push(PostRecord {
            id: id.clone(),
            title: post.title.clone(),
            content: post.content.clone(),
            thumbnail_url: post.thumbnail_url.clone(),
            image_url: post.image_url.clone(),
            created_at: Utc::now(),
            updated_at: None,
            views: None,
        });
        Ok(id)
    }

    async fn update(&self, id: &PostId, patch: &PostPatch) -> Result<()> {
        let mut rows = self.rows()?;
        let Some(row) = rows.iter_mut().find(|r| &r.id == id) else {
            bail!("post {id} not found");
        };
        if let Some(title) = &patch.title { row.title = title.clone(); }
        if let Some(content) = &patch.content { row.content = content.clone(); }
        if let Some(thumb) = &patch.thumbnail_url { row.thumbnail_url = thumb.clone(); }
        if let Some(images) = &patch.image_url { row.image_url = images.clone(); }
        if let Some(views) = patch.views { row.views = Some(views); }
        if let Some(ts) = patch.updated_at { row.updated_at = Some(ts); }
        Ok(())
    }

    async fn delete(&self, id: &PostId) -> Result<()> {
        self.rows()?.retain(|r| &r.id != id);
        Ok(())
    }
}
