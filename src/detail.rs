//! Opening a single post: loading signal, cache-or-fetch, view counting, images.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::cache::PostCache;
use crate::error::{BoardError, BoardResult};
use crate::mapping::post_from_record;
use crate::storage::{ImageLoader, LoadedImage, RecordStore};
use crate::types::{Post, PostId, PostPatch};

/// How detail images reach the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStrategy {
    /// Load every image, then show them all at once.
    #[default]
    Preload,
    /// Show placeholders at once and fill each one as its image arrives.
    Progressive,
}

impl FromStr for ImageStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preload" => Ok(Self::Preload),
            "progressive" => Ok(Self::Progressive),
            other => Err(anyhow!("unknown image strategy `{other}` (expected preload or progressive)")),
        }
    }
}

/// Public board pages count views; the admin page does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Board,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Loaded(LoadedImage),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlot {
    pub index: usize,
    pub url: String,
    pub outcome: ImageOutcome,
}

impl ImageSlot {
    pub fn is_loaded(&self) -> bool { matches!(self.outcome, ImageOutcome::Loaded(_)) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub post: Post,
    /// One slot per normalized image URL, in display order.
    pub images: Vec<ImageSlot>,
    /// Only signed-in users see the view counter.
    pub show_views: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailEvent {
    Loading { id: PostId },
    /// Record resolved; images may still be loading.
    Resolved(Post),
    ImagePending { index: usize, url: String },
    ImageSettled(ImageSlot),
    Ready(DetailView),
    Failed { id: PostId, notice: String },
}

pub type DetailEvents = UnboundedSender<DetailEvent>;

fn emit(events: &DetailEvents, event: DetailEvent) {
    // a dropped receiver just means nobody is watching
    let _ = events.send(event);
}

pub struct DetailLoader {
    images: Arc<dyn ImageLoader>,
    strategy: ImageStrategy,
}

impl DetailLoader {
    pub fn new(images: Arc<dyn ImageLoader>, strategy: ImageStrategy) -> Self {
        Self { images, strategy }
    }

    pub fn strategy(&self) -> ImageStrategy { self.strategy }

    pub fn set_strategy(&mut self, strategy: ImageStrategy) { self.strategy = strategy; }

    /// Resolve `id` for display.
    ///
    /// The cache is consulted before the record store. In `ViewMode::Board` the view
    /// counter is bumped with a plain read-then-write, so two concurrent openers can
    /// lose one increment.
    pub async fn load(
        &self,
        records: &dyn RecordStore,
        cache: &mut PostCache,
        id: &PostId,
        mode: ViewMode,
        show_views: bool,
        events: &DetailEvents,
    ) -> BoardResult<DetailView> {
        emit(events, DetailEvent::Loading { id: id.clone() });

        let cached = cache.get(id).cloned();
        let mut post = match cached {
            Some(hit) => {
                debug!(post_id = %id, "detail served from cache");
                hit
            }
            None => match fetch_post(records, id).await {
                Ok(post) => {
                    cache.put(post.clone());
                    post
                }
                Err(e) => {
                    error!(post_id = %id, error = ?e, "detail fetch failed");
                    emit(events, DetailEvent::Failed { id: id.clone(), notice: e.notice() });
                    return Err(e);
                }
            },
        };

        if mode == ViewMode::Board {
            let next = post.views.unwrap_or(0).saturating_add(1).min(i64::MAX as u64);
            match records.update(id, &PostPatch::views(next)).await {
                Ok(()) => {
                    post.views = Some(next);
                    cache.put(post.clone());
                }
                Err(e) => warn!(post_id = %id, error = %format!("{e:#}"), "view count not recorded"),
            }
        }

        emit(events, DetailEvent::Resolved(post.clone()));

        let images = match self.strategy {
            ImageStrategy::Preload => self.preload(&post.images).await,
            ImageStrategy::Progressive => self.progressive(&post.images, events).await,
        };
        let failed = images.iter().filter(|s| !s.is_loaded()).count();
        info!(post_id = %id, images = images.len(), failed, strategy = ?self.strategy, "detail ready");

        let view = DetailView { post, images, show_views };
        emit(events, DetailEvent::Ready(view.clone()));
        Ok(view)
    }

    async fn load_slot(&self, index: usize, url: &str) -> ImageSlot {
        let outcome = match self.images.load(url).await {
            Ok(img) => ImageOutcome::Loaded(img),
            Err(e) => {
                warn!(url, error = %format!("{e:#}"), "image failed to load");
                ImageOutcome::Failed(format!("{e:#}"))
            }
        };
        ImageSlot { index, url: url.to_string(), outcome }
    }

    async fn preload(&self, urls: &[String]) -> Vec<ImageSlot> {
        join_all(urls.iter().enumerate().map(|(i, u)| self.load_slot(i, u))).await
    }

    async fn progressive(&self, urls: &[String], events: &DetailEvents) -> Vec<ImageSlot> {
        for (index, url) in urls.iter().enumerate() {
            emit(events, DetailEvent::ImagePending { index, url: url.clone() });
        }
        let mut pending: FuturesUnordered<_> =
            urls.iter().enumerate().map(|(i, u)| self.load_slot(i, u)).collect();
        let mut slots = Vec::with_capacity(urls.len());
        while let Some(slot) = pending.next().await {
            emit(events, DetailEvent::ImageSettled(slot.clone()));
            slots.push(slot);
        }
        slots.sort_by_key(|s| s.index);
        slots
    }
}

/// One remote read, validated into a `Post`.
pub async fn fetch_post(records: &dyn RecordStore, id: &PostId) -> BoardResult<Post> {
    let what = format!("post {id}");
    let record = records
        .get(id)
        .await
        .map_err(|e| BoardError::fetch(&what, e))?
        .ok_or_else(|| BoardError::fetch(&what, anyhow!("post {id} not found")))?;
    post_from_record(record).map_err(|e| BoardError::fetch(&what, e))
}
