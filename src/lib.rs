pub mod auth;
pub mod blobs;
pub mod board;
pub mod cache;
pub mod config;
pub mod dao;
pub mod db;
pub mod detail;
pub mod error;
pub mod fetch;
pub mod images;
pub mod mapping;
pub mod memory;
pub mod pagination;
pub mod storage;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::board::{Board, BoardState, ListingView};
    pub use crate::cache::PostCache;
    pub use crate::detail::{DetailEvent, DetailLoader, DetailView, ImageOutcome, ImageSlot, ImageStrategy, ViewMode};
    pub use crate::error::{BoardError, BoardResult};
    pub use crate::pagination::{PageWindow, PAGE_SIZE, WINDOW_SIZE};
    pub use crate::storage::{BlobStore, Identity, ImageLoader, LoadedImage, RecordStore};
    pub use crate::types::{ImageRef, Post, PostDraft, PostId, PostRecord, Upload, User};
}

use std::sync::Arc;

use anyhow::Result;

use crate::auth::ConfiguredIdentity;
use crate::blobs::FsBlobStore;
use crate::board::Board;
use crate::config::Config;
use crate::db::Database;
use crate::detail::DetailLoader;
use crate::fetch::HttpImageLoader;

/// Wire the default stack from configuration: SQLite records, a local image directory,
/// the configured identity and an HTTP image loader.
pub async fn open_board(cfg: &Config) -> Result<Board> {
    let db = Database::connect(cfg.database_url.as_deref()).await?;
    db.run_migrations().await?;
    let blobs = FsBlobStore::new(cfg.blob_dir()?, cfg.public_base_url()?)?;
    let identity = ConfiguredIdentity::new(cfg.user.as_deref());
    let loader = HttpImageLoader::new(cfg.image_timeout())?;
    Ok(Board::new(
        Arc::new(db),
        Arc::new(blobs),
        Arc::new(identity),
        DetailLoader::new(Arc::new(loader), cfg.image_strategy),
    ))
}
