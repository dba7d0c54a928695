use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::PostCache;
use crate::detail::{fetch_post, DetailEvents, DetailLoader, DetailView, ImageStrategy, ViewMode};
use crate::error::{BoardError, BoardResult};
use crate::images::{self, MAX_DETAIL_IMAGES};
use crate::mapping::{apply_patch, post_from_record};
use crate::pagination::{clamp_current_page, current_slice, total_pages, PageWindow, PAGE_SIZE};
use crate::storage::{BlobStore, Identity, RecordStore};
use crate::types::{NewPostRecord, Post, PostDraft, PostId, PostPatch, Upload, User};

/// Everything the board remembers between operations.
#[derive(Debug, Clone)]
pub struct BoardState {
    pub cache: PostCache,
    /// Full listing result, newest first.
    pub posts: Vec<Post>,
    pub keyword: Option<String>,
    pub current_page: usize,
}

impl Default for BoardState {
    fn default() -> Self {
        Self { cache: PostCache::new(), posts: Vec::new(), keyword: None, current_page: 1 }
    }
}

/// One rendered page of the listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingView {
    pub posts: Vec<Post>,
    pub window: PageWindow,
    pub total_posts: usize,
}

/// Board owns the capabilities plus the session state and exposes listing, detail and
/// editor operations on top of them.
pub struct Board {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    identity: Arc<dyn Identity>,
    detail: DetailLoader,
    state: BoardState,
}

impl Board {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn Identity>,
        detail: DetailLoader,
    ) -> Self {
        Self { records, blobs, identity, detail, state: BoardState::default() }
    }

    pub fn state(&self) -> &BoardState { &self.state }

    pub fn image_strategy(&self) -> ImageStrategy { self.detail.strategy() }

    pub fn set_image_strategy(&mut self, strategy: ImageStrategy) { self.detail.set_strategy(strategy); }

    // ---- listing ----

    /// Fetch the listing, refill the cache and render the current page.
    ///
    /// A blank keyword means no filter. Records that fail validation are skipped.
    pub async fn load_listing(&mut self, keyword: Option<&str>) -> BoardResult<ListingView> {
        let keyword = keyword.map(str::trim).filter(|k| !k.is_empty()).map(str::to_string);
        let records = self.records.list(keyword.as_deref()).await.map_err(|e| {
            let err = BoardError::fetch("posts", e);
            error!(keyword = ?keyword, error = ?err, "listing fetch failed");
            err
        })?;

        let mut posts = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.clone();
            match post_from_record(record) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(post_id = %id, error = %format!("{e:#}"), "skipping invalid post"),
            }
        }

        self.state.cache.replace_all(posts.iter().cloned());
        self.state.current_page = clamp_current_page(self.state.current_page, total_pages(posts.len(), PAGE_SIZE));
        self.state.posts = posts;
        self.state.keyword = keyword;
        info!(count = self.state.posts.len(), page = self.state.current_page, "listing loaded");
        Ok(self.current_view())
    }

    /// New searches always start on the first page.
    pub async fn search(&mut self, keyword: &str) -> BoardResult<ListingView> {
        self.state.current_page = 1;
        self.load_listing(Some(keyword)).await
    }

    /// Re-render from state without any I/O.
    pub fn current_view(&self) -> ListingView {
        let window = PageWindow::derive(self.state.current_page, self.state.posts.len());
        let posts = current_slice(&self.state.posts, window.current, PAGE_SIZE).to_vec();
        ListingView { posts, window, total_posts: self.state.posts.len() }
    }

    /// Out-of-range pages leave the current page unchanged.
    pub fn go_to_page(&mut self, page: usize) -> ListingView {
        let total = total_pages(self.state.posts.len(), PAGE_SIZE);
        if (1..=total).contains(&page) {
            self.state.current_page = page;
        } else {
            debug!(page, total, "page out of range");
        }
        self.current_view()
    }

    pub fn next_page(&mut self) -> ListingView { self.go_to_page(self.state.current_page + 1) }

    pub fn prev_page(&mut self) -> ListingView {
        match self.state.current_page {
            0 | 1 => self.current_view(),
            n => self.go_to_page(n - 1),
        }
    }

    /// Unfiltered reload after a mutation; the page is kept and clamped.
    pub async fn invalidate(&mut self) -> BoardResult<ListingView> {
        self.load_listing(None).await
    }

    // ---- detail ----

    pub async fn open_detail(&mut self, id: &PostId, mode: ViewMode, events: &DetailEvents) -> BoardResult<DetailView> {
        let show_views = self.is_admin().await;
        self.detail
            .load(self.records.as_ref(), &mut self.state.cache, id, mode, show_views, events)
            .await
    }

    /// Read for the editor. Always goes to the record store.
    pub async fn edit_form(&self, id: &PostId) -> BoardResult<Post> {
        fetch_post(self.records.as_ref(), id).await.map_err(|e| {
            error!(post_id = %id, error = ?e, "edit form fetch failed");
            e
        })
    }

    pub async fn is_admin(&self) -> bool {
        match self.identity.current_user().await {
            Ok(user) => user.is_some(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "identity lookup failed");
                false
            }
        }
    }

    async fn require_admin(&self) -> BoardResult<User> {
        match self.identity.current_user().await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(BoardError::Unauthorized),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "identity lookup failed");
                Err(BoardError::Unauthorized)
            }
        }
    }

    // ---- editor ----

    pub async fn create_post(&mut self, draft: PostDraft) -> BoardResult<PostId> {
        let user = self.require_admin().await?;
        let (title, content) = validate_draft(&draft)?;

        let mut uploaded = Vec::new();
        let thumbnail_url = match &draft.thumbnail {
            Some(file) => Some(self.upload_or_rollback(file, &mut uploaded).await?),
            None => None,
        };
        let mut image_urls = Vec::with_capacity(draft.images.len());
        for file in &draft.images {
            image_urls.push(self.upload_or_rollback(file, &mut uploaded).await?);
        }

        let new = NewPostRecord { title, content, thumbnail_url, image_url: images::encode(&image_urls) };
        let id = match self.records.insert(&new).await {
            Ok(id) => id,
            Err(e) => {
                let err = BoardError::write("post", e);
                error!(error = ?err, "post insert failed");
                self.remove_blobs(&uploaded).await;
                return Err(err);
            }
        };
        info!(post_id = %id, by = %user.email, images = image_urls.len(), "post created");
        self.refresh_after_write().await;
        Ok(id)
    }

    /// New images are appended to the stored ones, capped at three.
    pub async fn update_post(&mut self, id: &PostId, draft: PostDraft) -> BoardResult<Post> {
        let user = self.require_admin().await?;
        let (title, content) = validate_draft(&draft)?;
        let mut post = self.edit_form(id).await?;

        let mut uploaded = Vec::new();
        let mut patch = PostPatch {
            title: Some(title),
            content: Some(content),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Some(file) = &draft.thumbnail {
            patch.thumbnail_url = Some(Some(self.upload_or_rollback(file, &mut uploaded).await?));
        }
        if !draft.images.is_empty() {
            let mut added = Vec::with_capacity(draft.images.len());
            for file in &draft.images {
                added.push(self.upload_or_rollback(file, &mut uploaded).await?);
            }
            let merged = images::merge_capped(&post.images, &added, MAX_DETAIL_IMAGES);
            let dropped: Vec<String> = added
                .iter()
                .filter(|u| !merged.contains(u))
                .filter_map(|u| images::blob_path_from_url(u))
                .collect();
            if !dropped.is_empty() {
                warn!(post_id = %id, dropped = dropped.len(), "image limit reached, extra uploads discarded");
                self.remove_blobs(&dropped).await;
            }
            patch.image_url = Some(images::encode(&merged));
        }

        if let Err(e) = self.records.update(id, &patch).await {
            let err = BoardError::write(format!("post {id}"), e);
            error!(post_id = %id, error = ?err, "post update failed");
            self.remove_blobs(&uploaded).await;
            return Err(err);
        }
        apply_patch(&mut post, &patch);
        info!(post_id = %id, by = %user.email, "post updated");
        self.refresh_after_write().await;
        Ok(post)
    }

    pub async fn remove_thumbnail(&mut self, id: &PostId) -> BoardResult<Post> {
        self.require_admin().await?;
        let mut post = self.edit_form(id).await?;
        let thumb = post
            .thumbnail_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BoardError::invalid("This post has no thumbnail."))?;

        if let Some(path) = images::blob_path_from_url(&thumb) {
            self.remove_blobs(&[path]).await;
        }
        let patch = PostPatch { thumbnail_url: Some(None), ..Default::default() };
        self.write_patch(id, &patch, "thumbnail removal").await?;
        apply_patch(&mut post, &patch);
        info!(post_id = %id, "thumbnail removed");
        self.refresh_after_write().await;
        Ok(post)
    }

    /// `index` is zero-based into the post's detail images.
    pub async fn remove_image(&mut self, id: &PostId, index: usize) -> BoardResult<Post> {
        self.require_admin().await?;
        let mut post = self.edit_form(id).await?;
        if index >= post.images.len() {
            return Err(BoardError::invalid("Invalid image index."));
        }

        let mut remaining = post.images.clone();
        let removed = remaining.remove(index);
        if let Some(path) = images::blob_path_from_url(&removed) {
            self.remove_blobs(&[path]).await;
        }
        let patch = PostPatch { image_url: Some(images::encode(&remaining)), ..Default::default() };
        self.write_patch(id, &patch, "image removal").await?;
        apply_patch(&mut post, &patch);
        info!(post_id = %id, index, left = post.images.len(), "image removed");
        self.refresh_after_write().await;
        Ok(post)
    }

    pub async fn delete_post(&mut self, id: &PostId) -> BoardResult<()> {
        self.require_admin().await?;
        let post = self.edit_form(id).await?;
        let paths: Vec<String> = post.images.iter().filter_map(|u| images::blob_path_from_url(u)).collect();
        self.remove_blobs(&paths).await;

        self.records.delete(id).await.map_err(|e| {
            let err = BoardError::write(format!("post {id}"), e);
            error!(post_id = %id, error = ?err, "post delete failed");
            err
        })?;
        info!(post_id = %id, "post deleted");
        self.refresh_after_write().await;
        Ok(())
    }

    async fn write_patch(&self, id: &PostId, patch: &PostPatch, what: &str) -> BoardResult<()> {
        self.records.update(id, patch).await.map_err(|e| {
            let err = BoardError::write(format!("{what} on post {id}"), e);
            error!(post_id = %id, error = ?err, "{what} failed");
            err
        })
    }

    /// Upload one file; on failure, remove everything uploaded so far in this operation.
    async fn upload_or_rollback(&self, file: &Upload, uploaded: &mut Vec<String>) -> BoardResult<String> {
        let path = blob_name(&file.file_name);
        let result = match self.blobs.upload(&path, &file.bytes, &file.content_type).await {
            Ok(()) => self.blobs.public_url(&path),
            Err(e) => Err(e),
        };
        match result {
            Ok(url) => {
                uploaded.push(path);
                Ok(url.to_string())
            }
            Err(e) => {
                let err = BoardError::write(format!("image {}", file.file_name), e);
                error!(file = %file.file_name, error = ?err, "image upload failed");
                self.remove_blobs(uploaded).await;
                uploaded.clear();
                Err(err)
            }
        }
    }

    async fn remove_blobs(&self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.blobs.remove(paths).await {
            warn!(paths = ?paths, error = %format!("{e:#}"), "blob removal failed");
        }
    }

    /// The write already happened; a failed reload only leaves the listing stale.
    async fn refresh_after_write(&mut self) {
        if let Err(e) = self.invalidate().await {
            error!(error = ?e, "listing reload after write failed");
        }
    }
}

fn validate_draft(draft: &PostDraft) -> BoardResult<(String, String)> {
    let title = draft.title.trim();
    let content = draft.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(BoardError::invalid("Title and content are required."));
    }
    if draft.images.len() > MAX_DETAIL_IMAGES {
        return Err(BoardError::invalid(format!("At most {MAX_DETAIL_IMAGES} images can be uploaded.")));
    }
    Ok((title.to_string(), content.to_string()))
}

/// `<random>_<unix millis>.<ext>`, keeping the uploaded file's extension.
fn blob_name(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("{}_{}.{}", Uuid::new_v4().simple(), Utc::now().timestamp_millis(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ConfiguredIdentity;
    use crate::blobs::FsBlobStore;
    use crate::memory::MemoryStore;
    use crate::storage::{ImageLoader, LoadedImage};
    use crate::types::{ImageRef, PostRecord};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use url::Url;

    struct NoImages;

    #[async_trait]
    impl ImageLoader for NoImages {
        async fn load(&self, url: &str) -> anyhow::Result<LoadedImage> {
            Ok(LoadedImage { url: url.to_string(), bytes: Vec::new(), content_type: None })
        }
    }

    fn record(n: usize) -> PostRecord {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PostRecord {
            id: PostId::new(format!("p{n:02}")),
            title: format!("Post {n}"),
            content: "body".into(),
            thumbnail_url: None,
            image_url: None,
            created_at: base + Duration::minutes(n as i64),
            updated_at: None,
            views: Some(0),
        }
    }

    fn board_with(records: Vec<PostRecord>, admin: Option<&str>) -> (Board, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path(), Some(Url::parse("https://cdn.example.com/post-images/").unwrap())).unwrap();
        let board = Board::new(
            Arc::new(MemoryStore::with_records(records)),
            Arc::new(blobs),
            Arc::new(ConfiguredIdentity::new(admin)),
            DetailLoader::new(Arc::new(NoImages), ImageStrategy::Preload),
        );
        (board, dir)
    }

    fn upload(name: &str) -> Upload {
        Upload { file_name: name.into(), bytes: name.as_bytes().to_vec(), content_type: "image/jpeg".into() }
    }

    #[tokio::test]
    async fn paging_walks_within_bounds() {
        let (mut board, _dir) = board_with((1..=20).map(record).collect(), None);
        let view = board.load_listing(None).await.unwrap();
        assert_eq!(view.total_posts, 20);
        assert_eq!(view.window.total_pages, 3);
        assert_eq!(view.posts.len(), 9);
        assert_eq!(view.posts[0].title, "Post 20");

        assert_eq!(board.next_page().window.current, 2);
        let last = board.next_page();
        assert_eq!(last.window.current, 3);
        assert_eq!(last.posts.len(), 2);
        assert_eq!(board.next_page().window.current, 3);
        assert_eq!(board.go_to_page(0).window.current, 3);
        assert_eq!(board.go_to_page(1).window.current, 1);
        assert_eq!(board.prev_page().window.current, 1);
    }

    #[tokio::test]
    async fn search_resets_page_and_blank_means_all() {
        let (mut board, _dir) = board_with((1..=20).map(record).collect(), None);
        board.load_listing(None).await.unwrap();
        board.go_to_page(3);
        let view = board.search("post 1").await.unwrap();
        assert_eq!(view.window.current, 1);
        // Post 1, Post 10..19
        assert_eq!(view.total_posts, 11);
        assert_eq!(board.state().keyword.as_deref(), Some("post 1"));

        let all = board.search("   ").await.unwrap();
        assert_eq!(all.total_posts, 20);
        assert!(board.state().keyword.is_none());
    }

    #[tokio::test]
    async fn invalid_records_are_skipped() {
        let mut bad = record(99);
        bad.views = Some(-4);
        let (mut board, _dir) = board_with(vec![record(1), bad], None);
        let view = board.load_listing(None).await.unwrap();
        assert_eq!(view.total_posts, 1);
        assert_eq!(board.state().cache.len(), 1);
    }

    #[tokio::test]
    async fn editor_requires_admin() {
        let (mut board, _dir) = board_with(vec![record(1)], None);
        let draft = PostDraft { title: "t".into(), content: "c".into(), ..Default::default() };
        assert!(matches!(board.create_post(draft).await, Err(BoardError::Unauthorized)));
        assert!(matches!(board.delete_post(&PostId::from("p01")).await, Err(BoardError::Unauthorized)));
        assert!(!board.is_admin().await);
    }

    #[tokio::test]
    async fn draft_validation() {
        let (mut board, _dir) = board_with(Vec::new(), Some("owner@example.com"));
        let blank = PostDraft { title: "  ".into(), content: "c".into(), ..Default::default() };
        let err = board.create_post(blank).await.unwrap_err();
        assert_eq!(err.notice(), "Title and content are required.");

        let crowded = PostDraft {
            title: "t".into(),
            content: "c".into(),
            images: vec![upload("1.jpg"), upload("2.jpg"), upload("3.jpg"), upload("4.jpg")],
            ..Default::default()
        };
        assert!(matches!(board.create_post(crowded).await, Err(BoardError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn create_uploads_and_encodes_images() {
        let (mut board, dir) = board_with(Vec::new(), Some("owner@example.com"));
        let draft = PostDraft {
            title: " Opening night ".into(),
            content: "Doors at seven.".into(),
            thumbnail: Some(upload("cover.PNG")),
            images: vec![upload("a.jpg"), upload("b.jpeg")],
        };
        let id = board.create_post(draft).await.unwrap();

        let post = board.edit_form(&id).await.unwrap();
        assert_eq!(post.title, "Opening night");
        assert_eq!(post.images.len(), 2);
        let thumb = post.thumbnail_url.clone().unwrap();
        assert!(thumb.starts_with("https://cdn.example.com/post-images/"));
        assert!(thumb.ends_with(".png"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
        // listing was reloaded
        assert_eq!(board.current_view().total_posts, 1);
    }

    #[tokio::test]
    async fn update_appends_images_up_to_cap() {
        let (mut board, dir) = board_with(Vec::new(), Some("owner@example.com"));
        let id = board
            .create_post(PostDraft {
                title: "t".into(),
                content: "c".into(),
                images: vec![upload("a.jpg"), upload("b.jpg")],
                ..Default::default()
            })
            .await
            .unwrap();
        let before = board.edit_form(&id).await.unwrap().images;

        let post = board
            .update_post(
                &id,
                PostDraft {
                    title: "t2".into(),
                    content: "c2".into(),
                    images: vec![upload("c.jpg"), upload("d.jpg")],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.title, "t2");
        assert_eq!(post.images.len(), 3);
        assert_eq!(&post.images[..2], &before[..]);
        assert!(post.updated_at.is_some());
        // the upload that did not fit was cleaned up
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
        assert_eq!(board.edit_form(&id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn remove_image_and_thumbnail() {
        let (mut board, dir) = board_with(Vec::new(), Some("owner@example.com"));
        let id = board
            .create_post(PostDraft {
                title: "t".into(),
                content: "c".into(),
                thumbnail: Some(upload("t.jpg")),
                images: vec![upload("a.jpg"), upload("b.jpg")],
            })
            .await
            .unwrap();
        let original = board.edit_form(&id).await.unwrap();

        assert!(matches!(board.remove_image(&id, 2).await, Err(BoardError::InvalidInput(_))));
        let post = board.remove_image(&id, 0).await.unwrap();
        assert_eq!(post.images, vec![original.images[1].clone()]);
        let post = board.remove_image(&id, 0).await.unwrap();
        assert!(post.images.is_empty());

        let post = board.remove_thumbnail(&id).await.unwrap();
        assert!(post.thumbnail_url.is_none());
        assert!(matches!(board.remove_thumbnail(&id).await, Err(BoardError::InvalidInput(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(board.edit_form(&id).await.unwrap().images.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_blobs_and_clamps_page() {
        let mut records: Vec<PostRecord> = (1..=10).map(record).collect();
        records[0].image_url = Some(ImageRef::Text(r#"["https://cdn.example.com/post-images/gone.jpg"]"#.into()));
        let (mut board, _dir) = board_with(records, Some("owner@example.com"));
        board.load_listing(None).await.unwrap();
        assert_eq!(board.go_to_page(2).posts.len(), 1);

        board.delete_post(&PostId::from("p01")).await.unwrap();
        let view = board.current_view();
        assert_eq!(view.total_posts, 9);
        assert_eq!(view.window.current, 1);
        assert!(board.state().cache.get(&PostId::from("p01")).is_none());
    }

    #[test]
    fn blob_names_keep_extension() {
        let name = blob_name("Holiday.JPG");
        assert!(name.ends_with(".jpg"));
        let (stem, _) = name.split_once('.').unwrap();
        let (random, millis) = stem.split_once('_').unwrap();
        assert_eq!(random.len(), 32);
        assert!(millis.parse::<i64>().is_ok());
        assert!(blob_name("noext").ends_with(".bin"));
    }
}
