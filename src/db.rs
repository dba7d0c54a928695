use anyhow::{Context, Result};
use chrono::Utc;
use directories::ProjectDirs;
use sqlx::{any::AnyConnectOptions, AnyPool, ConnectOptions, migrate::Migrator};
use sqlx::any::AnyPoolOptions;
use std::path::Path;
use std::{path::PathBuf, str::FromStr};
use std::sync::Once;
use tracing::{debug, info};

use crate::dao;
use crate::mapping::{insert_from_new, record_from_row, update_from_patch};
use crate::storage::RecordStore;
use crate::types::{NewPostRecord, PostId, PostPatch, PostRecord};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

// Embed SQL migrations from the migrations/ directory
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQL-backed record store.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    // Create a connection pool. If database_url is None, use a sensible default
    // (SQLite file in the user's data directory).
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        // Register compiled-in drivers for sqlx::any
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        // Quiet by default; callers can enable SQLX_LOG if they want
        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?
            .disable_statement_logging();

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        debug!(%url, "database connected");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("running migrations")?;
        let posts = dao::count_posts(&self.pool).await?;
        info!(posts, "database ready");
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool { &self.pool }
}

#[async_trait::async_trait]
impl RecordStore for Database {
    async fn list(&self, filter: Option<&str>) -> Result<Vec<PostRecord>> {
        let rows = dao::list_posts(&self.pool, filter).await.context("listing posts")?;
        let mut records = rows.into_iter().map(record_from_row).collect::<Result<Vec<_>>>()?;
        // rows written by other tools may use a different timestamp layout than ours
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn get(&self, id: &PostId) -> Result<Option<PostRecord>> {
        let row = dao::get_post(&self.pool, id.as_str())
            .await
            .with_context(|| format!("loading post {id}"))?;
        row.map(record_from_row).transpose()
    }

    async fn insert(&self, post: &NewPostRecord) -> Result<PostId> {
        let id = PostId(uuid::Uuid::new_v4().to_string());
        let ins = insert_from_new(&id, post, &Utc::now());
        dao::insert_post(&self.pool, &ins).await.context("inserting post")?;
        Ok(id)
    }

    async fn update(&self, id: &PostId, patch: &PostPatch) -> Result<()> {
        let affected = dao::update_post(&self.pool, id.as_str(), &update_from_patch(patch))
            .await
            .with_context(|| format!("updating post {id}"))?;
        if affected == 0 && !patch.is_empty() {
            anyhow::bail!("post {id} not found");
        }
        Ok(())
    }

    async fn delete(&self, id: &PostId) -> Result<()> {
        dao::delete_post(&self.pool, id.as_str())
            .await
            .with_context(|| format!("deleting post {id}"))?;
        Ok(())
    }
}

/// `sqlite:` URL for a database file, created on first connect.
pub fn sqlite_url_for(path: &Path) -> String {
    // Encode spaces in the path for a valid sqlite URL
    let mut path_str = path.to_string_lossy().to_string();
    if path_str.contains(' ') { path_str = path_str.replace(' ', "%20"); }
    format!("sqlite://{path_str}?mode=rwc")
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "postboard", "postboard")
        .context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("postboard.db");
    Ok(sqlite_url_for(&path))
}
