use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

/// Raw `posts` row. Timestamps stay as stored text until `mapping` parses them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>, // bare URL or JSON array string
    pub created_at: String,
    pub updated_at: Option<String>,
    pub views: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInsert {
    pub id: String,
    pub title: String,
    pub content: String,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

/// Column assignments for a partial update, already in stored form.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub thumbnail_url: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub views: Option<i64>,
    pub updated_at: Option<String>,
}

enum Bound {
    Text(Option<String>),
    Int(i64),
}

// The Any driver cannot decode NULL into Option<String>, so nullable columns are
// COALESCEd. image_url and views carry their NULL-ness in a flag column since '' and
// any integer are valid stored values there.
const SELECT_POST: &str = "SELECT id, title, content, COALESCE(thumbnail_url, ''), \
     COALESCE(image_url, ''), CASE WHEN image_url IS NULL THEN 1 ELSE 0 END, \
     created_at, COALESCE(updated_at, ''), COALESCE(views, 0), \
     CASE WHEN views IS NULL THEN 1 ELSE 0 END FROM posts";

type RawRow = (String, String, String, String, String, i64, String, String, i64, i64);

fn row_from_raw(raw: RawRow) -> PostRow {
    let (id, title, content, thumb, image_url, image_null, created_at, updated_at, views, views_null) = raw;
    PostRow {
        id,
        title,
        content,
        thumbnail_url: Some(thumb).filter(|s| !s.is_empty()),
        image_url: if image_null == 1 { None } else { Some(image_url) },
        created_at,
        updated_at: Some(updated_at).filter(|s| !s.is_empty()),
        views: if views_null == 1 { None } else { Some(views) },
    }
}

/// Unicode case-insensitive substring match. SQLite's `lower()` only folds ASCII.
fn title_matches(title: &str, needle: &str) -> bool {
    title.to_lowercase().contains(needle)
}

/// Rows come back in stored `created_at` text order; callers that need time order
/// across mixed timestamp formats sort after parsing.
pub async fn list_posts(pool: &AnyPool, title_filter: Option<&str>) -> Result<Vec<PostRow>> {
    let sql = format!("{SELECT_POST} ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, RawRow>(&sql).fetch_all(pool).await?;
    let needle = title_filter.map(str::to_lowercase);
    Ok(rows
        .into_iter()
        .map(row_from_raw)
        .filter(|row| needle.as_deref().map_or(true, |n| title_matches(&row.title, n)))
        .collect())
}

pub async fn get_post(pool: &AnyPool, id: &str) -> Result<Option<PostRow>> {
    let sql = format!("{SELECT_POST} WHERE id = ? LIMIT 1");
    let row = sqlx::query_as::<_, RawRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_from_raw))
}

pub async fn insert_post(pool: &AnyPool, p: &PostInsert) -> Result<()> {
    sqlx::query(
        "INSERT INTO posts(id, title, content, thumbnail_url, image_url, created_at)\n         VALUES(?, ?, ?, ?, ?, ?)",
    )
    .bind(&p.id)
    .bind(&p.title)
    .bind(&p.content)
    .bind(&p.thumbnail_url)
    .bind(&p.image_url)
    .bind(&p.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns rows affected; zero when nothing matched or nothing was set.
pub async fn update_post(pool: &AnyPool, id: &str, u: &PostUpdate) -> Result<u64> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Bound> = Vec::new();
    if let Some(title) = &u.title {
        sets.push("title = ?");
        values.push(Bound::Text(Some(title.clone())));
    }
    if let Some(content) = &u.content {
        sets.push("content = ?");
        values.push(Bound::Text(Some(content.clone())));
    }
    if let Some(thumb) = &u.thumbnail_url {
        sets.push("thumbnail_url = ?");
        values.push(Bound::Text(thumb.clone()));
    }
    if let Some(images) = &u.image_url {
        sets.push("image_url = ?");
        values.push(Bound::Text(images.clone()));
    }
    if let Some(views) = u.views {
        sets.push("views = ?");
        values.push(Bound::Int(views));
    }
    if let Some(ts) = &u.updated_at {
        sets.push("updated_at = ?");
        values.push(Bound::Text(Some(ts.clone())));
    }
    if sets.is_empty() {
        return Ok(0);
    }

    let sql = format!("UPDATE posts SET {} WHERE id = ?", sets.join(", "));
    let mut query = sqlx::query(&sql);
    for v in values {
        query = match v {
            Bound::Text(t) => query.bind(t),
            Bound::Int(i) => query.bind(i),
        };
    }
    let result = query.bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn delete_post(pool: &AnyPool, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_posts(pool: &AnyPool) -> Result<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
