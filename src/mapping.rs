use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::dao::{PostInsert, PostRow, PostUpdate};
use crate::images;
use crate::types::{ImageRef, NewPostRecord, Post, PostId, PostPatch, PostRecord};

/// Stored timestamp text. Fixed-width UTC so text order matches time order.
pub fn timestamp_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// RFC 3339, or SQLite's `YYYY-MM-DD HH:MM:SS[.fff]` for rows written by other tools.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("unrecognized timestamp: {s}"))?;
    Ok(naive.and_utc())
}

fn image_ref_text(r: &ImageRef) -> String {
    match r {
        ImageRef::Text(s) => s.clone(),
        // a native list gets the same encoding uploads produce
        ImageRef::List(urls) => serde_json::to_string(urls).unwrap_or_default(),
    }
}

pub fn record_from_row(row: PostRow) -> Result<PostRecord> {
    let created_at = parse_timestamp(&row.created_at)
        .with_context(|| format!("post {}: created_at", row.id))?;
    let updated_at = row
        .updated_at
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .with_context(|| format!("post {}: updated_at", row.id))?;
    Ok(PostRecord {
        id: PostId(row.id),
        title: row.title,
        content: row.content,
        thumbnail_url: row.thumbnail_url,
        image_url: row.image_url.map(ImageRef::Text),
        created_at,
        updated_at,
        views: row.views,
    })
}

pub fn insert_from_new(id: &PostId, new: &NewPostRecord, created_at: &DateTime<Utc>) -> PostInsert {
    PostInsert {
        id: id.0.clone(),
        title: new.title.clone(),
        content: new.content.clone(),
        thumbnail_url: new.thumbnail_url.clone(),
        image_url: new.image_url.as_ref().map(image_ref_text),
        created_at: timestamp_text(created_at),
    }
}

pub fn update_from_patch(patch: &PostPatch) -> PostUpdate {
    PostUpdate {
        title: patch.title.clone(),
        content: patch.content.clone(),
        thumbnail_url: patch.thumbnail_url.clone(),
        image_url: patch.image_url.as_ref().map(|r| r.as_ref().map(image_ref_text)),
        views: patch.views,
        updated_at: patch.updated_at.as_ref().map(timestamp_text),
    }
}

/// Validate a stored record and normalize its image field.
pub fn post_from_record(record: PostRecord) -> Result<Post> {
    if record.id.0.trim().is_empty() {
        bail!("post record without an id");
    }
    let views = match record.views {
        None => None,
        Some(v) if v >= 0 => Some(v as u64),
        Some(v) => bail!("post {}: negative view count {v}", record.id),
    };
    let images = images::normalize(record.image_url.as_ref());
    Ok(Post {
        id: record.id,
        title: record.title,
        content: record.content,
        thumbnail_url: record.thumbnail_url.filter(|u| !u.is_empty()),
        images,
        created_at: record.created_at,
        updated_at: record.updated_at,
        views,
    })
}

/// Apply a successful patch to an already-normalized post.
pub fn apply_patch(post: &mut Post, patch: &PostPatch) {
    if let Some(title) = &patch.title { post.title = title.clone(); }
    if let Some(content) = &patch.content { post.content = content.clone(); }
    if let Some(thumb) = &patch.thumbnail_url { post.thumbnail_url = thumb.clone(); }
    if let Some(images) = &patch.image_url { post.images = images::normalize(images.as_ref()); }
    if let Some(views) = patch.views { post.views = Some(views.max(0) as u64); }
    if let Some(ts) = patch.updated_at { post.updated_at = Some(ts); }
}
