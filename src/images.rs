//! Decoding of the stored detail-image field into an ordered list of URLs.

use serde_json::Value;
use tracing::debug;

use crate::types::ImageRef;

/// Uploads never attach more than this many detail images to one post.
pub const MAX_DETAIL_IMAGES: usize = 3;

/// The text form of the field was not a JSON array; it is kept as one literal URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodeAmbiguous {
    pub(crate) raw: String,
    pub(crate) reason: String,
}

/// Canonical list of image URLs for a stored image reference. Never fails.
///
/// The empty string is not valid JSON, so it comes back as `[""]`. Callers that render
/// images see one broken entry rather than a silently dropped one.
pub fn normalize(raw: Option<&ImageRef>) -> Vec<String> {
    match raw {
        None => Vec::new(),
        Some(ImageRef::List(urls)) => urls.clone(),
        Some(ImageRef::Text(text)) => match decode_text(text) {
            Ok(urls) => urls,
            Err(amb) => {
                debug!(raw = %amb.raw, reason = %amb.reason, "image reference is not a JSON array; using it as a single URL");
                vec![amb.raw]
            }
        },
    }
}

fn decode_text(text: &str) -> Result<Vec<String>, DecodeAmbiguous> {
    let ambiguous = |reason: String| DecodeAmbiguous { raw: text.to_string(), reason };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        Ok(Value::String(single)) => Ok(vec![single]),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => Err(ambiguous(format!("decoded to a non-array value: {other}"))),
        Err(e) => Err(ambiguous(e.to_string())),
    }
}

/// Stored form for a list of URLs: `None` when empty, else a JSON-encoded array.
pub fn encode(urls: &[String]) -> Option<ImageRef> {
    if urls.is_empty() {
        return None;
    }
    // serializing a slice of strings cannot fail
    serde_json::to_string(urls).ok().map(ImageRef::Text)
}

/// Existing images followed by the new ones, truncated to `cap`.
pub fn merge_capped(existing: &[String], added: &[String], cap: usize) -> Vec<String> {
    existing.iter().chain(added.iter()).take(cap).cloned().collect()
}

/// Blob-store key behind a public URL: its last path segment.
pub fn blob_path_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|seg| !seg.is_empty())
        .map(str::to_string)
}
