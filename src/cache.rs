use std::collections::HashMap;

use crate::types::{Post, PostId};

/// Session-lived read shortcut for posts already seen in a listing or detail fetch.
///
/// Never authoritative: anything about to be edited is re-read from the record store.
#[derive(Debug, Clone, Default)]
pub struct PostCache {
    entries: HashMap<PostId, Post>,
}

impl PostCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, id: &PostId) -> Option<&Post> { self.entries.get(id) }

    /// Insert or overwrite the entry for `post.id`.
    pub fn put(&mut self, post: Post) {
        self.entries.insert(post.id.clone(), post);
    }

    /// Drop everything and install a fresh listing result.
    pub fn replace_all<I>(&mut self, posts: I)
    where
        I: IntoIterator<Item = Post>,
    {
        self.entries = posts.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn clear(&mut self) { self.entries.clear(); }
}
