use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::storage::BlobStore;

/// Image bucket kept in a local directory and served under `public_base`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base: Url,
}

impl FsBlobStore {
    /// `public_base` defaults to the `file:` URL of `root`.
    pub fn new(root: impl Into<PathBuf>, public_base: Option<Url>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating blob dir: {}", root.display()))?;
        let public_base = match public_base {
            Some(url) => with_trailing_slash(url),
            None => {
                let abs = root
                    .canonicalize()
                    .with_context(|| format!("resolving blob dir: {}", root.display()))?;
                Url::from_directory_path(&abs)
                    .map_err(|_| anyhow!("blob dir is not an absolute path: {}", abs.display()))?
            }
        };
        Ok(Self { root, public_base })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let plain = !path.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            bail!("invalid blob path: {path:?}");
        }
        Ok(self.root.join(rel))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let dest = self.resolve(path)?;
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            bail!("blob already exists: {path}");
        }
        tokio::fs::write(&dest, bytes)
            .await
            .with_context(|| format!("writing blob {}", dest.display()))?;
        debug!(path, content_type, size = bytes.len(), "blob uploaded");
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<Url> {
        self.resolve(path)?;
        self.public_base
            .join(path)
            .with_context(|| format!("building public url for {path}"))
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let target = self.resolve(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!(path = %path, "blob removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = %path, "blob already gone");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("removing blob {}", target.display()));
                }
            }
        }
        Ok(())
    }
}
