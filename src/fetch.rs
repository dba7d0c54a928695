use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use url::Url;

use crate::storage::{ImageLoader, LoadedImage};

/// Loads detail images over http(s), or from disk for `file:` URLs.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    http: HttpClient,
}

impl HttpImageLoader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(format!("postboard/{}", crate::VERSION))
            .build()?;
        Ok(Self { http })
    }
}

/// MIME type guessed from a file extension.
pub fn guess_content_type(path: &str) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.essence_str().to_string())
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<LoadedImage> {
        let parsed = Url::parse(url).with_context(|| format!("invalid image url: {url}"))?;
        match parsed.scheme() {
            "http" | "https" => {
                let resp = self
                    .http
                    .get(parsed)
                    .send()
                    .await
                    .with_context(|| format!("requesting {url}"))?
                    .error_for_status()
                    .with_context(|| format!("requesting {url}"))?;
                let content_type = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = resp.bytes().await.with_context(|| format!("reading body of {url}"))?;
                Ok(LoadedImage { url: url.to_string(), bytes: bytes.to_vec(), content_type })
            }
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| anyhow!("not a local file url: {url}"))?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                Ok(LoadedImage { url: url.to_string(), bytes, content_type: guess_content_type(parsed.path()) })
            }
            other => bail!("unsupported image url scheme `{other}`: {url}"),
        }
    }
}
