use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::detail::ImageStrategy;

const ENV_PREFIX: &str = "POSTBOARD_";
const CONFIG_FILE: &str = "postboard.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// sqlx URL; a SQLite file in the data dir when unset.
    pub database_url: Option<String>,
    pub blob_dir: Option<PathBuf>,
    /// Base URL the blob dir is served under; its `file:` URL when unset.
    pub public_base_url: Option<String>,
    pub image_strategy: ImageStrategy,
    pub image_timeout_secs: u64,
    /// Signed-in administrator. Unset means anonymous.
    pub user: Option<String>,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            blob_dir: None,
            public_base_url: None,
            image_strategy: ImageStrategy::default(),
            image_timeout_secs: 20,
            user: None,
            log_filter: None,
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "postboard", "postboard").context("unable to determine user directories")
}

pub fn default_path() -> Option<PathBuf> {
    project_dirs().ok().map(|p| p.config_dir().join(CONFIG_FILE))
}

/// Defaults, then the TOML file, then `POSTBOARD_*` environment variables.
///
/// An explicit `path` must exist; the default location is optional.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut cfg = match path {
        Some(p) => from_file(p)?,
        None => match default_path() {
            Some(p) if p.exists() => from_file(&p)?,
            _ => Config::default(),
        },
    };
    cfg.apply_env(|key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn from_file(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

impl Config {
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("DATABASE_URL") { self.database_url = Some(v); }
        if let Some(v) = get("BLOB_DIR") { self.blob_dir = Some(PathBuf::from(v)); }
        if let Some(v) = get("PUBLIC_BASE_URL") { self.public_base_url = Some(v); }
        if let Some(v) = get("IMAGE_STRATEGY") {
            self.image_strategy = v.parse().with_context(|| format!("{ENV_PREFIX}IMAGE_STRATEGY"))?;
        }
        if let Some(v) = get("IMAGE_TIMEOUT_SECS") {
            self.image_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PREFIX}IMAGE_TIMEOUT_SECS must be a number of seconds"))?;
        }
        if let Some(v) = get("USER") { self.user = Some(v); }
        if let Some(v) = get("LOG") { self.log_filter = Some(v); }
        Ok(())
    }

    pub fn blob_dir(&self) -> Result<PathBuf> {
        match &self.blob_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().join("post-images")),
        }
    }

    pub fn public_base_url(&self) -> Result<Option<Url>> {
        self.public_base_url
            .as_deref()
            .map(|s| Url::parse(s).with_context(|| format!("invalid public_base_url: {s}")))
            .transpose()
    }

    pub fn image_timeout(&self) -> Duration { Duration::from_secs(self.image_timeout_secs.max(1)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn file_values_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
database_url = "sqlite:///tmp/board.db"
image_strategy = "progressive"
user = "owner@example.com"
"#,
        )
        .unwrap();

        let mut cfg = from_file(&path).unwrap();
        assert_eq!(cfg.image_strategy, ImageStrategy::Progressive);
        assert_eq!(cfg.image_timeout_secs, 20);
        assert_eq!(cfg.user.as_deref(), Some("owner@example.com"));

        let env: HashMap<String, String> = [
            ("POSTBOARD_IMAGE_STRATEGY", "preload"),
            ("POSTBOARD_BLOB_DIR", "/srv/images"),
            ("POSTBOARD_USER", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        cfg.apply_env(|k| env.get(k).cloned()).unwrap();
        assert_eq!(cfg.image_strategy, ImageStrategy::Preload);
        assert_eq!(cfg.blob_dir().unwrap(), PathBuf::from("/srv/images"));
        // blank values do not clear file settings
        assert_eq!(cfg.user.as_deref(), Some("owner@example.com"));
        assert_eq!(cfg.database_url.as_deref(), Some("sqlite:///tmp/board.db"));
    }

    #[test]
    fn bad_env_values_are_errors() {
        let mut cfg = Config::default();
        assert!(cfg.apply_env(|k| (k == "POSTBOARD_IMAGE_STRATEGY").then(|| "lazy".to_string())).is_err());
        let mut cfg = Config::default();
        assert!(cfg.apply_env(|k| (k == "POSTBOARD_IMAGE_TIMEOUT_SECS").then(|| "soon".to_string())).is_err());
    }

    #[test]
    fn explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn public_base_url_is_validated() {
        let cfg = Config { public_base_url: Some("not a url".into()), ..Default::default() };
        assert!(cfg.public_base_url().is_err());
        let cfg = Config { public_base_url: Some("https://cdn.example.com/post-images/".into()), ..Default::default() };
        assert_eq!(cfg.public_base_url().unwrap().unwrap().host_str(), Some("cdn.example.com"));
    }
}
