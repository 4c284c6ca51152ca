//! Downloading element text and keeping a local copy of it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::elements::{ElementSnapshot, ElementStore};

const REQUEST_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("element source answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("element source returned no element lines")]
    NoElements,
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn client() -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
        .user_agent(concat!("passwatch/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<String, SourceError> {
    log::debug!("Fetching element text from {url}");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(SourceError::Status(response.status()));
    }
    let text = response.text().await?;
    if !text.lines().any(|line| line.starts_with("1 ")) {
        return Err(SourceError::NoElements);
    }
    Ok(text)
}

/// The last downloaded element text on disk.
#[derive(Debug, Clone)]
pub struct ElementCache {
    path: PathBuf,
}

impl ElementCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached text and the time it was written, or `None` if nothing is cached yet.
    pub async fn load(&self) -> Result<Option<(String, DateTime<Utc>)>, SourceError> {
        if !tokio::fs::try_exists(&self.path).await? {
            log::debug!("No element cache at {}", self.path.display());
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        let written = tokio::fs::metadata(&self.path).await?.modified()?;
        Ok(Some((text, written.into())))
    }

    pub async fn store(&self, text: &str) -> Result<(), SourceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

/// Download fresh text, cache it, and swap it into `store`.
///
/// The store keeps its previous snapshot when the download fails. A failed
/// cache write is logged but does not fail the refresh.
pub async fn refresh(
    client: &reqwest::Client,
    url: &str,
    cache: &ElementCache,
    store: &ElementStore,
    now: DateTime<Utc>,
) -> Result<Arc<ElementSnapshot>, SourceError> {
    let text = match fetch(client, url).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Element refresh from {url} failed: {e}");
            return Err(e);
        }
    };
    if let Err(e) = cache.store(&text).await {
        log::warn!(
            "Failed to write element cache {}: {e}",
            cache.path().display()
        );
    }
    Ok(store.replace(text, now))
}

/// Seed `store` from the cache file. Returns whether anything was loaded.
pub async fn load_cached(cache: &ElementCache, store: &ElementStore) -> Result<bool, SourceError> {
    match cache.load().await? {
        Some((text, written)) => {
            log::info!("Loaded element text from {}", cache.path().display());
            store.replace(text, written);
            Ok(true)
        }
        None => Ok(false),
    }
}
