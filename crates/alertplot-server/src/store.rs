//! Storage for rendered charts.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;

/// Names the file store hands out: `<uuid>.png`.
static IMAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+\.png$").unwrap_or_else(|_| unreachable!()));

/// Somewhere a chat message can link a chart from.
pub trait ImageStore: Send + Sync {
    /// Stores a PNG and returns its public URL.
    fn put(&self, png: Vec<u8>) -> impl Future<Output = Result<String, StoreError>> + Send;
}

/// Keeps charts in a local directory served by this process under `/images/`.
#[derive(Debug, Clone)]
pub struct FileImageStore {
    dir: PathBuf,
    public_url: String,
}

impl FileImageStore {
    /// Creates a store writing into `dir`, linking under `public_url`.
    pub fn new(dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory images are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL of the image called `name`.
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/images/{name}", self.public_url)
    }

    /// Reads a previously stored image.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidName` for names the store never produces
    /// and `StoreError::NotFound` if no such image exists.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        if !IMAGE_NAME.is_match(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

impl ImageStore for FileImageStore {
    async fn put(&self, png: Vec<u8>) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!("{}.png", Uuid::new_v4());
        let path = self.dir.join(&name);
        tokio::fs::write(&path, &png).await?;

        debug!(path = %path.display(), bytes = png.len(), "chart stored");
        Ok(self.url_for(&name))
    }
}
