use std::path::{Path, PathBuf};

use futures::future::BoxFuture;

use super::RawSource;
use crate::caching::CacheContents;

/// Reads a module file from the local file system.
#[derive(Clone, Debug)]
pub struct FilesystemSource {
    path: PathBuf,
}

impl FilesystemSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawSource for FilesystemSource {
    fn read(&self) -> BoxFuture<'_, CacheContents<Vec<u8>>> {
        Box::pin(async move {
            tracing::trace!(path = %self.path.display(), "Reading module file");
            // missing files map to `NotFound`, everything else to `ReadError`
            Ok(tokio::fs::read(&self.path).await?)
        })
    }
}
