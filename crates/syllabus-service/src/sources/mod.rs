//! Leaf fetch operations resolving a [`ModuleKey`] to its content.
//!
//! A [`ContentSource`] is the only thing the loader calls to produce a payload. It never
//! touches the module cache itself. The production implementation is the [`SourceRegistry`],
//! a closed table mapping each declared key to a [`RawSource`] and the shape its bytes
//! decode into.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::caching::CacheContents;
use crate::catalog::ModuleKey;

mod filesystem;
mod registry;

pub use filesystem::FilesystemSource;
pub use registry::SourceRegistry;

/// Fetches and decodes modules.
pub trait ContentSource: Send + Sync + 'static {
    /// The decoded payload of a module.
    type Item: Send + Sync + 'static;

    /// Maps a requested key to the key whose content will be served for it.
    ///
    /// This is where unknown identifiers fall back to a default module. Keys that resolve to
    /// the same canonical key share one cache entry.
    fn resolve(&self, key: &ModuleKey) -> CacheContents<ModuleKey> {
        Ok(key.clone())
    }

    /// Reads and decodes the module named by `key`.
    fn fetch<'a>(&'a self, key: &'a ModuleKey) -> BoxFuture<'a, CacheContents<Self::Item>>;

    /// The approximate number of bytes an item accounts for in the cache statistics.
    fn weight(item: &Self::Item) -> usize {
        std::mem::size_of_val(item)
    }
}

/// Reads the raw, undecoded bytes of one module from some backing store.
pub trait RawSource: Send + Sync + fmt::Debug {
    fn read(&self) -> BoxFuture<'_, CacheContents<Vec<u8>>>;
}

/// A module bundled into the binary or built in memory.
#[derive(Clone, Debug)]
pub struct StaticSource {
    contents: Arc<[u8]>,
}

impl StaticSource {
    pub fn new(contents: impl Into<Arc<[u8]>>) -> Self {
        Self {
            contents: contents.into(),
        }
    }
}

impl RawSource for StaticSource {
    fn read(&self) -> BoxFuture<'_, CacheContents<Vec<u8>>> {
        let contents = self.contents.to_vec();
        Box::pin(async move { Ok(contents) })
    }
}
