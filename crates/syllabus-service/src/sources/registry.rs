use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use futures::future::BoxFuture;

use super::{ContentSource, FilesystemSource, RawSource};
use crate::caching::{CacheContents, CacheError};
use crate::catalog::{Manifest, ModuleKey, ModuleKind};
use crate::content::{ContentShape, ModuleContents};

#[derive(Debug)]
struct RegistryEntry {
    shape: ContentShape,
    source: Arc<dyn RawSource>,
}

/// The closed table of all loadable modules.
///
/// Adding a module kind or identifier is a matter of registering another entry; requests for
/// identifiers outside of the table resolve to the fallback module of their kind, if any.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: HashMap<ModuleKey, RegistryEntry>,
    fallbacks: HashMap<ModuleKind, ModuleKey>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry for all modules declared in `manifest`, reading module files
    /// relative to `content_dir`.
    pub fn from_manifest(manifest: &Manifest, content_dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for module in &manifest.modules {
            let source = FilesystemSource::new(content_dir.join(&module.path));
            registry.register(module.key(), module.shape, source);
        }
        for (kind, id) in &manifest.fallbacks {
            registry.set_fallback(ModuleKey::new(*kind, id.as_str()))?;
        }
        Ok(registry)
    }

    /// Registers the source of a module, replacing any previous registration of `key`.
    pub fn register(
        &mut self,
        key: ModuleKey,
        shape: ContentShape,
        source: impl RawSource + 'static,
    ) -> &mut Self {
        let entry = RegistryEntry {
            shape,
            source: Arc::new(source),
        };
        self.entries.insert(key, entry);
        self
    }

    /// Makes `key` the module that unknown identifiers of its kind resolve to.
    pub fn set_fallback(&mut self, key: ModuleKey) -> Result<&mut Self> {
        if !self.entries.contains_key(&key) {
            bail!("fallback module {key} is not registered");
        }
        self.fallbacks.insert(key.kind(), key);
        Ok(self)
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn shape(&self, key: &ModuleKey) -> Option<ContentShape> {
        self.entries.get(key).map(|entry| entry.shape)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContentSource for SourceRegistry {
    type Item = ModuleContents;

    fn resolve(&self, key: &ModuleKey) -> CacheContents<ModuleKey> {
        if self.entries.contains_key(key) {
            return Ok(key.clone());
        }

        match self.fallbacks.get(&key.kind()) {
            Some(fallback) => {
                tracing::debug!(
                    module = %key,
                    fallback = %fallback,
                    "Resolved to fallback module"
                );
                Ok(fallback.clone())
            }
            None => Err(CacheError::NotFound),
        }
    }

    fn fetch<'a>(&'a self, key: &'a ModuleKey) -> BoxFuture<'a, CacheContents<ModuleContents>> {
        Box::pin(async move {
            let key = self.resolve(key)?;
            let entry = self.entries.get(&key).ok_or(CacheError::NotFound)?;

            let raw = entry.source.read().await?;
            entry.shape.decode(&raw).inspect_err(|err| {
                tracing::warn!(
                    module = %key,
                    shape = %entry.shape,
                    error = err as &dyn std::error::Error,
                    "Failed to decode module"
                );
            })
        })
    }

    /// Weighs a payload by the length of its serialized JSON form.
    fn weight(item: &ModuleContents) -> usize {
        let mut counter = ByteCounter(0);
        match serde_json::to_writer(&mut counter, item) {
            Ok(()) => counter.0,
            Err(_) => std::mem::size_of_val(item),
        }
    }
}

/// An [`io::Write`] sink that only counts the bytes written to it.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
