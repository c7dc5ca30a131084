use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;

use syllabus_service::caching::{CacheContents, CacheError};
use syllabus_service::catalog::{Manifest, ModuleKey};
use syllabus_service::content::ContentShape;
use syllabus_service::service::{ContentService, ServiceOptions};
use syllabus_service::sources::{FilesystemSource, RawSource, SourceRegistry};

pub fn manifest() -> Manifest {
    Manifest::from_path(&syllabus_test::fixture("catalog/manifest.yml")).unwrap()
}

/// The registry of the fixture catalog, reading from `content_dir`.
pub fn registry_in(content_dir: &Path) -> SourceRegistry {
    SourceRegistry::from_manifest(&manifest(), content_dir).unwrap()
}

pub fn registry() -> SourceRegistry {
    registry_in(&syllabus_test::fixture("catalog"))
}

pub fn service_with(registry: SourceRegistry) -> ContentService {
    let options = ServiceOptions::from_manifest(&manifest(), Duration::from_secs(5));
    ContentService::new(registry, options)
}

/// A content service over the unmodified fixture catalog.
pub fn fixture_service() -> ContentService {
    syllabus_test::setup();
    service_with(registry())
}

/// Wraps the file source of a fixture, counting reads and optionally delaying or failing
/// them.
#[derive(Debug)]
pub struct Instrumented {
    inner: FilesystemSource,
    reads: Arc<AtomicUsize>,
    delay: Duration,
    fail: bool,
}

impl Instrumented {
    pub fn fixture(path: &str) -> Self {
        Self {
            inner: FilesystemSource::new(syllabus_test::fixture(path)),
            reads: Arc::default(),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// A handle to the number of reads, usable after the source moved into a registry.
    pub fn reads(&self) -> ReadCounter {
        ReadCounter(Arc::clone(&self.reads))
    }

    /// Replaces the source of `key` in `registry` with this one.
    pub fn install(self, registry: &mut SourceRegistry, key: ModuleKey, shape: ContentShape) {
        registry.register(key, shape, self);
    }
}

impl RawSource for Instrumented {
    fn read(&self) -> BoxFuture<'_, CacheContents<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(CacheError::ReadError("injected failure".into()));
            }
            self.inner.read().await
        })
    }
}

#[derive(Clone, Debug)]
pub struct ReadCounter(Arc<AtomicUsize>);

impl ReadCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
