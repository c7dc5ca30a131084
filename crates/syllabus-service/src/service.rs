//! The typed query API over the module loader.
//!
//! [`ContentService`] maps every accessor to the [`ModuleKey`]s it depends on and routes them
//! through the [`LoadCoordinator`]. Single-module accessors propagate load errors to the
//! caller. Aggregate accessors fan out over their members in parallel, skip failed members,
//! and return the items of the remaining ones in declared order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;

use crate::caching::{CacheContents, CacheError, CacheStats, LoadCoordinator, ModuleState};
use crate::catalog::{Manifest, ModuleKey};
use crate::config::Config;
use crate::content::{
    CodingQuestion, ContentFamily, DesignPattern, Difficulty, InterviewQuestion, Lesson,
    ModuleContents, Note, Quiz, RoadmapNode, filter,
};
use crate::sources::SourceRegistry;

/// Identifiers of the resource modules backing the single-module accessors.
pub mod resources {
    pub const NOTES: &str = "notes";
    pub const QUIZZES: &str = "quizzes";
    pub const INTERVIEW_QUESTIONS: &str = "interview-questions";
    pub const DESIGN_PATTERNS: &str = "design-patterns";
    pub const CODING_QUESTIONS: &str = "coding-questions";
    pub const ROADMAP: &str = "roadmap";
}

/// A member of an aggregate, or a preloaded module, that failed to load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    pub key: ModuleKey,
    #[serde(serialize_with = "serialize_error")]
    pub error: CacheError,
}

fn serialize_error<S: serde::Serializer>(error: &CacheError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// The best-effort result of an aggregate accessor.
///
/// `items` holds the items of all members that loaded, in declared member order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Aggregate<T> {
    pub items: Vec<T>,
    pub failures: Vec<MemberFailure>,
}

impl<T> Aggregate<T> {
    /// Whether some, but not all, members failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.items.is_empty()
    }
}

/// The outcome of [`ContentService::preload`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub loaded: Vec<ModuleKey>,
    pub failures: Vec<MemberFailure>,
}

/// Construction options of a [`ContentService`].
#[derive(Clone, Debug)]
pub struct ServiceOptions {
    /// Upper bound for a single module fetch.
    pub fetch_timeout: Duration,
    /// Members of the "all lessons" aggregate, in result order.
    pub lesson_categories: Vec<ModuleKey>,
    /// Modules loaded by [`ContentService::initialize`].
    pub preload: Vec<ModuleKey>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            lesson_categories: Vec::new(),
            preload: Vec::new(),
        }
    }
}

impl ServiceOptions {
    pub fn from_manifest(manifest: &Manifest, fetch_timeout: Duration) -> Self {
        Self {
            fetch_timeout,
            lesson_categories: manifest.lesson_categories(),
            preload: manifest.preload.clone(),
        }
    }
}

/// Typed, cached access to the content catalog.
///
/// Cloning is cheap; clones share one cache.
#[derive(Clone, Debug)]
pub struct ContentService {
    loader: LoadCoordinator<SourceRegistry>,
    lesson_categories: Arc<[ModuleKey]>,
    preload_keys: Arc<[ModuleKey]>,
    ready: Arc<watch::Sender<bool>>,
}

impl ContentService {
    pub fn new(registry: SourceRegistry, options: ServiceOptions) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            loader: LoadCoordinator::new(Arc::new(registry), options.fetch_timeout),
            lesson_categories: options.lesson_categories.into(),
            preload_keys: options.preload.into(),
            ready: Arc::new(ready),
        }
    }

    /// Creates the service for the manifest named in `config`, reading modules from disk.
    pub fn from_config(config: &Config) -> Result<Self> {
        let manifest = Manifest::from_path(&config.manifest)?;
        let registry = SourceRegistry::from_manifest(&manifest, &config.content_dir())?;
        tracing::debug!(modules = registry.len(), "Loaded content manifest");
        Ok(Self::new(
            registry,
            ServiceOptions::from_manifest(&manifest, config.fetch_timeout),
        ))
    }

    /// Preloads the configured modules, then marks the service as ready.
    ///
    /// Preload failures are reported but do not fail initialization; the failed modules are
    /// loaded again on first access. Calling this after [`shutdown`](Self::shutdown) brings
    /// the service back up.
    pub async fn initialize(&self) -> PreloadReport {
        self.loader.open();
        let report = self.preload(&self.preload_keys).await;
        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "Content service ready"
        );
        self.ready.send_replace(true);
        report
    }

    /// Whether [`initialize`](Self::initialize) has completed and the service was not shut
    /// down since.
    pub fn ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Waits until the service is ready.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        ready.wait_for(|ready| *ready).await.ok();
    }

    /// Stops accepting loads, waits for running loads to finish and empties the cache.
    ///
    /// Accessors called afterwards fail with [`CacheError::ShutDown`].
    pub async fn shutdown(&self) {
        self.ready.send_replace(false);
        self.loader.close();
        self.loader.drain().await;
        let cleared = self.loader.clear(&[]);
        tracing::info!(cleared, "Content service shut down");
    }

    /// Loads all of `keys` in parallel.
    pub async fn preload(&self, keys: &[ModuleKey]) -> PreloadReport {
        let results = join_all(keys.iter().map(|key| self.loader.acquire(key))).await;

        let mut report = PreloadReport::default();
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(_) => report.loaded.push(key.clone()),
                Err(error) => {
                    tracing::warn!(
                        module = %key,
                        error = &error as &dyn std::error::Error,
                        "Failed to preload module"
                    );
                    report.failures.push(MemberFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }
        report
    }

    /// The decoded contents of any module.
    pub async fn module(&self, key: &ModuleKey) -> CacheContents<Arc<ModuleContents>> {
        self.loader.acquire(key).await
    }

    async fn collection<T: ContentFamily>(&self, key: &ModuleKey) -> CacheContents<Arc<[T]>> {
        let contents = self.module(key).await?;
        match T::extract(&contents) {
            Some(items) => Ok(Arc::clone(items)),
            None => {
                tracing::error!(
                    module = %key,
                    expected = %T::SHAPE,
                    actual = %contents.shape(),
                    "Module holds unexpected content"
                );
                Err(CacheError::Malformed(format!(
                    "expected {}, found {}",
                    T::SHAPE,
                    contents.shape()
                )))
            }
        }
    }

    /// Concatenates the items of all members that load, in the order of `keys`.
    async fn aggregate<T: ContentFamily>(&self, name: &str, keys: &[ModuleKey]) -> Aggregate<T> {
        let results = join_all(keys.iter().map(|key| self.collection::<T>(key))).await;

        let mut aggregate = Aggregate {
            items: Vec::new(),
            failures: Vec::new(),
        };
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(items) => aggregate.items.extend(items.iter().cloned()),
                Err(error) => {
                    metric!(
                        counter("aggregate.member_failure") += 1,
                        "aggregate" => name,
                        "error" => error.metrics_tag(),
                    );
                    tracing::warn!(
                        aggregate = name,
                        module = %key,
                        error = &error as &dyn std::error::Error,
                        "Skipping failed aggregate member"
                    );
                    aggregate.failures.push(MemberFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }
        aggregate
    }

    async fn resource<T: ContentFamily>(&self, identifier: &str) -> CacheContents<Arc<[T]>> {
        self.collection(&ModuleKey::resource(identifier)).await
    }

    async fn find_in<T: ContentFamily>(&self, identifier: &str, id: &str) -> CacheContents<Option<T>> {
        let items = self.resource::<T>(identifier).await?;
        Ok(filter::find_by_id(&items, id).cloned())
    }

    /// The lessons of one category. Unknown categories resolve to the fallback category.
    pub async fn lessons_in_category(&self, category: &str) -> CacheContents<Arc<[Lesson]>> {
        self.collection(&ModuleKey::category(category)).await
    }

    pub async fn notes(&self) -> CacheContents<Arc<[Note]>> {
        self.resource(resources::NOTES).await
    }

    pub async fn quizzes(&self) -> CacheContents<Arc<[Quiz]>> {
        self.resource(resources::QUIZZES).await
    }

    pub async fn interview_questions(&self) -> CacheContents<Arc<[InterviewQuestion]>> {
        self.resource(resources::INTERVIEW_QUESTIONS).await
    }

    pub async fn design_patterns(&self) -> CacheContents<Arc<[DesignPattern]>> {
        self.resource(resources::DESIGN_PATTERNS).await
    }

    pub async fn coding_questions(&self) -> CacheContents<Arc<[CodingQuestion]>> {
        self.resource(resources::CODING_QUESTIONS).await
    }

    pub async fn roadmap(&self) -> CacheContents<Arc<[RoadmapNode]>> {
        self.resource(resources::ROADMAP).await
    }

    /// The contents of a topic filter module, e.g. coding problems about arrays.
    pub async fn topic(&self, identifier: &str) -> CacheContents<Arc<ModuleContents>> {
        self.module(&ModuleKey::topic(identifier)).await
    }

    /// All lessons of all declared categories. Never fails; see [`all_lessons_report`].
    ///
    /// [`all_lessons_report`]: Self::all_lessons_report
    pub async fn all_lessons(&self) -> Vec<Lesson> {
        self.all_lessons_report().await.items
    }

    /// All lessons of all declared categories, along with the categories that failed.
    pub async fn all_lessons_report(&self) -> Aggregate<Lesson> {
        self.aggregate("all_lessons", &self.lesson_categories).await
    }

    pub async fn notes_by_category(&self, category: &str) -> CacheContents<Vec<Note>> {
        Ok(filter::by_category(&self.notes().await?, category))
    }

    pub async fn questions_by_difficulty(
        &self,
        difficulty: Difficulty,
    ) -> CacheContents<Vec<InterviewQuestion>> {
        Ok(filter::by_difficulty(
            &self.interview_questions().await?,
            difficulty,
        ))
    }

    pub async fn coding_questions_by_tag(&self, tag: &str) -> CacheContents<Vec<CodingQuestion>> {
        Ok(filter::by_tag(&self.coding_questions().await?, tag))
    }

    /// Free-text search over all lessons.
    pub async fn search_lessons(&self, query: &str) -> Vec<Lesson> {
        filter::search(&self.all_lessons().await, query)
    }

    /// Looks up a lesson in all declared categories.
    pub async fn lesson_by_id(&self, id: &str) -> Option<Lesson> {
        let lessons = self.all_lessons().await;
        filter::find_by_id(&lessons, id).cloned()
    }

    pub async fn note_by_id(&self, id: &str) -> CacheContents<Option<Note>> {
        self.find_in(resources::NOTES, id).await
    }

    pub async fn quiz_by_id(&self, id: &str) -> CacheContents<Option<Quiz>> {
        self.find_in(resources::QUIZZES, id).await
    }

    pub async fn interview_question_by_id(
        &self,
        id: &str,
    ) -> CacheContents<Option<InterviewQuestion>> {
        self.find_in(resources::INTERVIEW_QUESTIONS, id).await
    }

    pub async fn design_pattern_by_id(&self, id: &str) -> CacheContents<Option<DesignPattern>> {
        self.find_in(resources::DESIGN_PATTERNS, id).await
    }

    pub async fn coding_question_by_id(&self, id: &str) -> CacheContents<Option<CodingQuestion>> {
        self.find_in(resources::CODING_QUESTIONS, id).await
    }

    pub async fn roadmap_node(&self, id: &str) -> CacheContents<Option<RoadmapNode>> {
        self.find_in(resources::ROADMAP, id).await
    }

    /// Removes the named modules from the cache.
    pub fn evict(&self, keys: &[ModuleKey]) -> usize {
        self.loader.evict(keys)
    }

    /// Removes every cached module except the ones in `keep`.
    pub fn clear(&self, keep: &[ModuleKey]) -> usize {
        self.loader.clear(keep)
    }

    pub fn stats(&self) -> CacheStats {
        self.loader.stats()
    }

    pub fn module_state(&self, key: &ModuleKey) -> ModuleState {
        self.loader.module_state(key)
    }

    pub fn cached_keys(&self) -> Vec<ModuleKey> {
        self.loader.cached_keys()
    }
}
