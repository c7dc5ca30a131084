use std::time::Duration;

use syllabus_service::ContentService;
use syllabus_service::caching::{CacheError, ModuleState};
use syllabus_service::catalog::ModuleKey;
use syllabus_service::config::Config;
use syllabus_service::content::ContentShape;
use syllabus_service::service::resources;

use crate::utils::{Instrumented, fixture_service, registry, service_with};

#[tokio::test]
async fn test_from_config() {
    syllabus_test::setup();
    let dir = syllabus_test::tempdir();
    let config_path = dir.path().join("syllabus.yml");
    let manifest = syllabus_test::fixture("catalog/manifest.yml");
    std::fs::write(
        &config_path,
        format!("manifest: {}\nfetch_timeout: 2s\n", manifest.display()),
    )
    .unwrap();

    let config = Config::get(Some(&config_path)).unwrap();
    assert_eq!(config.fetch_timeout, Duration::from_secs(2));
    assert_eq!(config.content_dir(), syllabus_test::fixture("catalog"));

    let service = ContentService::from_config(&config).unwrap();
    assert_eq!(service.roadmap().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_from_config_missing_manifest() {
    let config = Config {
        manifest: syllabus_test::tempdir().path().join("manifest.yml"),
        ..Config::default()
    };
    assert!(ContentService::from_config(&config).is_err());
}

#[tokio::test]
async fn test_initialize_preloads() {
    let service = fixture_service();
    assert!(!service.ready());

    let waiter = tokio::spawn({
        let service = service.clone();
        async move { service.wait_ready().await }
    });

    let report = service.initialize().await;
    assert_eq!(
        report.loaded,
        vec![
            ModuleKey::category("fundamentals"),
            ModuleKey::resource(resources::ROADMAP),
        ]
    );
    assert!(report.failures.is_empty());
    assert!(service.ready());
    waiter.await.unwrap();

    assert_eq!(
        service.cached_keys(),
        vec![
            ModuleKey::category("fundamentals"),
            ModuleKey::resource(resources::ROADMAP),
        ]
    );
}

#[tokio::test]
async fn test_initialize_tolerates_preload_failure() {
    syllabus_test::setup();
    let mut registry = registry();
    Instrumented::fixture("catalog/roadmap.json")
        .failing()
        .install(
            &mut registry,
            ModuleKey::resource(resources::ROADMAP),
            ContentShape::Roadmap,
        );
    let service = service_with(registry);

    let report = service.initialize().await;
    assert_eq!(report.loaded, vec![ModuleKey::category("fundamentals")]);
    assert_eq!(report.failures.len(), 1);
    assert!(service.ready());
    assert_eq!(
        service.module_state(&ModuleKey::resource(resources::ROADMAP)),
        ModuleState::Unrequested
    );
}

#[tokio::test]
async fn test_shutdown_waits_for_running_loads() {
    syllabus_test::setup();
    let mut registry = registry();
    let notes = Instrumented::fixture("catalog/notes.json").delayed(Duration::from_millis(100));
    let reads = notes.reads();
    notes.install(
        &mut registry,
        ModuleKey::resource(resources::NOTES),
        ContentShape::Notes,
    );
    let service = service_with(registry);
    service.initialize().await;

    let pending = tokio::spawn({
        let service = service.clone();
        async move { service.notes().await }
    });
    // let the load start
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        service.module_state(&ModuleKey::resource(resources::NOTES)),
        ModuleState::Loading
    );

    service.shutdown().await;
    assert!(!service.ready());
    // the running load completed for its caller, then the cache was emptied
    assert_eq!(pending.await.unwrap().unwrap().len(), 3);
    assert_eq!(service.stats().entry_count, 0);
    assert_eq!(service.notes().await, Err(CacheError::ShutDown));
    assert_eq!(reads.get(), 1);

    service.initialize().await;
    assert_eq!(service.notes().await.unwrap().len(), 3);
    assert_eq!(reads.get(), 2);
}
