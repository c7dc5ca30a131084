use std::time::Duration;

use syllabus_service::caching::{CacheError, ModuleState};
use syllabus_service::catalog::ModuleKey;
use syllabus_service::content::ContentShape;
use syllabus_service::service::MemberFailure;

use crate::utils::{Instrumented, fixture_service, registry, registry_in, service_with};

fn lesson_ids(lessons: &[syllabus_service::content::Lesson]) -> Vec<&str> {
    lessons.iter().map(|lesson| lesson.id.as_str()).collect()
}

#[tokio::test]
async fn test_all_lessons_in_declared_order() {
    let service = fixture_service();

    let lessons = service.all_lessons().await;
    assert_eq!(lessons.len(), 8);
    assert!(lessons[..5].iter().all(|l| l.category == "fundamentals"));
    assert!(lessons[5..].iter().all(|l| l.category == "data-structures"));

    insta::assert_debug_snapshot!(lesson_ids(&lessons), @r###"
    [
        "fundamentals-variables",
        "fundamentals-control-flow",
        "fundamentals-functions",
        "fundamentals-recursion",
        "fundamentals-complexity",
        "ds-arrays",
        "ds-hash-maps",
        "ds-binary-trees",
    ]
    "###);
}

/// The first member completes last, but still comes first in the result.
#[tokio::test]
async fn test_order_independent_of_completion() {
    syllabus_test::setup();
    let mut registry = registry();
    Instrumented::fixture("catalog/categories/fundamentals.json")
        .delayed(Duration::from_millis(200))
        .install(
            &mut registry,
            ModuleKey::category("fundamentals"),
            ContentShape::Lessons,
        );
    let service = service_with(registry);

    let lessons = service.all_lessons().await;
    assert_eq!(lessons.len(), 8);
    assert_eq!(lessons[0].id, "fundamentals-variables");
    assert_eq!(lessons[4].id, "fundamentals-complexity");
    assert_eq!(lessons[5].id, "ds-arrays");
    assert_eq!(lessons[7].id, "ds-binary-trees");
}

#[tokio::test]
async fn test_partial_failure() {
    syllabus_test::setup();
    let mut registry = registry();
    Instrumented::fixture("catalog/categories/data-structures.json")
        .failing()
        .install(
            &mut registry,
            ModuleKey::category("data-structures"),
            ContentShape::Lessons,
        );
    let service = service_with(registry);

    let report = service.all_lessons_report().await;
    assert!(report.is_partial());
    assert_eq!(report.items.len(), 5);
    assert!(report.items.iter().all(|l| l.category == "fundamentals"));
    insta::assert_debug_snapshot!(report.failures, @r###"
    [
        MemberFailure {
            key: ModuleKey {
                kind: Category,
                identifier: "data-structures",
            },
            error: ReadError(
                "injected failure",
            ),
        },
    ]
    "###);

    // the plain accessor does not surface the failure at all
    assert_eq!(service.all_lessons().await.len(), 5);
    // the failed member is not cached, the other one is
    assert_eq!(
        service.module_state(&ModuleKey::category("data-structures")),
        ModuleState::Unrequested
    );
    assert_eq!(service.stats().entry_count, 1);
}

#[tokio::test]
async fn test_missing_member_file() {
    syllabus_test::setup();
    let content = syllabus_test::fixture_copy("catalog");
    std::fs::remove_file(content.path().join("categories/data-structures.json")).unwrap();
    let service = service_with(registry_in(content.path()));

    let report = service.all_lessons_report().await;
    assert_eq!(report.items.len(), 5);
    assert_eq!(
        report.failures,
        vec![MemberFailure {
            key: ModuleKey::category("data-structures"),
            error: CacheError::NotFound,
        }]
    );
}

#[tokio::test]
async fn test_malformed_member_file() {
    syllabus_test::setup();
    let content = syllabus_test::fixture_copy("catalog");
    std::fs::write(
        content.path().join("categories/fundamentals.json"),
        b"[{\"id\": \"truncated\"",
    )
    .unwrap();
    let service = service_with(registry_in(content.path()));

    let report = service.all_lessons_report().await;
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.items[0].id, "ds-arrays");
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, CacheError::Malformed(_)));
}

#[tokio::test]
async fn test_all_members_failed() {
    syllabus_test::setup();
    let mut registry = registry();
    for id in ["fundamentals", "data-structures"] {
        Instrumented::fixture(&format!("catalog/categories/{id}.json"))
            .failing()
            .install(&mut registry, ModuleKey::category(id), ContentShape::Lessons);
    }
    let service = service_with(registry);

    let report = service.all_lessons_report().await;
    assert!(report.items.is_empty());
    assert!(!report.is_partial());
    assert_eq!(report.failures.len(), 2);

    // an empty collection, not an error
    assert!(service.all_lessons().await.is_empty());
    assert_eq!(service.lesson_by_id("fundamentals-variables").await, None);
}

/// A failed member is retried by the next aggregate call.
#[tokio::test]
async fn test_failed_member_retried() {
    syllabus_test::setup();
    let content = syllabus_test::fixture_copy("catalog");
    let path = content.path().join("categories/data-structures.json");
    let original = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let service = service_with(registry_in(content.path()));

    assert_eq!(service.all_lessons().await.len(), 5);

    std::fs::write(&path, original).unwrap();
    assert_eq!(service.all_lessons().await.len(), 8);
    assert_eq!(service.stats().entry_count, 2);
}
