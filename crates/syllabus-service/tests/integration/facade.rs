use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use syllabus_service::caching::{CacheError, ModuleState};
use syllabus_service::catalog::ModuleKey;
use syllabus_service::content::{ContentShape, Difficulty, ModuleContents};
use syllabus_service::service::resources;

use crate::utils::{Instrumented, fixture_service, registry, service_with};

#[tokio::test]
async fn test_concurrent_notes_single_read() {
    syllabus_test::setup();
    let mut registry = registry();
    let notes = Instrumented::fixture("catalog/notes.json").delayed(Duration::from_millis(50));
    let reads = notes.reads();
    notes.install(
        &mut registry,
        ModuleKey::resource(resources::NOTES),
        ContentShape::Notes,
    );
    let service = service_with(registry);

    let results = join_all((0..10).map(|_| service.notes())).await;

    assert_eq!(reads.get(), 1);
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.len(), 3);
    for result in &results {
        assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
    }
}

#[tokio::test]
async fn test_concurrent_callers_on_tasks() {
    syllabus_test::setup();
    let mut registry = registry();
    let quizzes = Instrumented::fixture("catalog/quizzes.json").delayed(Duration::from_millis(50));
    let reads = quizzes.reads();
    quizzes.install(
        &mut registry,
        ModuleKey::resource(resources::QUIZZES),
        ContentShape::Quizzes,
    );
    let service = service_with(registry);

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.quizzes().await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().len(), 2);
    }
    assert_eq!(reads.get(), 1);
}

#[tokio::test]
async fn test_evict_then_single_refetch() {
    syllabus_test::setup();
    let mut registry = registry();
    let roadmap = Instrumented::fixture("catalog/roadmap.json");
    let reads = roadmap.reads();
    roadmap.install(
        &mut registry,
        ModuleKey::resource(resources::ROADMAP),
        ContentShape::Roadmap,
    );
    let service = service_with(registry);
    let key = ModuleKey::resource(resources::ROADMAP);

    for _ in 0..3 {
        assert_eq!(service.roadmap().await.unwrap().len(), 3);
    }
    assert_eq!(reads.get(), 1);
    assert_eq!(service.module_state(&key), ModuleState::Cached);

    assert_eq!(service.evict(&[key.clone()]), 1);
    assert_eq!(service.module_state(&key), ModuleState::Unrequested);

    join_all((0..5).map(|_| service.roadmap())).await;
    assert_eq!(reads.get(), 2);
}

#[tokio::test]
async fn test_single_key_errors_propagate() {
    syllabus_test::setup();
    let mut registry = registry();
    Instrumented::fixture("catalog/design-patterns.json")
        .failing()
        .install(
            &mut registry,
            ModuleKey::resource(resources::DESIGN_PATTERNS),
            ContentShape::DesignPatterns,
        );
    let service = service_with(registry);

    assert_eq!(
        service.design_patterns().await,
        Err(CacheError::ReadError("injected failure".into()))
    );
    assert_eq!(
        service.design_pattern_by_id("observer").await,
        Err(CacheError::ReadError("injected failure".into()))
    );
    // other resources are unaffected
    assert_eq!(service.interview_questions().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_unknown_category_falls_back() {
    let service = fixture_service();

    let fallback = service.lessons_in_category("astrology").await.unwrap();
    let fundamentals = service.lessons_in_category("fundamentals").await.unwrap();
    assert_eq!(fallback.len(), 5);
    // both resolve to one cache entry
    assert!(Arc::ptr_eq(&fallback, &fundamentals));
    assert_eq!(service.cached_keys(), vec![ModuleKey::category("fundamentals")]);
}

#[tokio::test]
async fn test_topics() {
    let service = fixture_service();

    let arrays = service.topic("arrays").await.unwrap();
    assert_eq!(arrays.shape(), ContentShape::CodingQuestions);
    assert_eq!(arrays.len(), 2);

    // unknown topics fall back to the arrays topic
    let graphs = service.topic("graphs").await.unwrap();
    assert!(Arc::ptr_eq(&arrays, &graphs));

    let ModuleContents::CodingQuestions(questions) = &*arrays else {
        panic!("unexpected topic contents");
    };
    assert_eq!(questions[0].id, "two-sum");
}

#[tokio::test]
async fn test_unknown_resource() {
    let service = fixture_service();
    let result = service.module(&ModuleKey::resource("flashcards")).await;
    assert_eq!(result, Err(CacheError::NotFound));
    assert_eq!(service.stats().entry_count, 0);
}

#[tokio::test]
async fn test_filters() {
    let service = fixture_service();

    let patterns = service.notes_by_category("patterns").await.unwrap();
    insta::assert_debug_snapshot!(
        patterns.iter().map(|note| note.id.as_str()).collect::<Vec<_>>(),
        @r###"
    [
        "note-two-pointers",
        "note-sliding-window",
    ]
    "###
    );

    let medium = service
        .questions_by_difficulty(Difficulty::Medium)
        .await
        .unwrap();
    let medium: Vec<_> = medium.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(medium, ["iq-deadlock", "iq-index"]);

    let hashing = service.coding_questions_by_tag("Hashing").await.unwrap();
    let hashing: Vec<_> = hashing.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(hashing, ["two-sum", "lru-cache"]);

    let found = service.search_lessons("recursi").await;
    let found: Vec<_> = found.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(found, ["fundamentals-recursion", "ds-binary-trees"]);
}

#[tokio::test]
async fn test_lookups_by_id() {
    let service = fixture_service();

    let lesson = service.lesson_by_id("ds-hash-maps").await.unwrap();
    assert_eq!(lesson.title, "Hash Maps");
    assert_eq!(lesson.difficulty, Some(Difficulty::Medium));
    assert_eq!(service.lesson_by_id("no-such-lesson").await, None);

    let note = service.note_by_id("note-stack-vs-heap").await.unwrap();
    assert_eq!(note.map(|n| n.category), Some("Memory".to_owned()));
    assert_eq!(service.note_by_id("missing").await, Ok(None));

    let quiz = service.quiz_by_id("quiz-complexity").await.unwrap().unwrap();
    assert_eq!(quiz.questions.len(), 2);
    assert_eq!(quiz.questions[1].answer, 0);

    let question = service.interview_question_by_id("iq-cap").await.unwrap();
    assert_eq!(question.and_then(|q| q.difficulty), Some(Difficulty::Hard));

    let pattern = service.design_pattern_by_id("adapter").await.unwrap();
    assert_eq!(pattern.map(|p| p.category), Some("structural".to_owned()));

    let problem = service.coding_question_by_id("lru-cache").await.unwrap();
    assert_eq!(problem.map(|p| p.title), Some("LRU Cache".to_owned()));

    let node = service.roadmap_node("step-algorithms").await.unwrap().unwrap();
    insta::assert_debug_snapshot!(node.prerequisites, @r###"
    [
        "step-data-structures",
    ]
    "###);
}

#[tokio::test]
async fn test_stats_and_clear() {
    let service = fixture_service();

    service.notes().await.unwrap();
    service.quizzes().await.unwrap();
    service.all_lessons().await;
    // failed loads never count
    service.module(&ModuleKey::resource("flashcards")).await.unwrap_err();

    let stats = service.stats();
    assert_eq!(stats.entry_count, 4);
    assert!(stats.approximate_size_bytes > 0);

    let keep = [ModuleKey::resource(resources::NOTES)];
    assert_eq!(service.clear(&keep), 3);
    assert_eq!(service.cached_keys(), keep);

    let remaining = service.stats();
    assert_eq!(remaining.entry_count, 1);
    assert!(remaining.approximate_size_bytes < stats.approximate_size_bytes);
}
