//! SQLite 存储集成测试

use adaptive_quiz_lib::answer_service::{AnswerService, AnswerSubmission};
use adaptive_quiz_lib::difficulty_reward::DifficultyRewardEngine;
use adaptive_quiz_lib::knowledge_graph::models::default_catalog;
use adaptive_quiz_lib::models::{Question, QuestionSource};
use adaptive_quiz_lib::storage::{QuizStore, SqliteStore, StoreError};
use assert_matches::assert_matches;
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_store() -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("nested").join("quiz.db");
    let store = SqliteStore::open(&db_path).expect("Failed to open store");
    (store, temp_dir)
}

fn sample_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: "What is 15% of 80?".to_string(),
        options: vec!["12".into(), "10".into(), "15".into(), "8".into()],
        correct_answer: "12".to_string(),
        difficulty: 5,
        subject: "math".to_string(),
        source: QuestionSource::AiCorrected,
        topic_id: None,
        created_at: Utc::now(),
    }
}

#[test]
fn test_question_roundtrip_preserves_fields() {
    let (store, _dir) = create_test_store();
    let question = sample_question("q-1");
    store.put_question(&question).unwrap();

    let loaded = store.get_question("q-1").unwrap().expect("question exists");
    assert_eq!(loaded.text, question.text);
    assert_eq!(loaded.options, question.options);
    assert_eq!(loaded.correct_answer, "12");
    assert_eq!(loaded.difficulty, 5);
    assert_eq!(loaded.source, QuestionSource::AiCorrected);
    assert_eq!(loaded.topic_id, None);
    assert_eq!(
        loaded.created_at.timestamp_millis(),
        question.created_at.timestamp_millis()
    );

    assert!(store.get_question("q-missing").unwrap().is_none());
}

#[test]
fn test_topic_is_filled_only_once() {
    let (store, _dir) = create_test_store();
    store.put_question(&sample_question("q-2")).unwrap();

    let first = store
        .fill_question_topic("q-2", "topic-math-percentages")
        .unwrap();
    assert_eq!(first, "topic-math-percentages");

    let second = store
        .fill_question_topic("q-2", "topic-math-fractions")
        .unwrap();
    assert_eq!(second, "topic-math-percentages");

    let err = store
        .fill_question_topic("q-unknown", "topic-math-fractions")
        .unwrap_err();
    assert_matches!(err, StoreError::NotFound { .. });
}

#[test]
fn test_catalog_seed_and_subject_query() {
    let (store, _dir) = create_test_store();
    let catalog = default_catalog();
    let seeded = store.seed_topics(&catalog).unwrap();
    assert_eq!(seeded, catalog.len());

    // 重复播种是 upsert
    store.seed_topics(&catalog).unwrap();

    let math = store.topics_by_subject("math").unwrap();
    assert_eq!(math.len(), 9);
    let slugs: Vec<&str> = math.iter().map(|t| t.slug.as_str()).collect();
    let mut sorted = slugs.clone();
    sorted.sort();
    assert_eq!(slugs, sorted);

    let percentages = store
        .get_topic("topic-math-percentages")
        .unwrap()
        .expect("seeded");
    assert!(percentages.prerequisites.contains("topic-math-fractions"));
    assert!(percentages.prerequisites.contains("topic-math-decimals"));
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quiz.db");

    {
        let store = SqliteStore::open(&db_path).unwrap();
        store.seed_topics(&default_catalog()).unwrap();
        store.put_question(&sample_question("q-3")).unwrap();
    }

    let store = Arc::new(SqliteStore::open(&db_path).unwrap());
    assert_eq!(store.db_path(), Some(db_path.as_path()));

    let service = AnswerService::new(store.clone(), DifficultyRewardEngine::default());
    let outcome = service
        .submit(&AnswerSubmission {
            question_id: "q-3".to_string(),
            user_id: "learner".to_string(),
            user_answer: "12".to_string(),
            confidence: Some(0.8),
            time_spent_secs: 30.0,
            current_difficulty: 5.0,
            streak: 1,
        })
        .unwrap();

    assert!(outcome.is_correct);
    assert_eq!(outcome.topic_id, "topic-math-percentages");

    let mastery = store
        .get_mastery("learner", "topic-math-percentages")
        .unwrap()
        .expect("mastery row");
    assert_eq!(mastery.attempted, 1);
    assert_eq!(mastery.correct, 1);
    assert_eq!(mastery.mastery_level, 1.0);
    assert_eq!(store.masteries_for_user("learner").unwrap().len(), 1);
}

#[test]
fn test_concurrent_updates_do_not_lose_attempts() {
    let (store, _dir) = create_test_store();
    let store = Arc::new(store);
    let service = Arc::new(AnswerService::new(
        store.clone(),
        DifficultyRewardEngine::default(),
    ));

    let mut question = sample_question("q-4");
    question.topic_id = Some("topic-math-percentages".to_string());
    store.put_question(&question).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                for j in 0..5 {
                    let answer = if (i + j) % 2 == 0 { "12" } else { "10" };
                    service
                        .submit(&AnswerSubmission {
                            question_id: "q-4".to_string(),
                            user_id: "racer".to_string(),
                            user_answer: answer.to_string(),
                            confidence: None,
                            time_spent_secs: 10.0,
                            current_difficulty: 5.0,
                            streak: 0,
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mastery = store
        .get_mastery("racer", "topic-math-percentages")
        .unwrap()
        .unwrap();
    assert_eq!(mastery.attempted, 20);
    assert_eq!(mastery.correct, 10);
    assert_eq!(mastery.mastery_level, 0.5);
}
