use cardgraph_core::config::LlmConfig;
use cardgraph_core::model::{Difficulty, NewFlashcard, TopicStatus};
use ingestion::drafting::{
    DraftError, FlashcardDrafter, KeywordExplainer, TopicDrafter, TopicOutline, GENERATED_SOURCE,
    NO_EXPLANATION,
};
use ingestion::llm::ScriptedCompletionClient;
use ingestion::seed::read_topic_outlines;
use std::sync::Arc;
use storage::Repository;
use tempfile::tempdir;

#[tokio::test]
async fn test_generate_flashcards_skips_rejected_drafts() {
    let dir = tempdir().unwrap();
    let repo = Arc::new(Repository::open(dir.path().join("cards.wal")).await.unwrap());
    repo.add_flashcard(NewFlashcard::new(
        "What is a primary key in SQL?",
        "A column set that uniquely identifies each row.",
        "Databases",
        Difficulty::Basic,
    ))
    .await
    .unwrap();

    let client = Arc::new(ScriptedCompletionClient::new([
        "Question: WHAT IS A PRIMARY KEY IN SQL?\nAnswer: A column that uniquely identifies each row.",
        "I cannot help with that.",
        "Question: How does a B-tree index speed up lookups?\nAnswer: It keeps keys sorted in a balanced tree, so lookups take logarithmic time.",
        "Question: What does a foreign key constraint enforce?\nAnswer: That a column value must exist as a key in the referenced table.",
    ]));
    let drafter = FlashcardDrafter::new(client.clone(), repo.clone(), LlmConfig::default());

    let created = drafter
        .generate_flashcards("Databases", Difficulty::Intermediate, 2)
        .await
        .unwrap();

    assert_eq!(created, 2);
    assert_eq!(client.requests().len(), 4);

    let cards = repo.flashcards_by_category("Databases", None).await;
    assert_eq!(cards.len(), 3);
    assert!(cards
        .iter()
        .any(|c| c.question == "How does a B-tree index speed up lookups?"
            && c.difficulty == Difficulty::Intermediate));
}

#[tokio::test]
async fn test_generate_flashcards_gives_up_after_twice_the_count() {
    let dir = tempdir().unwrap();
    let repo = Arc::new(Repository::open(dir.path().join("cards.wal")).await.unwrap());
    let client = Arc::new(ScriptedCompletionClient::new([
        "Question: Short?\nAnswer: Long enough answer text here.",
        "Question: Another question that is long enough?\nAnswer: tiny",
        "Question: This one is never requested at all?\nAnswer: Because the attempt budget is spent.",
    ]));
    let drafter = FlashcardDrafter::new(client.clone(), repo.clone(), LlmConfig::default());

    let created = drafter
        .generate_flashcards("Docker", Difficulty::Basic, 1)
        .await
        .unwrap();

    assert_eq!(created, 0);
    assert_eq!(client.requests().len(), 2);
    assert!(repo.all_flashcards().await.is_empty());
}

#[tokio::test]
async fn test_draft_answer_requires_answer_marker() {
    let dir = tempdir().unwrap();
    let repo = Arc::new(Repository::open(dir.path().join("cards.wal")).await.unwrap());
    let client = Arc::new(ScriptedCompletionClient::new([
        "Question: What is MVCC?\nAnswer: Multi-version concurrency control keeps row versions per transaction.",
        "MVCC keeps several versions of each row.",
    ]));
    let drafter = FlashcardDrafter::new(client.clone(), repo, LlmConfig::default());

    let answer = drafter
        .draft_answer("What is MVCC?", "Databases", Difficulty::Intermediate)
        .await
        .unwrap();
    assert!(answer.starts_with("Multi-version concurrency control"));
    assert!(client.requests()[0].user_text().contains("What is MVCC?"));

    let err = drafter
        .draft_answer("What is MVCC?", "Databases", Difficulty::Intermediate)
        .await
        .unwrap_err();
    assert!(matches!(err, DraftError::MalformedResponse(_)));
}

fn outline() -> TopicOutline {
    TopicOutline {
        category: "Deep Learning".to_string(),
        sub_category_1: Some("Training".to_string()),
        sub_category_2: Some("Optimization".to_string()),
        sub_category_3: Some("Gradient Descent".to_string()),
        difficulty: Difficulty::Intermediate,
    }
}

#[tokio::test]
async fn test_create_topics_files_entries_under_outline() {
    let dir = tempdir().unwrap();
    let repo = Arc::new(Repository::open(dir.path().join("cards.wal")).await.unwrap());
    let reply = r#"```json
[
  {"topic_name": "Momentum", "keyword": "momentum", "explanation": "Accumulates past gradients.", "importance_level": "4", "status": "learning"},
  {"topic_name": "Learning Rate Schedule", "explanation": "Changes the step size over training."}
]
```"#;
    let client = Arc::new(ScriptedCompletionClient::new([reply]));
    let drafter = TopicDrafter::new(client.clone(), repo.clone(), LlmConfig::default());

    let ids = drafter.create_topics(&outline(), 2).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(client.requests()[0].max_tokens, LlmConfig::default().topic_max_tokens);

    let momentum = repo.get_topic(ids[0]).await.unwrap();
    assert_eq!(momentum.importance_level, 4);
    assert_eq!(momentum.status, TopicStatus::Learning);
    assert_eq!(momentum.source.as_deref(), Some(GENERATED_SOURCE));
    assert_eq!(
        momentum.hierarchy_path(),
        vec!["Deep Learning", "Training", "Optimization", "Gradient Descent"]
    );

    let schedule = repo.get_topic(ids[1]).await.unwrap();
    assert_eq!(schedule.keyword, "learning_rate_schedule");
    assert_eq!(schedule.importance_level, 3);
    assert_eq!(schedule.difficulty, Difficulty::Intermediate);
    assert!(schedule.added_date.is_some());
}

#[tokio::test]
async fn test_create_topics_rejects_incomplete_batch() {
    let dir = tempdir().unwrap();
    let repo = Arc::new(Repository::open(dir.path().join("cards.wal")).await.unwrap());
    let client = Arc::new(ScriptedCompletionClient::new([
        r#"[{"topic_name": "Adam", "explanation": "Adaptive moments."}, {"topic_name": "RMSProp"}]"#,
        r#"{"topic_name": "Not an array"}"#,
    ]));
    let drafter = TopicDrafter::new(client, repo.clone(), LlmConfig::default());

    assert!(drafter.create_topics(&outline(), 2).await.is_err());
    assert!(drafter.create_topics(&outline(), 1).await.is_err());
    assert!(repo.all_topics().await.is_empty());
}

#[tokio::test]
async fn test_keyword_explainer_falls_back_on_failure() {
    let client = Arc::new(ScriptedCompletionClient::new(["Scaled dot-product attention weights values."]));
    client.push_failure("service unavailable");
    let explainer = KeywordExplainer::new(client, LlmConfig::default());

    assert_eq!(
        explainer.explain("attention", "Attention maps queries.").await,
        "Scaled dot-product attention weights values."
    );
    assert_eq!(explainer.explain("attention", "").await, NO_EXPLANATION);
}

#[tokio::test]
async fn test_keyword_filter_keeps_model_selection() {
    let client = Arc::new(ScriptedCompletionClient::new(["Label Smoothing, Beam Search"]));
    let explainer = KeywordExplainer::new(client.clone(), LlmConfig::default());
    let candidates = vec![
        "Label Smoothing".to_string(),
        "Vaswani".to_string(),
        "Beam Search".to_string(),
        "2017".to_string(),
    ];

    let kept = explainer.filter_keywords(&candidates).await;
    assert_eq!(kept, vec!["Label Smoothing".to_string(), "Beam Search".to_string()]);

    let request = &client.requests()[0];
    assert_eq!(request.temperature, 0.0);
    assert!(request.user_text().contains("Vaswani"));
}

#[tokio::test]
async fn test_keyword_filter_returns_input_on_failure() {
    let client = Arc::new(ScriptedCompletionClient::default());
    client.push_failure("rate limited");
    let explainer = KeywordExplainer::new(client, LlmConfig::default());
    let candidates = vec!["Residual Dropout".to_string(), "Adam".to_string()];

    assert_eq!(explainer.filter_keywords(&candidates).await, candidates);
    // Exhausted script behaves like an unreachable backend.
    assert_eq!(explainer.filter_keywords(&candidates).await, candidates);
}

#[tokio::test]
async fn test_outline_file_drafts_one_topic_per_entry() {
    let dir = tempdir().unwrap();
    let outlines_path = dir.path().join("topics.json");
    tokio::fs::write(
        &outlines_path,
        r#"[
  {"category": "Deep Learning", "sub_category_1": "Training", "sub_category_2": "Optimization", "sub_category_3": "Momentum", "difficulty": "basic"},
  {"category": "Deep Learning", "sub_category_1": "Architectures", "sub_category_2": null, "sub_category_3": null, "difficulty": "advanced"},
  {"category": "Statistics", "difficulty": "intermediate"}
]"#,
    )
    .await
    .unwrap();

    let outlines = read_topic_outlines(&outlines_path).await.unwrap();
    assert_eq!(outlines.len(), 3);
    assert_eq!(outlines[2].sub_category_1, None);

    let repo = Arc::new(Repository::open(dir.path().join("cards.wal")).await.unwrap());
    let client = Arc::new(ScriptedCompletionClient::new([
        r#"[{"topic_name": "Nesterov Momentum", "explanation": "Looks ahead before applying the gradient."}]"#,
        "not json at all",
        r#"[{"topic_name": "Bayes Theorem", "explanation": "Relates conditional probabilities."}]"#,
    ]));
    let drafter = TopicDrafter::new(client.clone(), repo.clone(), LlmConfig::default());

    let report = drafter.create_from_outlines(&outlines).await.unwrap();
    assert_eq!(report.topic_ids.len(), 2);
    assert_eq!(report.failed, 1);
    assert_eq!(client.requests().len(), 3);
    assert!(client.requests()[0].user_text().contains("1 unique topics"));

    let nesterov = repo.get_topic(report.topic_ids[0]).await.unwrap();
    assert_eq!(nesterov.difficulty, Difficulty::Basic);
    assert_eq!(
        nesterov.hierarchy_path(),
        vec!["Deep Learning", "Training", "Optimization", "Momentum"]
    );
    let bayes = repo.get_topic(report.topic_ids[1]).await.unwrap();
    assert_eq!(bayes.hierarchy_path(), vec!["Statistics"]);
    assert_eq!(bayes.difficulty, Difficulty::Intermediate);
}

#[tokio::test]
async fn test_outline_file_with_unknown_difficulty_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("topics.json");
    tokio::fs::write(&path, r#"[{"category": "Statistics", "difficulty": "expert"}]"#)
        .await
        .unwrap();

    assert!(read_topic_outlines(&path).await.is_err());
}
