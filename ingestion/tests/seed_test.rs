use cardgraph_core::model::{Difficulty, TopicStatus, PAPER_SOURCE};
use ingestion::seed::{
    parse_keyword_text, read_keyword_json, seed_topics_from_json, write_keyword_json, SeedDefaults,
};
use storage::Repository;
use tempfile::tempdir;

const KEYWORDS: &str = "\
Keyword: Scaled Dot-Product Attention
Explanation: Divides query-key products by the square root of the key dimension.
Keyword: Beam Search
Keyword: Residual Dropout
Explanation: Dropout applied to each sub-layer output before the residual add.
";

#[tokio::test]
async fn test_text_to_json_to_topics() {
    let dir = tempdir().unwrap();
    let json_path = dir.path().join("keywords.json");

    let entries = parse_keyword_text(KEYWORDS);
    write_keyword_json(&json_path, &entries).await.unwrap();
    assert_eq!(read_keyword_json(&json_path).await.unwrap(), entries);

    let repo = Repository::open(dir.path().join("cards.wal")).await.unwrap();
    let report = seed_topics_from_json(&repo, &json_path, &SeedDefaults::default())
        .await
        .unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);

    let topics = repo.topics_by_source(PAPER_SOURCE).await;
    assert_eq!(topics.len(), 2);
    let first = &topics[0];
    assert_eq!(first.topic_name, "Scaled Dot-Product Attention");
    assert_eq!(first.keyword, first.topic_name);
    assert_eq!(first.difficulty, Difficulty::Advanced);
    assert_eq!(first.importance_level, 5);
    assert_eq!(first.status, TopicStatus::Unknown);
    assert!(first.embedding.is_none());
}

#[tokio::test]
async fn test_seed_rejects_malformed_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let repo = Repository::open(dir.path().join("cards.wal")).await.unwrap();
    assert!(seed_topics_from_json(&repo, &path, &SeedDefaults::default()).await.is_err());
    assert!(repo.all_topics().await.is_empty());
}

#[tokio::test]
async fn test_seed_files_topics_under_default_hierarchy() {
    let dir = tempdir().unwrap();
    let json_path = dir.path().join("keywords.json");
    write_keyword_json(&json_path, &parse_keyword_text(KEYWORDS)).await.unwrap();

    let defaults = SeedDefaults::default().with_hierarchy(
        Some("Machine Learning".to_string()),
        Some("NLP".to_string()),
        Some("Transformers".to_string()),
        None,
    );
    let repo = Repository::open(dir.path().join("cards.wal")).await.unwrap();
    seed_topics_from_json(&repo, &json_path, &defaults).await.unwrap();

    let topics = repo.topics_by_category("Machine Learning").await;
    assert_eq!(topics.len(), 2);
    for topic in &topics {
        assert_eq!(topic.sub_category_1.as_deref(), Some("NLP"));
        assert_eq!(topic.sub_category_2.as_deref(), Some("Transformers"));
        assert_eq!(topic.sub_category_3, None);
        assert_eq!(
            topic.hierarchy_path(),
            vec!["Machine Learning", "NLP", "Transformers"]
        );
    }
}
