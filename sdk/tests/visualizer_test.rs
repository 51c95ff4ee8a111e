use cardgraph_core::config::{AppConfig, GraphConfig, LlmConfig, StorageConfig};
use cardgraph_core::model::{Difficulty, EmbeddingRecord, ItemId, NewTopic, PAPER_SOURCE};
use cardgraph_sdk::{Cardgraph, SdkError};
use graph::decorate::group_color;
use graph::topics::PAPER_COLOR;
use graph::{GraphError, JsonFileSink};
use std::path::Path;
use tempfile::tempdir;

fn config_in(dir: &Path) -> AppConfig {
    AppConfig {
        storage: StorageConfig {
            data_dir: dir.join("data").display().to_string(),
            embeddings_dir: dir.join("data/embeddings").display().to_string(),
            wal_file: "cards.wal".to_string(),
        },
        graph: GraphConfig::default(),
        llm: LlmConfig::default(),
    }
}

#[tokio::test]
async fn test_embedding_graph_end_to_end() {
    let dir = tempdir().unwrap();
    let app = Cardgraph::open(config_in(dir.path())).await.unwrap();

    let embeddings = app.config().storage.embeddings_path();
    tokio::fs::create_dir_all(&embeddings).await.unwrap();
    tokio::fs::write(
        embeddings.join("a_databases.json"),
        r#"[{"id": 1, "vector": [1.0, 0.0]}, {"id": 2, "vector": [1.0, 0.0]}]"#,
    )
    .await
    .unwrap();
    app.store()
        .write_source("b_docker", vec![EmbeddingRecord::new(3u64, vec![0.0, 1.0])])
        .await
        .unwrap();

    let view = app.visualizer().embedding_graph(None).await.unwrap();
    assert_eq!(view.graph.node_count(), 3);
    assert_eq!(view.graph.edge_count(), 1);
    assert!(view.graph.has_edge(&ItemId::Int(1), &ItemId::Int(2)));

    let node = |id: u64| view.attributed.node(&ItemId::Int(id)).unwrap();
    assert_eq!(node(1).color, group_color(1));
    assert_eq!(node(3).color, group_color(2));
    assert_eq!(node(3).group, Some(2));
    assert!(node(1).size > node(3).size);
    for n in &view.attributed.nodes {
        assert!((15.0..=50.0).contains(&n.size));
    }

    let out = dir.path().join("graph.json");
    let sink = JsonFileSink::new(&out);
    app.visualizer().render(&view, &sink).await.unwrap();
    let rendered: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&out).await.unwrap()).unwrap();
    assert_eq!(rendered["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(rendered["directed"], false);
}

#[tokio::test]
async fn test_missing_store_gives_empty_view() {
    let dir = tempdir().unwrap();
    let app = Cardgraph::open(config_in(dir.path())).await.unwrap();

    let view = app.visualizer().embedding_graph(Some(0.3)).await.unwrap();
    assert!(view.is_empty());
    assert!(view.attributed.edges.is_empty());
}

#[tokio::test]
async fn test_mixed_dimensions_fail_the_build() {
    let dir = tempdir().unwrap();
    let app = Cardgraph::open(config_in(dir.path())).await.unwrap();
    app.store()
        .write_source(
            "mixed",
            vec![
                EmbeddingRecord::new(1u64, vec![1.0, 0.0]),
                EmbeddingRecord::new(2u64, vec![1.0, 0.0, 0.0]),
            ],
        )
        .await
        .unwrap();

    let err = app.visualizer().embedding_graph(None).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::Graph(GraphError::DimensionMismatch { expected: 2, actual: 3, .. })
    ));
}

#[tokio::test]
async fn test_topic_graph_modes() {
    let dir = tempdir().unwrap();
    let app = Cardgraph::open(config_in(dir.path())).await.unwrap();
    let repo = app.repo();

    let mut attention = NewTopic::new("Attention", "attention", "Weights values by relevance.");
    attention.source = Some(PAPER_SOURCE.to_string());
    attention.embedding = Some(vec![1.0, 0.0]);
    let attention = repo.add_topic(attention).await.unwrap();

    let mut softmax = NewTopic::new("Softmax", "softmax", "Normalizes scores into probabilities.")
        .with_hierarchy(Some("Deep Learning".into()), Some("Fundamentals".into()), None, None);
    softmax.embedding = Some(vec![0.95, 0.05]);
    softmax.difficulty = Difficulty::Advanced;
    let softmax = repo.add_topic(softmax).await.unwrap();

    let similarity = app.visualizer().topic_similarity_graph(None).await.unwrap();
    assert!(similarity.graph.has_edge(&ItemId::Int(attention), &ItemId::Int(softmax)));
    let attention_node = similarity.attributed.node(&ItemId::Int(attention)).unwrap();
    assert_eq!(attention_node.color, PAPER_COLOR);
    assert_eq!(attention_node.title, "Weights values by relevance.");

    let hierarchy = app.visualizer().topic_hierarchy_graph().await.unwrap();
    assert!(hierarchy.attributed.directed);
    assert_eq!(hierarchy.graph.node_count(), 3);
    assert!(!hierarchy.graph.contains_node(&ItemId::Int(attention)));
    assert!(hierarchy.graph.has_edge(&"Fundamentals".into(), &ItemId::Int(softmax)));
    assert_eq!(
        hierarchy.attributed.edges[0].title.as_deref(),
        Some("contains")
    );
}
