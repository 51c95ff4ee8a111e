//! Graph modes over stored topics: embedding similarity between topics, and
//! the category tree the topics are filed under.

use crate::builder::{BuildItem, Directedness, NodeMeta, SimilarityGraph, SimilarityGraphBuilder};
use crate::error::GraphError;
use cardgraph_core::model::{Difficulty, ItemId, Topic, PAPER_SOURCE};

pub const PAPER_COLOR: &str = "green";
pub const CATEGORY_COLOR: &str = "yellow";
pub const SUB_CATEGORY_COLORS: [&str; 3] = ["#ffcccc", "#ff9999", "#ff6666"];
pub const CONTAINS_RELATION: &str = "contains";

pub fn difficulty_color(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Basic => "#add8e6",
        Difficulty::Intermediate => "#6495ed",
        Difficulty::Advanced => "#0000ff",
    }
}

fn topic_meta(topic: &Topic, color: &str) -> NodeMeta {
    NodeMeta::labeled(topic.topic_name.clone())
        .with_explanation(topic.explanation.clone())
        .with_color(color)
}

/// Every named topic becomes a node; only topics with an embedding are
/// compared. Paper-sourced topics are colored apart from the rest.
pub fn topic_similarity_graph(
    topics: &[Topic],
    builder: &SimilarityGraphBuilder,
) -> Result<SimilarityGraph, GraphError> {
    let items = topics
        .iter()
        .filter(|topic| !topic.topic_name.is_empty())
        .map(|topic| {
            let color = if topic.is_from_source(PAPER_SOURCE) {
                PAPER_COLOR
            } else {
                difficulty_color(topic.difficulty)
            };
            BuildItem::new(
                ItemId::Int(topic.id),
                topic.embedding.as_deref(),
                topic_meta(topic, color),
            )
        });

    builder.build_with_meta(items)
}

/// Directed `contains` tree: category -> sub-categories -> topic. Category
/// levels are keyed by name (shared across topics), topics by id. Each node
/// hangs off its deepest present ancestor, so a gap in the path skips a level
/// instead of dangling. Paper-sourced topics are left out.
pub fn topic_hierarchy_graph(topics: &[Topic]) -> SimilarityGraph {
    let mut graph = SimilarityGraph::new(Directedness::Directed);

    for topic in topics.iter().filter(|t| !t.is_from_source(PAPER_SOURCE)) {
        let levels = [
            topic.category.as_deref(),
            topic.sub_category_1.as_deref(),
            topic.sub_category_2.as_deref(),
            topic.sub_category_3.as_deref(),
        ];

        let mut parent: Option<ItemId> = None;
        for (depth, name) in levels.into_iter().enumerate() {
            let Some(name) = name.filter(|n| !n.is_empty()) else {
                continue;
            };
            let id = ItemId::from(name);
            if !graph.contains_node(&id) {
                let color = match depth {
                    0 => CATEGORY_COLOR,
                    d => SUB_CATEGORY_COLORS[d - 1],
                };
                graph.upsert_node(id.clone(), NodeMeta::labeled(name).with_color(color));
                if let Some(parent) = &parent {
                    graph.add_edge(parent, &id, 1.0, Some(CONTAINS_RELATION.to_string()));
                }
            }
            parent = Some(id);
        }

        if topic.topic_name.is_empty() {
            continue;
        }
        let id = ItemId::Int(topic.id);
        graph.upsert_node(id.clone(), topic_meta(topic, difficulty_color(topic.difficulty)));
        if let Some(parent) = &parent {
            graph.add_edge(parent, &id, 1.0, Some(CONTAINS_RELATION.to_string()));
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "topic hierarchy built"
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgraph_core::model::NewTopic;

    fn topic(id: u64, name: &str, path: [Option<&str>; 4]) -> Topic {
        NewTopic::new(name, name.to_lowercase(), format!("About {name}."))
            .with_hierarchy(
                path[0].map(String::from),
                path[1].map(String::from),
                path[2].map(String::from),
                path[3].map(String::from),
            )
            .into_topic(id)
    }

    #[test]
    fn hierarchy_links_levels_with_contains() {
        let topics = vec![
            topic(1, "Dropout", [Some("ML"), Some("Deep Learning"), Some("Regularization"), None]),
            topic(2, "Weight Decay", [Some("ML"), Some("Deep Learning"), Some("Regularization"), None]),
        ];
        let graph = topic_hierarchy_graph(&topics);

        assert!(graph.is_directed());
        assert_eq!(graph.node_count(), 5);
        assert!(graph.has_edge(&"ML".into(), &"Deep Learning".into()));
        assert!(graph.has_edge(&"Deep Learning".into(), &"Regularization".into()));
        assert!(graph.has_edge(&"Regularization".into(), &ItemId::Int(1)));
        assert!(graph.has_edge(&"Regularization".into(), &ItemId::Int(2)));
        assert!(graph
            .edges()
            .iter()
            .all(|e| e.relation.as_deref() == Some(CONTAINS_RELATION) && e.weight == 1.0));
    }

    #[test]
    fn hierarchy_skips_missing_levels_and_paper_topics() {
        let mut paper = topic(3, "Attention", [Some("ML"), None, None, None]);
        paper.source = Some(PAPER_SOURCE.to_string());
        let topics = vec![topic(1, "Bagging", [Some("ML"), None, Some("Ensembles"), None]), paper];
        let graph = topic_hierarchy_graph(&topics);

        assert!(graph.has_edge(&"ML".into(), &"Ensembles".into()));
        assert!(graph.has_edge(&"Ensembles".into(), &ItemId::Int(1)));
        assert!(!graph.contains_node(&ItemId::Int(3)));
        assert_eq!(
            graph.node(&"Ensembles".into()).unwrap().meta.color.as_deref(),
            Some(SUB_CATEGORY_COLORS[1])
        );
    }

    #[test]
    fn topic_similarity_colors_and_embeddings() {
        let mut a = topic(1, "Attention", [None; 4]);
        a.embedding = Some(vec![1.0, 0.0]);
        a.source = Some(PAPER_SOURCE.to_string());
        let mut b = topic(2, "Self-Attention", [None; 4]);
        b.embedding = Some(vec![0.9, 0.1]);
        b.difficulty = Difficulty::Intermediate;
        let c = topic(3, "Pooling", [None; 4]);

        let builder = SimilarityGraphBuilder::new(0.7).unwrap();
        let graph = topic_similarity_graph(&[a, b, c], &builder).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge(&ItemId::Int(1), &ItemId::Int(2)));
        let color = |id: u64| graph.node(&ItemId::Int(id)).unwrap().meta.color.clone();
        assert_eq!(color(1).as_deref(), Some(PAPER_COLOR));
        assert_eq!(color(2).as_deref(), Some("#6495ed"));
        assert_eq!(color(3).as_deref(), Some("#add8e6"));
    }
}
