use crate::error::SdkError;
use cardgraph_core::config::GraphConfig;
use graph::topics::{topic_hierarchy_graph, topic_similarity_graph};
use graph::{
    AttributedGraph, CentralityRanker, CentralityScore, ColorScheme, GraphDecorator, RenderSink,
    SimilarityGraph, SimilarityGraphBuilder, SizeRange,
};
use std::sync::Arc;
use storage::{EmbeddingStore, Repository};

/// A ranked, decorated graph ready for a render sink.
#[derive(Debug, Clone)]
pub struct GraphView {
    pub graph: SimilarityGraph,
    pub scores: CentralityScore,
    pub attributed: AttributedGraph,
}

impl GraphView {
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

pub struct Visualizer {
    repo: Arc<Repository>,
    store: Arc<EmbeddingStore>,
    config: GraphConfig,
}

impl Visualizer {
    pub fn new(repo: Arc<Repository>, store: Arc<EmbeddingStore>, config: GraphConfig) -> Self {
        Self {
            repo,
            store,
            config,
        }
    }

    fn ranker(&self) -> Result<CentralityRanker, SdkError> {
        Ok(CentralityRanker::from_config(&self.config)?)
    }

    fn decorator(&self) -> Result<GraphDecorator, SdkError> {
        Ok(GraphDecorator::new(SizeRange::from_config(&self.config)?))
    }

    /// Graph over every stored embedding source, colored by source. An
    /// unavailable store yields an empty view.
    pub async fn embedding_graph(&self, threshold: Option<f64>) -> Result<GraphView, SdkError> {
        let builder = match threshold {
            Some(t) => SimilarityGraphBuilder::new(t)?,
            None => SimilarityGraphBuilder::from_config(&self.config)?,
        };
        let loaded = self.store.load_all_or_empty().await;
        if loaded.is_empty() {
            tracing::info!(dir = %self.store.dir().display(), "no embeddings found");
        }

        let graph = builder.build(&loaded.records)?;
        let scores = self.ranker()?.rank(&graph);
        let attributed =
            self.decorator()?
                .decorate(&graph, &scores, &ColorScheme::Groups(&loaded.groups));

        Ok(GraphView {
            graph,
            scores,
            attributed,
        })
    }

    pub async fn topic_similarity_graph(&self, threshold: Option<f64>) -> Result<GraphView, SdkError> {
        let builder = match threshold {
            Some(t) => SimilarityGraphBuilder::new(t)?,
            None => SimilarityGraphBuilder::topics_from_config(&self.config)?,
        };
        let topics = self.repo.all_topics().await;
        let graph = topic_similarity_graph(&topics, &builder)?;
        self.finish(graph)
    }

    pub async fn topic_hierarchy_graph(&self) -> Result<GraphView, SdkError> {
        let topics = self.repo.all_topics().await;
        self.finish(topic_hierarchy_graph(&topics))
    }

    fn finish(&self, graph: SimilarityGraph) -> Result<GraphView, SdkError> {
        let scores = self.ranker()?.rank(&graph);
        let attributed = self
            .decorator()?
            .decorate(&graph, &scores, &ColorScheme::NodeColors);
        Ok(GraphView {
            graph,
            scores,
            attributed,
        })
    }

    pub async fn render(&self, view: &GraphView, sink: &dyn RenderSink) -> Result<(), SdkError> {
        sink.render(&view.attributed).await?;
        Ok(())
    }
}
