pub mod builder;
pub mod centrality;
pub mod decorate;
pub mod error;
pub mod render;
pub mod similarity;
pub mod topics;

pub use builder::{
    BuildItem, Directedness, GraphEdge, GraphNode, NodeMeta, SimilarityGraph,
    SimilarityGraphBuilder, LARGE_GRAPH_WARN_NODES,
};
pub use centrality::{CentralityRanker, CentralityScore};
pub use decorate::{AttributedEdge, AttributedGraph, AttributedNode, ColorScheme, GraphDecorator, SizeRange};
pub use error::GraphError;
pub use render::{JsonFileSink, RenderError, RenderSink};
