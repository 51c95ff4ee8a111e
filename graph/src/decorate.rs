//! Turns a ranked graph into render-ready attributes: node sizes scaled from
//! centrality, colors from group or node metadata, and tooltips.

use crate::builder::SimilarityGraph;
use crate::centrality::CentralityScore;
use crate::error::GraphError;
use cardgraph_core::config::GraphConfig;
use cardgraph_core::model::{GroupAssignment, ItemId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_COLOR: &str = "#d3d3d3";

/// Group colors, cycled when there are more groups than entries.
pub const GROUP_PALETTE: &[&str] = &[
    "#97c2fc", "#ffff00", "#fb7e81", "#7be141", "#eb7df4", "#ad85e4", "#ffa807", "#6e6efd",
    "#ffc0cb", "#c2fabc",
];

/// Color for a 1-based group number.
pub fn group_color(group: u32) -> &'static str {
    match group {
        0 => DEFAULT_NODE_COLOR,
        g => GROUP_PALETTE[(g as usize - 1) % GROUP_PALETTE.len()],
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRange {
    min: f64,
    max: f64,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            min: 15.0,
            max: 50.0,
        }
    }
}

impl SizeRange {
    pub fn new(min: f64, max: f64) -> Result<Self, GraphError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(GraphError::InvalidSizeRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_config(config: &GraphConfig) -> Result<Self, GraphError> {
        Self::new(config.min_size, config.max_size)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Linear map of `score` from `[lo, hi]` onto this range. A degenerate
    /// score range maps everything to the minimum size.
    pub fn scale(&self, score: f64, lo: f64, hi: f64) -> f64 {
        if !score.is_finite() || !lo.is_finite() || !hi.is_finite() || hi <= lo {
            return self.min;
        }
        let size = self.min + (score - lo) / (hi - lo) * (self.max - self.min);
        size.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColorScheme<'a> {
    /// Color by source group via [`GROUP_PALETTE`].
    Groups(&'a GroupAssignment),
    /// Use the color each node already carries.
    NodeColors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedNode {
    pub id: ItemId,
    pub label: String,
    pub color: String,
    pub size: f64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedEdge {
    pub from: ItemId,
    pub to: ItemId,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Render sink input; field names follow vis-network's node/edge options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributedGraph {
    pub directed: bool,
    pub nodes: Vec<AttributedNode>,
    pub edges: Vec<AttributedEdge>,
}

impl AttributedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &ItemId) -> Option<&AttributedNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphDecorator {
    sizes: SizeRange,
}

impl GraphDecorator {
    pub fn new(sizes: SizeRange) -> Self {
        Self { sizes }
    }

    pub fn decorate(
        &self,
        graph: &SimilarityGraph,
        scores: &CentralityScore,
        scheme: &ColorScheme<'_>,
    ) -> AttributedGraph {
        let (lo, hi) = scores.bounds().unwrap_or((0.0, 0.0));

        let nodes = graph
            .nodes()
            .iter()
            .map(|node| {
                let label = node.label();
                let size = scores
                    .get(&node.id)
                    .map_or(self.sizes.min, |s| self.sizes.scale(s, lo, hi));

                let (color, group) = match scheme {
                    ColorScheme::Groups(groups) => {
                        let group = groups.group_of(&node.id).or(node.meta.group);
                        let color = group.map_or(DEFAULT_NODE_COLOR, group_color);
                        (color.to_string(), group)
                    }
                    ColorScheme::NodeColors => (
                        node.meta
                            .color
                            .clone()
                            .unwrap_or_else(|| DEFAULT_NODE_COLOR.to_string()),
                        node.meta.group,
                    ),
                };

                let title = node
                    .meta
                    .explanation
                    .clone()
                    .unwrap_or_else(|| label.clone());

                AttributedNode {
                    id: node.id.clone(),
                    label,
                    color,
                    size,
                    title,
                    group,
                }
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .map(|edge| AttributedEdge {
                from: edge.source.clone(),
                to: edge.target.clone(),
                weight: edge.weight,
                title: edge.relation.clone(),
            })
            .collect();

        AttributedGraph {
            directed: graph.is_directed(),
            nodes,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Directedness, NodeMeta};
    use crate::centrality::CentralityRanker;

    #[test]
    fn equal_scores_map_to_min_size() {
        let range = SizeRange::new(10.0, 40.0).unwrap();
        assert_eq!(range.scale(0.3, 0.3, 0.3), 10.0);
        assert_eq!(range.scale(0.5, 0.0, 1.0), 25.0);
        assert_eq!(range.scale(2.0, 0.0, 1.0), 40.0);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(matches!(
            SizeRange::new(50.0, 15.0),
            Err(GraphError::InvalidSizeRange { .. })
        ));
        assert!(SizeRange::new(f64::NAN, 15.0).is_err());
        assert!(SizeRange::new(20.0, 20.0).is_ok());
    }

    #[test]
    fn palette_cycles_by_group() {
        assert_eq!(group_color(1), GROUP_PALETTE[0]);
        assert_eq!(group_color(GROUP_PALETTE.len() as u32 + 1), GROUP_PALETTE[0]);
        assert_eq!(group_color(0), DEFAULT_NODE_COLOR);
    }

    #[test]
    fn node_colors_fall_back_to_grey_and_title_to_label() {
        let mut graph = SimilarityGraph::new(Directedness::Undirected);
        graph.upsert_node(
            1u64.into(),
            NodeMeta::labeled("Attention")
                .with_color("green")
                .with_explanation("Weighted mixing of values."),
        );
        graph.upsert_node(2u64.into(), NodeMeta::labeled("Dropout"));

        let scores = CentralityRanker::default().rank(&graph);
        let view = GraphDecorator::default().decorate(&graph, &scores, &ColorScheme::NodeColors);

        let first = view.node(&1u64.into()).unwrap();
        assert_eq!(first.color, "green");
        assert_eq!(first.title, "Weighted mixing of values.");
        let second = view.node(&2u64.into()).unwrap();
        assert_eq!(second.color, DEFAULT_NODE_COLOR);
        assert_eq!(second.title, "Dropout");
        assert_eq!(second.size, 15.0);
    }
}
