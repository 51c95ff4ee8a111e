use crate::error::GraphError;
use crate::similarity::NormedVector;
use cardgraph_core::config::GraphConfig;
use cardgraph_core::model::{EmbeddingRecord, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Above this many nodes the all-pairs build is still performed, but logged.
pub const LARGE_GRAPH_WARN_NODES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Directedness {
    #[default]
    Undirected,
    Directed,
}

/// Display metadata carried by a node. Similarity never looks at it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeMeta {
    pub label: Option<String>,
    pub explanation: Option<String>,
    pub color: Option<String>,
    pub group: Option<u32>,
}

impl NodeMeta {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Fields set on `other` replace ours.
    fn merge(&mut self, other: NodeMeta) {
        if other.label.is_some() {
            self.label = other.label;
        }
        if other.explanation.is_some() {
            self.explanation = other.explanation;
        }
        if other.color.is_some() {
            self.color = other.color;
        }
        if other.group.is_some() {
            self.group = other.group;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: ItemId,
    pub meta: NodeMeta,
}

impl GraphNode {
    pub fn label(&self) -> String {
        self.meta
            .label
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: ItemId,
    pub target: ItemId,
    pub weight: f64,
    pub relation: Option<String>,
}

/// Nodes in insertion order plus weighted edges. Undirected graphs store each
/// edge once; `has_edge` checks both orientations.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
    directedness: Directedness,
    nodes: Vec<GraphNode>,
    index: HashMap<ItemId, usize>,
    edges: Vec<GraphEdge>,
    edge_keys: HashSet<(usize, usize)>,
}

impl SimilarityGraph {
    pub fn new(directedness: Directedness) -> Self {
        Self {
            directedness,
            ..Self::default()
        }
    }

    pub fn directedness(&self) -> Directedness {
        self.directedness
    }

    pub fn is_directed(&self) -> bool {
        self.directedness == Directedness::Directed
    }

    /// Inserts a node or merges `meta` into the existing one. Returns the
    /// node's position.
    pub fn upsert_node(&mut self, id: ItemId, meta: NodeMeta) -> usize {
        if let Some(&pos) = self.index.get(&id) {
            self.nodes[pos].meta.merge(meta);
            return pos;
        }
        let pos = self.nodes.len();
        self.index.insert(id.clone(), pos);
        self.nodes.push(GraphNode { id, meta });
        pos
    }

    /// Adds an edge between two existing nodes. Self-loops, unknown endpoints
    /// and repeats are ignored (returns `false`).
    pub fn add_edge(
        &mut self,
        source: &ItemId,
        target: &ItemId,
        weight: f64,
        relation: Option<String>,
    ) -> bool {
        let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) else {
            return false;
        };
        if s == t || !self.edge_keys.insert(self.edge_key(s, t)) {
            return false;
        }
        self.edges.push(GraphEdge {
            source: source.clone(),
            target: target.clone(),
            weight,
            relation,
        });
        true
    }

    fn edge_key(&self, s: usize, t: usize) -> (usize, usize) {
        match self.directedness {
            Directedness::Directed => (s, t),
            Directedness::Undirected => (s.min(t), s.max(t)),
        }
    }

    pub fn has_edge(&self, source: &ItemId, target: &ItemId) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => self.edge_keys.contains(&self.edge_key(s, t)),
            _ => false,
        }
    }

    pub fn edge(&self, source: &ItemId, target: &ItemId) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| {
            (&e.source == source && &e.target == target)
                || (!self.is_directed() && &e.source == target && &e.target == source)
        })
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &ItemId) -> Option<&GraphNode> {
        self.index.get(id).map(|&pos| &self.nodes[pos])
    }

    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains_node(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edge endpoints as ordered id pairs (undirected pairs normalized
    /// smaller-first), for set comparisons.
    pub fn edge_set(&self) -> BTreeSet<(ItemId, ItemId)> {
        self.edges
            .iter()
            .map(|e| {
                if self.is_directed() || e.source <= e.target {
                    (e.source.clone(), e.target.clone())
                } else {
                    (e.target.clone(), e.source.clone())
                }
            })
            .collect()
    }
}

/// One input to [`SimilarityGraphBuilder::build_with_meta`]. Items without a
/// vector become nodes but take no part in similarity.
#[derive(Debug, Clone)]
pub struct BuildItem<'a> {
    pub id: ItemId,
    pub vector: Option<&'a [f32]>,
    pub meta: NodeMeta,
}

impl<'a> BuildItem<'a> {
    pub fn new(id: ItemId, vector: Option<&'a [f32]>, meta: NodeMeta) -> Self {
        Self { id, vector, meta }
    }
}

impl<'a> From<&'a EmbeddingRecord> for BuildItem<'a> {
    fn from(record: &'a EmbeddingRecord) -> Self {
        Self {
            id: record.id.clone(),
            vector: Some(&record.vector),
            meta: NodeMeta::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityGraphBuilder {
    threshold: f64,
}

impl SimilarityGraphBuilder {
    /// Any finite threshold is accepted; `<= -1` connects every pair of
    /// non-zero vectors, `> 1` connects none.
    pub fn new(threshold: f64) -> Result<Self, GraphError> {
        if !threshold.is_finite() {
            return Err(GraphError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn from_config(config: &GraphConfig) -> Result<Self, GraphError> {
        Self::new(config.similarity_threshold)
    }

    pub fn topics_from_config(config: &GraphConfig) -> Result<Self, GraphError> {
        Self::new(config.topic_similarity_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn build(&self, records: &[EmbeddingRecord]) -> Result<SimilarityGraph, GraphError> {
        self.build_with_meta(records.iter().map(BuildItem::from))
    }

    pub fn build_with_meta<'a, I>(&self, items: I) -> Result<SimilarityGraph, GraphError>
    where
        I: IntoIterator<Item = BuildItem<'a>>,
    {
        let mut graph = SimilarityGraph::new(Directedness::Undirected);
        let mut vectors: Vec<Option<&'a [f32]>> = Vec::new();
        let mut expected_dim: Option<usize> = None;

        for item in items {
            if let Some(vector) = item.vector {
                match expected_dim {
                    None => expected_dim = Some(vector.len()),
                    Some(expected) if expected != vector.len() => {
                        return Err(GraphError::DimensionMismatch {
                            id: item.id,
                            expected,
                            actual: vector.len(),
                        });
                    }
                    Some(_) => {}
                }
            }

            let pos = graph.upsert_node(item.id, item.meta);
            if pos == vectors.len() {
                vectors.push(item.vector);
            } else if item.vector.is_some() {
                vectors[pos] = item.vector;
            }
        }

        let n = graph.node_count();
        if n > LARGE_GRAPH_WARN_NODES {
            tracing::warn!(
                nodes = n,
                pairs = n * (n - 1) / 2,
                "building similarity graph over a large input"
            );
        }

        let normed: Vec<Option<NormedVector<'a>>> = vectors
            .iter()
            .map(|v| v.map(NormedVector::new))
            .collect();

        let mut pending = Vec::new();
        for i in 0..n {
            let Some(u) = normed[i] else { continue };
            for (j, v) in normed.iter().enumerate().skip(i + 1) {
                let Some(v) = v else { continue };
                let score = u.similarity(v);
                if score >= self.threshold {
                    pending.push((i, j, score));
                }
            }
        }

        for (i, j, score) in pending {
            let source = graph.nodes[i].id.clone();
            let target = graph.nodes[j].id.clone();
            graph.add_edge(&source, &target, score, None);
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            threshold = self.threshold,
            "similarity graph built"
        );
        Ok(graph)
    }
}
