use crate::builder::SimilarityGraph;
use crate::error::GraphError;
use cardgraph_core::config::GraphConfig;
use cardgraph_core::model::ItemId;
use std::collections::HashMap;

/// Weighted PageRank by power iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralityRanker {
    pub damping_factor: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for CentralityRanker {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentralityScore {
    scores: Vec<(ItemId, f64)>,
    index: HashMap<ItemId, usize>,
    pub iterations: usize,
    pub converged: bool,
}

impl CentralityScore {
    pub fn get(&self, id: &ItemId) -> Option<f64> {
        self.index.get(id).map(|&pos| self.scores[pos].1)
    }

    /// Scores in graph node order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, f64)> {
        self.scores.iter().map(|(id, score)| (id, *score))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// `(min, max)` over all scores, `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.scores.iter().map(|(_, s)| *s).fold(None, |acc, s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        })
    }

    /// Highest-scoring ids first; ties keep node order.
    pub fn top(&self, k: usize) -> Vec<(ItemId, f64)> {
        let mut ranked = self.scores.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }
}

impl CentralityRanker {
    pub fn new(
        damping_factor: f64,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<Self, GraphError> {
        if !(0.0..=1.0).contains(&damping_factor) {
            return Err(GraphError::InvalidRankerConfig(format!(
                "damping factor {damping_factor} outside [0, 1]"
            )));
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(GraphError::InvalidRankerConfig(format!(
                "tolerance {tolerance} must be positive"
            )));
        }
        if max_iterations == 0 {
            return Err(GraphError::InvalidRankerConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            damping_factor,
            tolerance,
            max_iterations,
        })
    }

    pub fn from_config(config: &GraphConfig) -> Result<Self, GraphError> {
        Self::new(config.damping_factor, config.tolerance, config.max_iterations)
    }

    pub fn rank(&self, graph: &SimilarityGraph) -> CentralityScore {
        let n = graph.node_count();
        if n == 0 {
            return CentralityScore {
                converged: true,
                ..CentralityScore::default()
            };
        }

        let n_f64 = n as f64;
        let damping = self.damping_factor;
        let base = (1.0 - damping) / n_f64;

        // Negative similarities carry no transition mass.
        let mut out_edges: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for edge in graph.edges() {
            let (Some(s), Some(t)) = (graph.position(&edge.source), graph.position(&edge.target))
            else {
                continue;
            };
            let affinity = edge.weight.max(0.0);
            out_edges[s].push((t, affinity));
            if !graph.is_directed() {
                out_edges[t].push((s, affinity));
            }
        }
        let out_sums: Vec<f64> = out_edges
            .iter()
            .map(|edges| edges.iter().map(|(_, w)| *w).sum())
            .collect();

        let mut rank = vec![1.0 / n_f64; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let mut next = vec![base; n];
            let mut dangling_mass = 0.0;

            for (node, edges) in out_edges.iter().enumerate() {
                let out_sum = out_sums[node];
                if out_sum <= f64::EPSILON {
                    dangling_mass += rank[node];
                    continue;
                }
                for &(target, weight) in edges {
                    next[target] += damping * rank[node] * (weight / out_sum);
                }
            }

            if dangling_mass > 0.0 {
                let distribute = damping * dangling_mass / n_f64;
                for value in next.iter_mut() {
                    *value += distribute;
                }
            }

            let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            rank = next;
            if delta < n_f64 * self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                nodes = n,
                iterations,
                "centrality did not converge; using last estimate"
            );
        }

        let scores: Vec<(ItemId, f64)> = graph
            .nodes()
            .iter()
            .zip(rank)
            .map(|(node, score)| (node.id.clone(), score))
            .collect();
        let index = scores
            .iter()
            .enumerate()
            .map(|(pos, (id, _))| (id.clone(), pos))
            .collect();

        CentralityScore {
            scores,
            index,
            iterations,
            converged,
        }
    }
}
