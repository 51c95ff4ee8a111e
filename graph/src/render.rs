use crate::decorate::AttributedGraph;
use async_trait::async_trait;
use cardgraph_core::error::{CardgraphError, ErrorCode};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CardgraphError for RenderError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::Internal
    }
}

/// Destination for a decorated graph (file, HTML template, UI bridge, ...).
#[async_trait]
pub trait RenderSink: Send + Sync {
    async fn render(&self, graph: &AttributedGraph) -> Result<(), RenderError>;
}

/// Writes the graph as pretty-printed JSON, replacing the target atomically.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RenderSink for JsonFileSink {
    async fn render(&self, graph: &AttributedGraph) -> Result<(), RenderError> {
        let json = serde_json::to_vec_pretty(graph)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).await?;
        fs::rename(&tmp_path, &self.path).await?;

        tracing::info!(
            path = %self.path.display(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "graph rendered"
        );
        Ok(())
    }
}
