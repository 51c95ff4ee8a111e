use cardgraph_core::error::{CardgraphError, ErrorCode};
use cardgraph_core::model::{CardStatus, EmbeddingRecord, PAPER_SOURCE};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use storage::{EmbeddingStore, RepoError, Repository, StoreError};
use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-default-v1";

pub trait Embedder: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str, model_id: &'a str)
        -> BoxFuture<'a, anyhow::Result<Vec<f32>>>;
}

/// Hash-based embedder; needs no network and is stable across runs.
pub struct DeterministicEmbedder {
    dims: usize,
}

impl DeterministicEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
        model_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<f32>>> {
        let dims = self.dims;
        Box::pin(async move {
            if text.trim().is_empty() {
                anyhow::bail!("cannot embed empty text");
            }
            Ok(cardgraph_core::embedding::deterministic_embedding(
                text, model_id, dims,
            ))
        })
    }
}

#[derive(Error, Debug)]
pub enum EmbeddingJobError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}

impl CardgraphError for EmbeddingJobError {
    fn error_code(&self) -> ErrorCode {
        match self {
            EmbeddingJobError::Store(err) => err.error_code(),
            EmbeddingJobError::Repo(err) => err.error_code(),
        }
    }
}

/// Which topics [`EmbeddingJob::embed_topics`] covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    /// Every topic that has a category, category by category.
    AllCategories,
    Source(String),
}

impl TopicFilter {
    pub fn paper() -> Self {
        TopicFilter::Source(PAPER_SOURCE.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingReport {
    pub embedded: usize,
    pub failed: usize,
}

/// Embeds stored text and persists the vectors: flashcard answers go to the
/// embedding store as one source per run, topic explanations go back onto the
/// topic records.
pub struct EmbeddingJob {
    repo: Arc<Repository>,
    embedder: Arc<dyn Embedder>,
    model_id: String,
}

impl EmbeddingJob {
    pub fn new(repo: Arc<Repository>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            repo,
            embedder,
            model_id: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub async fn embed_flashcards(
        &self,
        store: &EmbeddingStore,
        category: &str,
        status: Option<CardStatus>,
        source_name: &str,
    ) -> Result<EmbeddingReport, EmbeddingJobError> {
        let cards = self.repo.flashcards_by_category(category, status).await;
        let mut report = EmbeddingReport::default();
        let mut records = Vec::with_capacity(cards.len());

        for card in cards {
            match self.embedder.embed(&card.answer, &self.model_id).await {
                Ok(vector) => {
                    records.push(EmbeddingRecord::new(card.id, vector));
                    report.embedded += 1;
                }
                Err(err) => {
                    tracing::warn!(card_id = card.id, error = %err, "failed to embed flashcard");
                    report.failed += 1;
                }
            }
        }

        store.write_source(source_name, records).await?;
        tracing::info!(
            category,
            source = source_name,
            embedded = report.embedded,
            failed = report.failed,
            "flashcard embeddings written"
        );
        Ok(report)
    }

    pub async fn embed_topics(&self, filter: &TopicFilter) -> Result<EmbeddingReport, EmbeddingJobError> {
        let topics = match filter {
            TopicFilter::AllCategories => {
                let mut topics = Vec::new();
                for category in self.repo.distinct_categories().await {
                    tracing::debug!(category = %category, "embedding topic category");
                    topics.extend(self.repo.topics_by_category(&category).await);
                }
                topics
            }
            TopicFilter::Source(source) => self.repo.topics_by_source(source).await,
        };

        let mut report = EmbeddingReport::default();
        for topic in topics {
            match self.embedder.embed(&topic.explanation, &self.model_id).await {
                Ok(vector) => {
                    self.repo.set_topic_embedding(topic.id, vector).await?;
                    report.embedded += 1;
                }
                Err(err) => {
                    tracing::warn!(topic_id = topic.id, error = %err, "failed to embed topic");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            embedded = report.embedded,
            failed = report.failed,
            "topic embeddings updated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic_embedder_rejects_blank_text() {
        let embedder = DeterministicEmbedder::new(8);
        assert!(embedder.embed("   ", DEFAULT_EMBEDDING_MODEL).await.is_err());

        let a = embedder.embed("softmax", DEFAULT_EMBEDDING_MODEL).await.unwrap();
        let b = embedder.embed("softmax", DEFAULT_EMBEDDING_MODEL).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }
}
