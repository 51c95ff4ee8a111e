pub mod error;
pub mod study;
pub mod visualizer;

pub use error::SdkError;
pub use study::{DeckFilter, PracticeFilter, PracticeSession, StudyDeck};
pub use visualizer::{GraphView, Visualizer};

use cardgraph_core::config::AppConfig;
use ingestion::drafting::{FlashcardDrafter, KeywordExplainer, TopicDrafter};
use ingestion::embedding::{Embedder, EmbeddingJob};
use ingestion::llm::CompletionClient;
use rand::Rng;
use std::sync::Arc;
use storage::{EmbeddingStore, Repository};

/// Opened application state: the record store, the embedding store and the
/// configuration they were opened with. Every facade borrows its handles
/// from here.
pub struct Cardgraph {
    config: AppConfig,
    repo: Arc<Repository>,
    store: Arc<EmbeddingStore>,
}

impl Cardgraph {
    pub async fn open(config: AppConfig) -> Result<Self, SdkError> {
        let repo = Repository::open(config.storage.wal_path()).await?;
        let store = EmbeddingStore::new(config.storage.embeddings_path());
        tracing::info!(
            wal = %config.storage.wal_path().display(),
            embeddings = %store.dir().display(),
            "cardgraph opened"
        );

        Ok(Self {
            config,
            repo: Arc::new(repo),
            store: Arc::new(store),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn repo(&self) -> Arc<Repository> {
        self.repo.clone()
    }

    pub fn store(&self) -> Arc<EmbeddingStore> {
        self.store.clone()
    }

    pub fn visualizer(&self) -> Visualizer {
        Visualizer::new(self.repo(), self.store(), self.config.graph.clone())
    }

    pub fn deck(&self) -> StudyDeck {
        StudyDeck::new(self.repo())
    }

    pub fn practice<R: Rng>(&self, filter: PracticeFilter, rng: R) -> PracticeSession<R> {
        PracticeSession::new(self.repo(), filter, rng)
    }

    pub fn embedding_job(&self, embedder: Arc<dyn Embedder>) -> EmbeddingJob {
        EmbeddingJob::new(self.repo(), embedder)
    }

    pub fn flashcard_drafter(&self, client: Arc<dyn CompletionClient>) -> FlashcardDrafter {
        FlashcardDrafter::new(client, self.repo(), self.config.llm.clone())
    }

    pub fn topic_drafter(&self, client: Arc<dyn CompletionClient>) -> TopicDrafter {
        TopicDrafter::new(client, self.repo(), self.config.llm.clone())
    }

    pub fn keyword_explainer(&self, client: Arc<dyn CompletionClient>) -> KeywordExplainer {
        KeywordExplainer::new(client, self.config.llm.clone())
    }
}
