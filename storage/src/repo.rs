use crate::wal::{Wal, WalError};
use cardgraph_core::error::{CardgraphError, ErrorCode};
use cardgraph_core::model::{
    CardStatus, Difficulty, Flashcard, NewFlashcard, NewTopic, Topic, TopicStatus,
};
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("serialization error")]
    Serialization,
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl CardgraphError for RepoError {
    fn error_code(&self) -> ErrorCode {
        match self {
            RepoError::Wal(err) => err.error_code(),
            RepoError::Serialization => ErrorCode::Internal,
            RepoError::NotFound { .. } => ErrorCode::NotFound,
            RepoError::InvalidRecord(_) => ErrorCode::InvalidArgument,
        }
    }
}

/// Updates are logged as full-record puts.
#[derive(Archive, Deserialize, Serialize, Debug, Clone)]
#[archive(check_bytes)]
pub enum LogEntry {
    PutFlashcard(Flashcard),
    DeleteFlashcard(u64),
    PutTopic(Topic),
    DeleteTopic(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub category: String,
    pub status: CardStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyCount {
    pub category: String,
    pub status: CardStatus,
    pub difficulty: Difficulty,
    pub count: usize,
}

#[derive(Default)]
struct RepoState {
    flashcards: BTreeMap<u64, Flashcard>,
    topics: BTreeMap<u64, Topic>,
    // Ids are never reused, even after deletes.
    next_flashcard_id: u64,
    next_topic_id: u64,
}

impl RepoState {
    fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::PutFlashcard(card) => {
                self.next_flashcard_id = self.next_flashcard_id.max(card.id + 1);
                self.flashcards.insert(card.id, card);
            }
            LogEntry::DeleteFlashcard(id) => {
                self.flashcards.remove(&id);
            }
            LogEntry::PutTopic(topic) => {
                self.next_topic_id = self.next_topic_id.max(topic.id + 1);
                self.topics.insert(topic.id, topic);
            }
            LogEntry::DeleteTopic(id) => {
                self.topics.remove(&id);
            }
        }
    }

    fn flashcard(&self, id: u64) -> Result<&Flashcard, RepoError> {
        self.flashcards.get(&id).ok_or(RepoError::NotFound {
            kind: "flashcard",
            id,
        })
    }

    fn topic(&self, id: u64) -> Result<&Topic, RepoError> {
        self.topics
            .get(&id)
            .ok_or(RepoError::NotFound { kind: "topic", id })
    }
}

/// Flashcard and topic records, kept in memory and made durable through a WAL.
/// Handles are created explicitly per data directory; nothing is global.
pub struct Repository {
    wal: Mutex<Wal>,
    state: RwLock<RepoState>,
}

impl Repository {
    /// Opens the log at `wal_path` and replays it to restore previous state.
    pub async fn open(wal_path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let mut wal = Wal::open(&wal_path).await?;
        let mut state = RepoState {
            next_flashcard_id: 1,
            next_topic_id: 1,
            ..RepoState::default()
        };

        let stats = wal
            .replay(|lsn, payload| {
                let entry = decode_entry(payload).ok_or(WalError::CorruptEntry(lsn))?;
                state.apply(entry);
                Ok(())
            })
            .await?;

        tracing::debug!(
            entries = stats.entries,
            flashcards = state.flashcards.len(),
            topics = state.topics.len(),
            "repository replayed"
        );

        Ok(Self {
            wal: Mutex::new(wal),
            state: RwLock::new(state),
        })
    }

    /// Durability first: the entry is flushed to the log before it becomes
    /// visible. Callers hold the state write lock so id allocation and apply
    /// happen as one step. A failed flush is rolled back inside the log, so
    /// the entry is neither visible nor replayed.
    async fn commit(&self, state: &mut RepoState, entry: LogEntry) -> Result<(), RepoError> {
        let bytes = encode_entry(&entry)?;
        {
            let mut wal = self.wal.lock().await;
            wal.append(&bytes)?;
            wal.flush().await?;
        }
        state.apply(entry);
        Ok(())
    }

    pub async fn current_lsn(&self) -> u64 {
        self.wal.lock().await.current_lsn()
    }

    // -----------------------------------------------------------------------
    // Flashcards
    // -----------------------------------------------------------------------

    pub async fn add_flashcard(&self, card: NewFlashcard) -> Result<u64, RepoError> {
        validate_flashcard(&card)?;

        let mut state = self.state.write().await;
        let id = state.next_flashcard_id;
        let record = Flashcard {
            id,
            question: card.question,
            answer: card.answer,
            category: card.category,
            difficulty: card.difficulty,
            status: CardStatus::Unknown,
        };
        self.commit(&mut state, LogEntry::PutFlashcard(record)).await?;
        Ok(id)
    }

    pub async fn get_flashcard(&self, id: u64) -> Result<Flashcard, RepoError> {
        let state = self.state.read().await;
        state.flashcard(id).cloned()
    }

    /// Cards in `category`, optionally restricted to one status, by id.
    pub async fn flashcards_by_category(
        &self,
        category: &str,
        status: Option<CardStatus>,
    ) -> Vec<Flashcard> {
        let state = self.state.read().await;
        state
            .flashcards
            .values()
            .filter(|card| card.category == category)
            .filter(|card| status.is_none_or(|s| card.status == s))
            .cloned()
            .collect()
    }

    pub async fn flashcards_by_filters(
        &self,
        category: &str,
        status: CardStatus,
        difficulty: Option<Difficulty>,
    ) -> Vec<Flashcard> {
        let state = self.state.read().await;
        state
            .flashcards
            .values()
            .filter(|card| card.category == category && card.status == status)
            .filter(|card| difficulty.is_none_or(|d| card.difficulty == d))
            .cloned()
            .collect()
    }

    /// All cards ordered by category, then difficulty (basic first), then id.
    pub async fn all_flashcards(&self) -> Vec<Flashcard> {
        let state = self.state.read().await;
        let mut cards: Vec<Flashcard> = state.flashcards.values().cloned().collect();
        cards.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.difficulty.cmp(&b.difficulty))
                .then(a.id.cmp(&b.id))
        });
        cards
    }

    /// `(id, question)` pairs ordered by category, then question.
    pub async fn all_questions(&self) -> Vec<(u64, String)> {
        let state = self.state.read().await;
        let mut cards: Vec<&Flashcard> = state.flashcards.values().collect();
        cards.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.question.cmp(&b.question))
        });
        cards
            .into_iter()
            .map(|card| (card.id, card.question.clone()))
            .collect()
    }

    /// Replaces the editable fields; the review status is kept.
    pub async fn update_flashcard(&self, id: u64, fields: NewFlashcard) -> Result<(), RepoError> {
        validate_flashcard(&fields)?;

        let mut state = self.state.write().await;
        let mut card = state.flashcard(id)?.clone();
        card.question = fields.question;
        card.answer = fields.answer;
        card.category = fields.category;
        card.difficulty = fields.difficulty;
        self.commit(&mut state, LogEntry::PutFlashcard(card)).await
    }

    pub async fn update_flashcard_status(
        &self,
        id: u64,
        status: CardStatus,
    ) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let mut card = state.flashcard(id)?.clone();
        if card.status == status {
            return Ok(());
        }
        card.status = status;
        self.commit(&mut state, LogEntry::PutFlashcard(card)).await
    }

    pub async fn delete_flashcard(&self, id: u64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.flashcard(id)?;
        self.commit(&mut state, LogEntry::DeleteFlashcard(id)).await
    }

    pub async fn flashcard_summary(&self) -> Vec<StatusCount> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<(String, CardStatus), usize> = BTreeMap::new();
        for card in state.flashcards.values() {
            *counts
                .entry((card.category.clone(), card.status))
                .or_default() += 1;
        }
        counts
            .into_iter()
            .map(|((category, status), count)| StatusCount {
                category,
                status,
                count,
            })
            .collect()
    }

    /// Counts grouped by category, status, and difficulty; ordered by category
    /// then difficulty.
    pub async fn flashcard_summary_with_difficulty(&self) -> Vec<DifficultyCount> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<(String, Difficulty, CardStatus), usize> = BTreeMap::new();
        for card in state.flashcards.values() {
            *counts
                .entry((card.category.clone(), card.difficulty, card.status))
                .or_default() += 1;
        }
        counts
            .into_iter()
            .map(|((category, difficulty, status), count)| DifficultyCount {
                category,
                status,
                difficulty,
                count,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Topics
    // -----------------------------------------------------------------------

    pub async fn add_topic(&self, topic: NewTopic) -> Result<u64, RepoError> {
        validate_topic(&topic)?;

        let mut state = self.state.write().await;
        let id = state.next_topic_id;
        self.commit(&mut state, LogEntry::PutTopic(topic.into_topic(id)))
            .await?;
        Ok(id)
    }

    pub async fn get_topic(&self, id: u64) -> Result<Topic, RepoError> {
        let state = self.state.read().await;
        state.topic(id).cloned()
    }

    pub async fn all_topics(&self) -> Vec<Topic> {
        let state = self.state.read().await;
        state.topics.values().cloned().collect()
    }

    pub async fn distinct_categories(&self) -> Vec<String> {
        let state = self.state.read().await;
        let categories: BTreeSet<&String> = state
            .topics
            .values()
            .filter_map(|topic| topic.category.as_ref())
            .collect();
        categories.into_iter().cloned().collect()
    }

    pub async fn topics_by_category(&self, category: &str) -> Vec<Topic> {
        let state = self.state.read().await;
        state
            .topics
            .values()
            .filter(|topic| topic.category.as_deref() == Some(category))
            .cloned()
            .collect()
    }

    pub async fn topics_by_source(&self, source: &str) -> Vec<Topic> {
        let state = self.state.read().await;
        state
            .topics
            .values()
            .filter(|topic| topic.is_from_source(source))
            .cloned()
            .collect()
    }

    pub async fn set_topic_embedding(&self, id: u64, embedding: Vec<f32>) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let mut topic = state.topic(id)?.clone();
        topic.embedding = Some(embedding);
        self.commit(&mut state, LogEntry::PutTopic(topic)).await
    }

    pub async fn update_topic_status(
        &self,
        id: u64,
        status: TopicStatus,
        reviewed_on: Option<String>,
    ) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let mut topic = state.topic(id)?.clone();
        topic.status = status;
        if reviewed_on.is_some() {
            topic.last_reviewed = reviewed_on;
        }
        self.commit(&mut state, LogEntry::PutTopic(topic)).await
    }

    pub async fn delete_topic(&self, id: u64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.topic(id)?;
        self.commit(&mut state, LogEntry::DeleteTopic(id)).await
    }
}

fn validate_flashcard(card: &NewFlashcard) -> Result<(), RepoError> {
    for (field, value) in [
        ("question", &card.question),
        ("answer", &card.answer),
        ("category", &card.category),
    ] {
        if value.trim().is_empty() {
            return Err(RepoError::InvalidRecord(format!(
                "flashcard {field} must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_topic(topic: &NewTopic) -> Result<(), RepoError> {
    for (field, value) in [
        ("topic_name", &topic.topic_name),
        ("keyword", &topic.keyword),
        ("explanation", &topic.explanation),
    ] {
        if value.trim().is_empty() {
            return Err(RepoError::InvalidRecord(format!(
                "topic {field} must not be empty"
            )));
        }
    }
    if !(1..=5).contains(&topic.importance_level) {
        return Err(RepoError::InvalidRecord(format!(
            "importance_level must be between 1 and 5, got {}",
            topic.importance_level
        )));
    }
    Ok(())
}

fn encode_entry(entry: &LogEntry) -> Result<AlignedVec, RepoError> {
    rkyv::to_bytes::<_, 1024>(entry).map_err(|_| RepoError::Serialization)
}

fn decode_entry(payload: &[u8]) -> Option<LogEntry> {
    // Archived roots must be aligned; WAL payloads come back as plain bytes.
    let mut aligned = AlignedVec::with_capacity(payload.len());
    aligned.extend_from_slice(payload);

    let archived = rkyv::check_archived_root::<LogEntry>(&aligned[..]).ok()?;
    let entry: LogEntry = archived
        .deserialize(&mut rkyv::Infallible)
        .unwrap_or_else(|never| match never {});
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn card(question: &str, category: &str, difficulty: Difficulty) -> NewFlashcard {
        NewFlashcard::new(
            question,
            "A sufficiently long answer for the card.",
            category,
            difficulty,
        )
    }

    #[tokio::test]
    async fn test_flashcard_ids_are_not_reused_after_delete() {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path().join("cards.wal")).await.unwrap();

        let first = repo
            .add_flashcard(card("What is SQL?", "SQL", Difficulty::Basic))
            .await
            .unwrap();
        repo.delete_flashcard(first).await.unwrap();
        let second = repo
            .add_flashcard(card("What is a JOIN?", "SQL", Difficulty::Basic))
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cards.wal");

        {
            let repo = Repository::open(&path).await.unwrap();
            let id = repo
                .add_flashcard(card("What is Docker?", "Docker", Difficulty::Intermediate))
                .await
                .unwrap();
            repo.update_flashcard_status(id, CardStatus::Known)
                .await
                .unwrap();
            repo.add_topic(NewTopic::new("Attention", "attention", "Weighted lookup."))
                .await
                .unwrap();
        }

        let repo = Repository::open(&path).await.unwrap();
        let card = repo.get_flashcard(1).await.unwrap();
        assert_eq!(card.status, CardStatus::Known);
        assert_eq!(card.difficulty, Difficulty::Intermediate);
        assert_eq!(repo.all_topics().await.len(), 1);
        assert_eq!(repo.current_lsn().await, 3);
    }

    #[tokio::test]
    async fn test_missing_ids_map_to_not_found() {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path().join("cards.wal")).await.unwrap();

        let err = repo.delete_flashcard(42).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { kind: "flashcard", id: 42 }));
        assert_eq!(err.error_code(), ErrorCode::NotFound);

        let err = repo.set_topic_embedding(7, vec![1.0]).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { kind: "topic", id: 7 }));
    }

    #[tokio::test]
    async fn test_topic_importance_is_validated() {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path().join("topics.wal")).await.unwrap();

        let mut topic = NewTopic::new("PCA", "pca", "Projects onto principal axes.");
        topic.importance_level = 6;
        let err = repo.add_topic(topic).await.unwrap_err();

        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
        assert!(repo.all_topics().await.is_empty());
        assert_eq!(repo.current_lsn().await, 0);
    }
}
