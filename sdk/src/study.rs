use crate::error::SdkError;
use cardgraph_core::model::{CardStatus, Difficulty, Flashcard, NewFlashcard};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use storage::repo::{DifficultyCount, StatusCount};
use storage::Repository;

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeFilter {
    pub category: String,
    pub status: CardStatus,
    pub difficulty: Option<Difficulty>,
}

impl PracticeFilter {
    /// Unknown cards of `category`, any difficulty.
    pub fn unknown(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            status: CardStatus::Unknown,
            difficulty: None,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

/// Draws random cards matching a filter and records whether each was known.
pub struct PracticeSession<R: Rng> {
    repo: Arc<Repository>,
    filter: PracticeFilter,
    rng: R,
    current: Option<Flashcard>,
}

impl<R: Rng> PracticeSession<R> {
    pub fn new(repo: Arc<Repository>, filter: PracticeFilter, rng: R) -> Self {
        Self {
            repo,
            filter,
            rng,
            current: None,
        }
    }

    pub fn filter(&self) -> &PracticeFilter {
        &self.filter
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.current.as_ref()
    }

    /// Picks a random matching card; `None` once nothing matches.
    pub async fn next_card(&mut self) -> Option<&Flashcard> {
        let mut pool = self
            .repo
            .flashcards_by_filters(&self.filter.category, self.filter.status, self.filter.difficulty)
            .await;

        self.current = if pool.is_empty() {
            None
        } else {
            let pick = self.rng.random_range(0..pool.len());
            Some(pool.swap_remove(pick))
        };
        self.current.as_ref()
    }

    /// Marks the current card known or unknown, then draws the next one.
    pub async fn answer(&mut self, knew_it: bool) -> Result<Option<&Flashcard>, SdkError> {
        let card = self.current.take().ok_or(SdkError::NoCurrentCard)?;
        let status = if knew_it {
            CardStatus::Known
        } else {
            CardStatus::Unknown
        };
        self.repo.update_flashcard_status(card.id, status).await?;
        tracing::debug!(card_id = card.id, %status, "practice answer recorded");

        Ok(self.next_card().await)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckFilter {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub status: Option<CardStatus>,
}

impl DeckFilter {
    fn matches(&self, card: &Flashcard) -> bool {
        self.category.as_deref().is_none_or(|c| card.category == c)
            && self.difficulty.is_none_or(|d| card.difficulty == d)
            && self.status.is_none_or(|s| card.status == s)
    }
}

/// Browsing and editing the card collection.
pub struct StudyDeck {
    repo: Arc<Repository>,
}

impl StudyDeck {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Matching cards, ordered by category, difficulty, then id.
    pub async fn browse(&self, filter: &DeckFilter) -> Vec<Flashcard> {
        self.repo
            .all_flashcards()
            .await
            .into_iter()
            .filter(|card| filter.matches(card))
            .collect()
    }

    pub async fn categories(&self) -> Vec<String> {
        let cards = self.repo.all_flashcards().await;
        let categories: BTreeSet<String> = cards.into_iter().map(|card| card.category).collect();
        categories.into_iter().collect()
    }

    pub async fn summary(&self) -> Vec<StatusCount> {
        self.repo.flashcard_summary().await
    }

    pub async fn detailed_summary(&self) -> Vec<DifficultyCount> {
        self.repo.flashcard_summary_with_difficulty().await
    }

    pub async fn add_card(&self, card: NewFlashcard) -> Result<u64, SdkError> {
        Ok(self.repo.add_flashcard(card).await?)
    }

    pub async fn edit_card(&self, id: u64, fields: NewFlashcard) -> Result<(), SdkError> {
        Ok(self.repo.update_flashcard(id, fields).await?)
    }

    pub async fn set_status(&self, id: u64, status: CardStatus) -> Result<(), SdkError> {
        Ok(self.repo.update_flashcard_status(id, status).await?)
    }

    pub async fn delete_card(&self, id: u64) -> Result<(), SdkError> {
        Ok(self.repo.delete_flashcard(id).await?)
    }
}
