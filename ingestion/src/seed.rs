//! Keyword lists to topic records.
//!
//! Keyword files come in two shapes: plain text with `Keyword:` and
//! `Explanation:` lines, and a JSON array of `{"Keyword", "Explanation"}`
//! objects. Seeding inserts one topic per complete entry.

use crate::drafting::TopicOutline;
use cardgraph_core::error::{CardgraphError, ErrorCode};
use cardgraph_core::model::{Difficulty, NewTopic, TopicStatus, PAPER_SOURCE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use storage::{RepoError, Repository};
use thiserror::Error;

const KEYWORD_PREFIX: &str = "Keyword:";
const EXPLANATION_PREFIX: &str = "Explanation:";

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid keyword file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}

impl CardgraphError for SeedError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SeedError::Io(_) => ErrorCode::Internal,
            SeedError::Json(_) => ErrorCode::InvalidArgument,
            SeedError::Repo(err) => err.error_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    #[serde(rename = "Keyword", default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(rename = "Explanation", default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl KeywordEntry {
    pub fn new(keyword: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            explanation: Some(explanation.into()),
        }
    }

    fn complete(&self) -> Option<(&str, &str)> {
        let keyword = self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let explanation = self
            .explanation
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())?;
        Some((keyword, explanation))
    }
}

/// Each `Keyword:` line opens an entry; a following `Explanation:` line
/// fills it. Other lines are ignored.
pub fn parse_keyword_text(text: &str) -> Vec<KeywordEntry> {
    let mut entries = Vec::new();
    let mut current: Option<KeywordEntry> = None;

    for line in text.lines().map(str::trim) {
        if let Some(keyword) = line.strip_prefix(KEYWORD_PREFIX) {
            entries.extend(current.take());
            current = Some(KeywordEntry {
                keyword: Some(keyword.trim().to_string()),
                explanation: None,
            });
        } else if let Some(explanation) = line.strip_prefix(EXPLANATION_PREFIX) {
            match current.as_mut() {
                Some(entry) => entry.explanation = Some(explanation.trim().to_string()),
                None => tracing::debug!("explanation line without a keyword ignored"),
            }
        }
    }
    entries.extend(current);
    entries
}

pub async fn write_keyword_json(path: impl AsRef<Path>, entries: &[KeywordEntry]) -> Result<(), SeedError> {
    let json = serde_json::to_vec_pretty(entries)?;
    tokio::fs::write(path.as_ref(), json).await?;
    Ok(())
}

pub async fn read_keyword_json(path: impl AsRef<Path>) -> Result<Vec<KeywordEntry>, SeedError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Reads a JSON array of topic outlines, one drafted topic per entry.
pub async fn read_topic_outlines(path: impl AsRef<Path>) -> Result<Vec<TopicOutline>, SeedError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Attributes applied to every seeded topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedDefaults {
    pub difficulty: Difficulty,
    pub importance_level: u8,
    pub source: String,
    pub status: TopicStatus,
    pub category: Option<String>,
    pub sub_category_1: Option<String>,
    pub sub_category_2: Option<String>,
    pub sub_category_3: Option<String>,
}

impl SeedDefaults {
    /// Files every seeded topic under the given category path.
    pub fn with_hierarchy(
        mut self,
        category: Option<String>,
        sub_category_1: Option<String>,
        sub_category_2: Option<String>,
        sub_category_3: Option<String>,
    ) -> Self {
        self.category = category;
        self.sub_category_1 = sub_category_1;
        self.sub_category_2 = sub_category_2;
        self.sub_category_3 = sub_category_3;
        self
    }
}

impl Default for SeedDefaults {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Advanced,
            importance_level: 5,
            source: PAPER_SOURCE.to_string(),
            status: TopicStatus::Unknown,
            category: None,
            sub_category_1: None,
            sub_category_2: None,
            sub_category_3: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

pub async fn seed_topics(
    repo: &Repository,
    entries: &[KeywordEntry],
    defaults: &SeedDefaults,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    for (position, entry) in entries.iter().enumerate() {
        let Some((keyword, explanation)) = entry.complete() else {
            tracing::warn!(position, "skipping keyword entry without keyword or explanation");
            report.skipped += 1;
            continue;
        };

        let mut topic = NewTopic::new(keyword, keyword, explanation).with_hierarchy(
            defaults.category.clone(),
            defaults.sub_category_1.clone(),
            defaults.sub_category_2.clone(),
            defaults.sub_category_3.clone(),
        );
        topic.difficulty = defaults.difficulty;
        topic.importance_level = defaults.importance_level;
        topic.source = Some(defaults.source.clone());
        topic.status = defaults.status;
        topic.added_date = Some(chrono::Utc::now().date_naive().to_string());

        let id = repo.add_topic(topic).await?;
        tracing::debug!(topic_id = id, keyword, "seeded topic");
        report.inserted += 1;
    }

    tracing::info!(inserted = report.inserted, skipped = report.skipped, "topics seeded");
    Ok(report)
}

pub async fn seed_topics_from_json(
    repo: &Repository,
    path: impl AsRef<Path>,
    defaults: &SeedDefaults,
) -> Result<SeedReport, SeedError> {
    let entries = read_keyword_json(path).await?;
    seed_topics(repo, &entries, defaults).await
}
