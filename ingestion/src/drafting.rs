//! LLM-backed drafting of flashcards, topic outlines and keyword explanations.

use crate::llm::{ChatMessage, CompletionClient, CompletionRequest};
use cardgraph_core::config::LlmConfig;
use cardgraph_core::error::{CardgraphError, ErrorCode};
use cardgraph_core::model::{Difficulty, NewFlashcard, NewTopic, TopicStatus, DEFAULT_IMPORTANCE_LEVEL};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use storage::{RepoError, Repository};
use thiserror::Error;

pub const QUESTION_MARKER: &str = "Question:";
pub const ANSWER_MARKER: &str = "Answer:";
pub const MIN_QUESTION_CHARS: usize = 15;
pub const MIN_ANSWER_CHARS: usize = 20;
pub const GENERATED_SOURCE: &str = "Generated";
pub const NO_EXPLANATION: &str = "No explanation available.";

const GENERATION_MAX_TOKENS: u32 = 400;
const GENERATION_TEMPERATURE: f32 = 0.7;
const FILTER_MAX_TOKENS: u32 = 400;
const FILTER_TEMPERATURE: f32 = 0.0;
const FILTER_SEPARATOR: &str = ", ";

const TUTOR_PROMPT: &str = "You provide excellent short summaries about data science and machine \
learning topics and convert them into question-answering pairs. You communicate complex topics at \
different levels of abstraction, from high level (basic) to very detailed (advanced). Add \
mathematical examples where they help understanding, check that your answer is factually \
correct, and add sources at the end of your response.";

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("completion failed: {0}")]
    Completion(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("{field} too short ({len} < {min} chars)")]
    TooShort {
        field: &'static str,
        len: usize,
        min: usize,
    },
    #[error("duplicate question: {0}")]
    Duplicate(String),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}

impl CardgraphError for DraftError {
    fn error_code(&self) -> ErrorCode {
        match self {
            DraftError::Completion(_) => ErrorCode::Internal,
            DraftError::MalformedResponse(_) | DraftError::TooShort { .. } => {
                ErrorCode::FailedPrecondition
            }
            DraftError::Duplicate(_) => ErrorCode::InvalidArgument,
            DraftError::Repo(err) => err.error_code(),
        }
    }
}

fn completion_error(err: anyhow::Error) -> DraftError {
    DraftError::Completion(format!("{err:#}"))
}

fn require_len(field: &'static str, text: &str, min: usize) -> Result<(), DraftError> {
    let len = text.chars().count();
    if len < min {
        return Err(DraftError::TooShort { field, len, min });
    }
    Ok(())
}

/// Text after the first `Answer:` marker, trimmed.
pub fn parse_answer(reply: &str) -> Result<String, DraftError> {
    let (_, answer) = reply
        .split_once(ANSWER_MARKER)
        .ok_or_else(|| DraftError::MalformedResponse(format!("missing {ANSWER_MARKER:?}")))?;
    let answer = answer.trim().to_string();
    require_len("answer", &answer, MIN_ANSWER_CHARS)?;
    Ok(answer)
}

/// Splits a `Question: ... Answer: ...` reply.
pub fn parse_question_answer(reply: &str) -> Result<(String, String), DraftError> {
    let (_, rest) = reply
        .split_once(QUESTION_MARKER)
        .ok_or_else(|| DraftError::MalformedResponse(format!("missing {QUESTION_MARKER:?}")))?;
    let (question, answer) = rest
        .split_once(ANSWER_MARKER)
        .ok_or_else(|| DraftError::MalformedResponse(format!("missing {ANSWER_MARKER:?}")))?;

    let question = question.trim().to_string();
    let answer = answer.trim().to_string();
    require_len("question", &question, MIN_QUESTION_CHARS)?;
    require_len("answer", &answer, MIN_ANSWER_CHARS)?;
    Ok((question, answer))
}

pub struct FlashcardDrafter {
    client: Arc<dyn CompletionClient>,
    repo: Arc<Repository>,
    config: LlmConfig,
}

impl FlashcardDrafter {
    pub fn new(client: Arc<dyn CompletionClient>, repo: Arc<Repository>, config: LlmConfig) -> Self {
        Self {
            client,
            repo,
            config,
        }
    }

    /// Asks the model to answer a fixed question. Nothing is stored.
    pub async fn draft_answer(
        &self,
        question: &str,
        category: &str,
        difficulty: Difficulty,
    ) -> Result<String, DraftError> {
        let prompt = format!(
            "Provide a detailed answer for the following question on the topic '{category}' \
             with a {difficulty} difficulty level. Format your response as follows:\n\
             Question: {question}\n\
             Answer: [Provide a detailed, precise answer here]"
        );
        let request = CompletionRequest::new(
            &self.config,
            vec![ChatMessage::user(prompt), ChatMessage::system(TUTOR_PROMPT)],
        );

        let reply = self.client.complete(request).await.map_err(completion_error)?;
        parse_answer(reply.trim())
    }

    /// Generates up to `count` new cards, allowing `2 * count` attempts.
    /// Rejected replies are logged and count as spent attempts. Returns the
    /// number of cards stored.
    pub async fn generate_flashcards(
        &self,
        category: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<usize, DraftError> {
        let mut seen: HashSet<String> = self
            .repo
            .all_questions()
            .await
            .into_iter()
            .map(|(_, question)| question.to_lowercase())
            .collect();

        let max_attempts = count * 2;
        let mut created = 0;
        let mut attempts = 0;

        while created < count && attempts < max_attempts {
            attempts += 1;

            let (question, answer) = match self.draft_card(category, difficulty, &seen).await {
                Ok(card) => card,
                Err(err) => {
                    tracing::warn!(attempt = attempts, error = %err, "flashcard draft rejected");
                    continue;
                }
            };

            let key = question.to_lowercase();
            if !seen.insert(key) {
                tracing::warn!(attempt = attempts, question = %question, "duplicate question drafted");
                continue;
            }

            let id = self
                .repo
                .add_flashcard(NewFlashcard::new(question, answer, category, difficulty))
                .await?;
            created += 1;
            tracing::info!(card_id = id, created, count, "flashcard generated");
        }

        if created < count {
            tracing::warn!(created, count, attempts, "could not generate all requested flashcards");
        }
        Ok(created)
    }

    async fn draft_card(
        &self,
        category: &str,
        difficulty: Difficulty,
        seen: &HashSet<String>,
    ) -> Result<(String, String), DraftError> {
        let mut previous: Vec<&str> = seen.iter().map(String::as_str).collect();
        previous.sort_unstable();

        let prompt = format!(
            "Generate a unique and specific flashcard on the topic '{category}' with a difficulty \
             level of {difficulty}. Ensure the question is distinct from these previously \
             generated questions: {previous:?}.\n\n\
             Format your response as follows:\n\
             Question: [Insert your unique, specific question here]\n\
             Answer: [Provide a detailed, precise answer here]"
        );
        let request = CompletionRequest::new(
            &self.config,
            vec![ChatMessage::user(prompt), ChatMessage::system(TUTOR_PROMPT)],
        )
        .with_limits(GENERATION_MAX_TOKENS, GENERATION_TEMPERATURE);

        let reply = self.client.complete(request).await.map_err(completion_error)?;
        parse_question_answer(reply.trim())
    }
}

/// Where a batch of drafted topics is filed. Outline files are JSON arrays
/// of these objects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopicOutline {
    pub category: String,
    #[serde(default)]
    pub sub_category_1: Option<String>,
    #[serde(default)]
    pub sub_category_2: Option<String>,
    #[serde(default)]
    pub sub_category_3: Option<String>,
    pub difficulty: Difficulty,
}

/// Result of drafting one topic per outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineReport {
    pub topic_ids: Vec<u64>,
    pub failed: usize,
}

impl TopicOutline {
    fn describe(&self) -> String {
        [
            self.sub_category_1.as_deref(),
            self.sub_category_2.as_deref(),
            self.sub_category_3.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Deserialize)]
struct DraftedTopic {
    topic_name: Option<String>,
    keyword: Option<String>,
    explanation: Option<String>,
    #[serde(default)]
    importance_level: Option<serde_json::Value>,
    source: Option<String>,
    status: Option<String>,
}

fn importance_from(value: Option<&serde_json::Value>) -> u8 {
    let level = match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match level {
        Some(level @ 1..=5) => level as u8,
        _ => DEFAULT_IMPORTANCE_LEVEL,
    }
}

fn keyword_from_name(name: &str) -> String {
    name.trim().to_lowercase().replace(char::is_whitespace, "_")
}

/// Accepts a bare JSON array, optionally inside a Markdown code fence.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

pub struct TopicDrafter {
    client: Arc<dyn CompletionClient>,
    repo: Arc<Repository>,
    config: LlmConfig,
}

impl TopicDrafter {
    pub fn new(client: Arc<dyn CompletionClient>, repo: Arc<Repository>, config: LlmConfig) -> Self {
        Self {
            client,
            repo,
            config,
        }
    }

    /// Drafts `count` topics under `outline` and stores them. The whole batch
    /// is rejected if the reply is not a JSON array or any entry lacks a name
    /// or explanation. Returns the new topic ids.
    pub async fn create_topics(
        &self,
        outline: &TopicOutline,
        count: usize,
    ) -> Result<Vec<u64>, DraftError> {
        let prompt = format!(
            "Create an overview of {count} unique topics on a {difficulty} level for the domain \
             of {category}, specifically the sub-domains {subs}. Each topic should include a \
             brief explanation and be suitable for flashcards. Format your response as a JSON \
             array of objects with the fields \"topic_name\", \"keyword\" (lowercase name with \
             underscores), \"explanation\", \"importance_level\" (1 to 5), \"source\" and \
             \"status\" (unknown, learning or known). Ensure the output is strictly a valid \
             JSON array.",
            difficulty = outline.difficulty,
            category = outline.category,
            subs = outline.describe(),
        );
        let request = CompletionRequest::new(&self.config, vec![ChatMessage::user(prompt)])
            .with_limits(self.config.topic_max_tokens, self.config.topic_temperature);

        let reply = self.client.complete(request).await.map_err(completion_error)?;
        let drafted: Vec<DraftedTopic> = serde_json::from_str(strip_code_fence(&reply))
            .map_err(|err| DraftError::MalformedResponse(format!("expected a JSON array of topics: {err}")))?;

        let added_date = chrono::Utc::now().date_naive().to_string();
        let mut topics = Vec::with_capacity(drafted.len());
        for entry in drafted {
            let (Some(name), Some(explanation)) = (
                entry.topic_name.filter(|s| !s.trim().is_empty()),
                entry.explanation.filter(|s| !s.trim().is_empty()),
            ) else {
                return Err(DraftError::MalformedResponse(
                    "topic entry missing name or explanation".to_string(),
                ));
            };

            let keyword = entry
                .keyword
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| keyword_from_name(&name));

            let mut topic = NewTopic::new(name, keyword, explanation).with_hierarchy(
                Some(outline.category.clone()),
                outline.sub_category_1.clone(),
                outline.sub_category_2.clone(),
                outline.sub_category_3.clone(),
            );
            topic.difficulty = outline.difficulty;
            topic.importance_level = importance_from(entry.importance_level.as_ref());
            topic.source = Some(entry.source.unwrap_or_else(|| GENERATED_SOURCE.to_string()));
            topic.status = entry
                .status
                .and_then(|s| s.parse::<TopicStatus>().ok())
                .unwrap_or_default();
            topic.added_date = Some(added_date.clone());
            topics.push(topic);
        }

        let mut ids = Vec::with_capacity(topics.len());
        for topic in topics {
            ids.push(self.repo.add_topic(topic).await?);
        }
        if ids.len() != count {
            tracing::warn!(requested = count, received = ids.len(), "topic count differs from request");
        }
        tracing::info!(category = %outline.category, topics = ids.len(), "topics created");
        Ok(ids)
    }

    /// Drafts one topic per outline, in order. A rejected reply only skips its
    /// outline; repository failures abort the run.
    pub async fn create_from_outlines(
        &self,
        outlines: &[TopicOutline],
    ) -> Result<OutlineReport, DraftError> {
        let mut report = OutlineReport::default();

        for outline in outlines {
            tracing::info!(
                category = %outline.category,
                path = %outline.describe(),
                difficulty = %outline.difficulty,
                "drafting topic"
            );
            match self.create_topics(outline, 1).await {
                Ok(ids) => report.topic_ids.extend(ids),
                Err(DraftError::Repo(err)) => return Err(DraftError::Repo(err)),
                Err(err) => {
                    tracing::warn!(category = %outline.category, error = %err, "topic draft rejected");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Explains a keyword from the passages it appears in.
pub struct KeywordExplainer {
    client: Arc<dyn CompletionClient>,
    config: LlmConfig,
}

impl KeywordExplainer {
    pub fn new(client: Arc<dyn CompletionClient>, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Never fails: a backend error yields [`NO_EXPLANATION`].
    pub async fn explain(&self, keyword: &str, context: &str) -> String {
        let prompt = format!(
            "Explain the keyword '{keyword}' based on the following context from a scientific \
             paper:\n\n{context}\n\nProvide a concise and clear explanation suitable for someone \
             with a basic understanding of the topic."
        );
        let request = CompletionRequest::new(&self.config, vec![ChatMessage::user(prompt)])
            .with_limits(GENERATION_MAX_TOKENS, GENERATION_TEMPERATURE);

        match self.client.complete(request).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => NO_EXPLANATION.to_string(),
            Err(err) => {
                tracing::error!(keyword, error = %err, "keyword explanation failed");
                NO_EXPLANATION.to_string()
            }
        }
    }

    /// Asks the model to keep only conceptual terms. Never fails: a backend
    /// error or an empty reply returns `keywords` unchanged.
    pub async fn filter_keywords(&self, keywords: &[String]) -> Vec<String> {
        if keywords.is_empty() {
            return Vec::new();
        }

        let prompt = format!(
            "Filter this list so only scientific expressions remain, basically keywords: \
             '{keywords:?}'. Provide a filtered list which only contains expressions which are \
             conceptual and represent or might represent a topic, filter out all gibberish. Be \
             aware that new expressions could be introduced, but they usually have some relation \
             to the provided context. E.g. 'Label Smoothing' is a new concept, whereas names of \
             people and numbers are not. Reply with the remaining expressions separated by \
             \"{FILTER_SEPARATOR}\"."
        );
        let request = CompletionRequest::new(&self.config, vec![ChatMessage::user(prompt)])
            .with_limits(FILTER_MAX_TOKENS, FILTER_TEMPERATURE);

        match self.client.complete(request).await {
            Ok(reply) => {
                let filtered = split_keyword_list(&reply);
                if filtered.is_empty() {
                    tracing::warn!(candidates = keywords.len(), "keyword filter returned nothing");
                    return keywords.to_vec();
                }
                tracing::debug!(candidates = keywords.len(), kept = filtered.len(), "keywords filtered");
                filtered
            }
            Err(err) => {
                tracing::error!(candidates = keywords.len(), error = %err, "keyword filtering failed");
                keywords.to_vec()
            }
        }
    }
}

fn split_keyword_list(reply: &str) -> Vec<String> {
    reply
        .trim()
        .split(FILTER_SEPARATOR)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
