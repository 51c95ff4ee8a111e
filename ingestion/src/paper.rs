//! Keyword mining from research papers: PDF text, token statistics and the
//! sentences that give a keyword its context.

use crate::drafting::KeywordExplainer;
use crate::seed::KeywordEntry;
use cardgraph_core::error::{CardgraphError, ErrorCode};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_CONTEXT_SENTENCES: usize = 3;

#[derive(Error, Debug)]
pub enum PaperError {
    #[error("PDF extraction failed: {0}")]
    Extract(String),
    #[error("PDF contains no extractable text")]
    NoText,
}

impl CardgraphError for PaperError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PaperError::Extract(_) => ErrorCode::InvalidArgument,
            PaperError::NoText => ErrorCode::FailedPrecondition,
        }
    }
}

pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, PaperError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| PaperError::Extract(err.to_string()))?;
    if text.trim().is_empty() {
        return Err(PaperError::NoText);
    }
    tracing::info!(chars = text.len(), "paper text extracted");
    Ok(text)
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercased alphanumeric words, minus stop words. Surrounding punctuation
/// is trimmed; words with inner punctuation (`self-attention`, `e.g`) are
/// dropped.
pub fn preprocess(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|raw| raw.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty() && word.chars().all(char::is_alphanumeric))
        .filter(|word| !is_stop_word(word))
        .map(str::to_string)
        .collect()
}

/// The `n` most frequent tokens with their counts; ties sort alphabetically.
pub fn top_terms(tokens: &[String], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(term, count)| (term.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// First `max_sentences` sentences (split on `.`) that mention `keyword`,
/// case-insensitively, joined by spaces.
pub fn keyword_context(text: &str, keyword: &str, max_sentences: usize) -> String {
    let needle = keyword.to_lowercase();
    text.split('.')
        .map(str::trim)
        .filter(|sentence| sentence.to_lowercase().contains(&needle))
        .take(max_sentences)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Explains each keyword from its context in `text`.
pub async fn explain_keywords(
    explainer: &KeywordExplainer,
    text: &str,
    keywords: &[String],
) -> Vec<KeywordEntry> {
    let mut entries = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let context = keyword_context(text, keyword, DEFAULT_CONTEXT_SENTENCES);
        if context.is_empty() {
            tracing::debug!(keyword = %keyword, "keyword not found in paper text");
        }
        let explanation = explainer.explain(keyword, &context).await;
        entries.push(KeywordEntry::new(keyword.clone(), explanation));
    }
    entries
}
