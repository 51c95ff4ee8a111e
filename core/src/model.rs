use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Identifier of an embedded item: flashcard and topic ids are integers,
/// file-scoped or hand-named items use strings.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[archive(check_bytes)]
#[serde(untagged)]
pub enum ItemId {
    Int(u64),
    Name(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(id) => write!(f, "{}", id),
            ItemId::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        ItemId::Int(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId::Name(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        ItemId::Name(value)
    }
}

#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[archive(check_bytes)]
pub struct EmbeddingRecord {
    pub id: ItemId,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(id: impl Into<ItemId>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Display grouping of item ids by the source collection they came from.
/// Groups are 1-based and never influence similarity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAssignment {
    groups: HashMap<ItemId, u32>,
}

impl GroupAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, id: ItemId, group: u32) {
        self.groups.insert(id, group);
    }

    pub fn group_of(&self, id: &ItemId) -> Option<u32> {
        self.groups.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromIterator<(ItemId, u32)> for GroupAssignment {
    fn from_iter<T: IntoIterator<Item = (ItemId, u32)>>(iter: T) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ModelError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
)]
#[archive(check_bytes)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

string_enum!(Difficulty, "difficulty", {
    Basic => "basic",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
)]
#[archive(check_bytes)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    #[default]
    Unknown,
    Known,
}

string_enum!(CardStatus, "card status", {
    Unknown => "unknown",
    Known => "known",
});

#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
)]
#[archive(check_bytes)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    #[default]
    Unknown,
    Known,
    Learning,
}

string_enum!(TopicStatus, "topic status", {
    Unknown => "unknown",
    Known => "known",
    Learning => "learning",
});

#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[archive(check_bytes)]
pub struct Flashcard {
    pub id: u64,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub status: CardStatus,
}

/// Editable part of a flashcard; used for both insert and full update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewFlashcard {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub difficulty: Difficulty,
}

impl NewFlashcard {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        category: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            category: category.into(),
            difficulty,
        }
    }
}

pub const DEFAULT_IMPORTANCE_LEVEL: u8 = 3;
pub const PAPER_SOURCE: &str = "PAPER";

#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[archive(check_bytes)]
pub struct Topic {
    pub id: u64,
    pub topic_name: String,
    pub keyword: String,
    pub explanation: String,
    pub embedding: Option<Vec<f32>>,
    pub category: Option<String>,
    pub sub_category_1: Option<String>,
    pub sub_category_2: Option<String>,
    pub sub_category_3: Option<String>,
    pub difficulty: Difficulty,
    /// 1 (low) to 5 (high).
    pub importance_level: u8,
    pub source: Option<String>,
    /// `YYYY-MM-DD`
    pub added_date: Option<String>,
    pub last_reviewed: Option<String>,
    pub status: TopicStatus,
}

impl Topic {
    pub fn is_from_source(&self, source: &str) -> bool {
        self.source.as_deref() == Some(source)
    }

    /// Category path from the root down, skipping unset levels.
    pub fn hierarchy_path(&self) -> Vec<&str> {
        [
            self.category.as_deref(),
            self.sub_category_1.as_deref(),
            self.sub_category_2.as_deref(),
            self.sub_category_3.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|level| !level.is_empty())
        .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewTopic {
    pub topic_name: String,
    pub keyword: String,
    pub explanation: String,
    pub embedding: Option<Vec<f32>>,
    pub category: Option<String>,
    pub sub_category_1: Option<String>,
    pub sub_category_2: Option<String>,
    pub sub_category_3: Option<String>,
    pub difficulty: Difficulty,
    pub importance_level: u8,
    pub source: Option<String>,
    pub added_date: Option<String>,
    pub last_reviewed: Option<String>,
    pub status: TopicStatus,
}

impl NewTopic {
    pub fn new(
        topic_name: impl Into<String>,
        keyword: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            topic_name: topic_name.into(),
            keyword: keyword.into(),
            explanation: explanation.into(),
            embedding: None,
            category: None,
            sub_category_1: None,
            sub_category_2: None,
            sub_category_3: None,
            difficulty: Difficulty::default(),
            importance_level: DEFAULT_IMPORTANCE_LEVEL,
            source: None,
            added_date: None,
            last_reviewed: None,
            status: TopicStatus::default(),
        }
    }

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

    pub fn into_topic(self, id: u64) -> Topic {
        Topic {
            id,
            topic_name: self.topic_name,
            keyword: self.keyword,
            explanation: self.explanation,
            embedding: self.embedding,
            category: self.category,
            sub_category_1: self.sub_category_1,
            sub_category_2: self.sub_category_2,
            sub_category_3: self.sub_category_3,
            difficulty: self.difficulty,
            importance_level: self.importance_level,
            source: self.source,
            added_date: self.added_date,
            last_reviewed: self.last_reviewed,
            status: self.status,
        }
    }
}
