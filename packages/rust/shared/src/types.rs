//! Core domain types: the transient [`Article`], the validated [`QuizDraft`],
//! and the persisted [`Quiz`] aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fewest questions a quiz may carry.
pub const MIN_QUESTIONS: usize = 5;

/// Most questions a quiz may carry.
pub const MAX_QUESTIONS: usize = 10;

/// Every question has exactly this many answer options.
pub const OPTIONS_PER_QUESTION: usize = 4;

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// Normalized article text produced by the extractor. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Page heading, or a sentinel when the page has none.
    pub title: String,
    /// Paragraph text joined by blank lines, capped in length.
    pub content: String,
    /// Second-level headings in document order (duplicates kept).
    pub sections: Vec<String>,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Storage / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Key entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    People,
    Organizations,
    Locations,
}

impl EntityCategory {
    /// All categories, in the order they are persisted.
    pub const ALL: [EntityCategory; 3] = [Self::People, Self::Organizations, Self::Locations];

    /// Storage / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Organizations => "organizations",
            Self::Locations => "locations",
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "people" => Ok(Self::People),
            "organizations" => Ok(Self::Organizations),
            "locations" => Ok(Self::Locations),
            other => Err(format!("unknown entity category '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// QuizDraft
// ---------------------------------------------------------------------------

/// Validated, not-yet-persisted model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub summary: String,
    pub key_entities: DraftEntities,
    pub questions: Vec<DraftQuestion>,
    pub related_topics: Vec<String>,
}

/// Entity names grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEntities {
    pub people: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
}

impl DraftEntities {
    /// Names for one category.
    pub fn names(&self, category: EntityCategory) -> &[String] {
        match category {
            EntityCategory::People => &self.people,
            EntityCategory::Organizations => &self.organizations,
            EntityCategory::Locations => &self.locations,
        }
    }
}

/// One validated question: `answer` is guaranteed to equal exactly one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub difficulty: Difficulty,
    pub explanation: String,
}

// ---------------------------------------------------------------------------
// Quiz graph (persisted, fully hydrated)
// ---------------------------------------------------------------------------

/// A stored quiz with all of its owned collections populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
    pub key_entities: Vec<KeyEntity>,
    pub sections: Vec<Section>,
    pub related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub options: Vec<QuizOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntity {
    pub id: i64,
    pub category: EntityCategory,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTopic {
    pub id: i64,
    pub topic: String,
}
