//! The content items held by modules.
//!
//! The loader itself treats a decoded module as an opaque [`ModuleContents`] value. Only the
//! facade and the [`filter`] helpers look at the individual items.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::caching::CacheContents;

pub mod filter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[serde(alias = "beginner")]
    Easy,
    #[serde(alias = "intermediate")]
    Medium,
    #[serde(alias = "advanced")]
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

/// A lesson card of a learning category.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct InterviewQuestion {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DesignPattern {
    pub id: String,
    pub name: String,
    /// One of the classic families, e.g. `creational`.
    pub category: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CodingQuestion {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// One step of the learning roadmap.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoadmapNode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Ids of the nodes that should be completed first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Common read access used by the [`filter`] helpers.
pub trait CatalogItem {
    fn id(&self) -> &str;

    fn category(&self) -> &str;

    fn difficulty(&self) -> Option<Difficulty> {
        None
    }

    fn tags(&self) -> &[String] {
        &[]
    }

    /// The fields matched by free-text search.
    fn text(&self) -> Vec<&str>;
}

impl CatalogItem for Lesson {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        vec![
            self.title.as_str(),
            self.summary.as_str(),
            self.content.as_str(),
        ]
    }
}

impl CatalogItem for Note {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.content.as_str()]
    }
}

impl CatalogItem for Quiz {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        std::iter::once(self.title.as_str())
            .chain(self.questions.iter().map(|q| q.prompt.as_str()))
            .collect()
    }
}

impl CatalogItem for InterviewQuestion {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        vec![self.question.as_str(), self.answer.as_str()]
    }
}

impl CatalogItem for DesignPattern {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.intent.as_str()]
    }
}

impl CatalogItem for CodingQuestion {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }
}

impl CatalogItem for RoadmapNode {
    fn id(&self) -> &str {
        &self.id
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn text(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }
}

/// The item family a module decodes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentShape {
    Lessons,
    Notes,
    Quizzes,
    InterviewQuestions,
    DesignPatterns,
    CodingQuestions,
    Roadmap,
}

impl AsRef<str> for ContentShape {
    fn as_ref(&self) -> &str {
        match self {
            Self::Lessons => "lessons",
            Self::Notes => "notes",
            Self::Quizzes => "quizzes",
            Self::InterviewQuestions => "interview_questions",
            Self::DesignPatterns => "design_patterns",
            Self::CodingQuestions => "coding_questions",
            Self::Roadmap => "roadmap",
        }
    }
}

impl fmt::Display for ContentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

fn decode_items<T: DeserializeOwned>(raw: &[u8]) -> CacheContents<Arc<[T]>> {
    let items: Vec<T> = serde_json::from_slice(raw)?;
    Ok(items.into())
}

impl ContentShape {
    /// Decodes a raw module, a JSON array of items, into its typed contents.
    pub fn decode(self, raw: &[u8]) -> CacheContents<ModuleContents> {
        Ok(match self {
            Self::Lessons => ModuleContents::Lessons(decode_items(raw)?),
            Self::Notes => ModuleContents::Notes(decode_items(raw)?),
            Self::Quizzes => ModuleContents::Quizzes(decode_items(raw)?),
            Self::InterviewQuestions => ModuleContents::InterviewQuestions(decode_items(raw)?),
            Self::DesignPatterns => ModuleContents::DesignPatterns(decode_items(raw)?),
            Self::CodingQuestions => ModuleContents::CodingQuestions(decode_items(raw)?),
            Self::Roadmap => ModuleContents::Roadmap(decode_items(raw)?),
        })
    }
}

/// The immutable, decoded payload of one module.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModuleContents {
    Lessons(Arc<[Lesson]>),
    Notes(Arc<[Note]>),
    Quizzes(Arc<[Quiz]>),
    InterviewQuestions(Arc<[InterviewQuestion]>),
    DesignPatterns(Arc<[DesignPattern]>),
    CodingQuestions(Arc<[CodingQuestion]>),
    Roadmap(Arc<[RoadmapNode]>),
}

impl ModuleContents {
    pub fn shape(&self) -> ContentShape {
        match self {
            Self::Lessons(_) => ContentShape::Lessons,
            Self::Notes(_) => ContentShape::Notes,
            Self::Quizzes(_) => ContentShape::Quizzes,
            Self::InterviewQuestions(_) => ContentShape::InterviewQuestions,
            Self::DesignPatterns(_) => ContentShape::DesignPatterns,
            Self::CodingQuestions(_) => ContentShape::CodingQuestions,
            Self::Roadmap(_) => ContentShape::Roadmap,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Lessons(items) => items.len(),
            Self::Notes(items) => items.len(),
            Self::Quizzes(items) => items.len(),
            Self::InterviewQuestions(items) => items.len(),
            Self::DesignPatterns(items) => items.len(),
            Self::CodingQuestions(items) => items.len(),
            Self::Roadmap(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An item type that can be extracted from [`ModuleContents`].
pub trait ContentFamily: CatalogItem + Clone + Send + Sync + 'static {
    const SHAPE: ContentShape;

    fn extract(contents: &ModuleContents) -> Option<&Arc<[Self]>>;
}

macro_rules! content_family {
    ($item:ty, $variant:ident) => {
        impl ContentFamily for $item {
            const SHAPE: ContentShape = ContentShape::$variant;

            fn extract(contents: &ModuleContents) -> Option<&Arc<[Self]>> {
                match contents {
                    ModuleContents::$variant(items) => Some(items),
                    _ => None,
                }
            }
        }
    };
}

content_family!(Lesson, Lessons);
content_family!(Note, Notes);
content_family!(Quiz, Quizzes);
content_family!(InterviewQuestion, InterviewQuestions);
content_family!(DesignPattern, DesignPatterns);
content_family!(CodingQuestion, CodingQuestions);
content_family!(RoadmapNode, Roadmap);
