use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A link discovered on a category listing page, not fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleReference {
    pub title: String,
    pub url: String,
}

impl ArticleReference {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// What an adapter extracted from an article page. `url` is the
/// deduplication key for everything downstream of fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub image_url: Option<String>,
    pub source_name: String,
    pub category: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedArticle {
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub image_url: Option<String>,
    pub source_name: String,
    pub category: String,
    pub fetched_at: DateTime<Utc>,
    /// Detected language of the fetched text (ISO 639-1, or `und`).
    pub language: String,
    /// Whether `title` and `body_text` hold translator output.
    #[serde(default)]
    pub translated: bool,
}

impl ProcessedArticle {
    /// Builds a processed article from its raw form with a cleaned body.
    pub fn from_raw(raw: RawArticle, body_text: String, language: impl Into<String>) -> Self {
        Self {
            url: raw.url,
            title: raw.title,
            body_text,
            image_url: raw.image_url,
            source_name: raw.source_name,
            category: raw.category,
            fetched_at: raw.fetched_at,
            language: language.into(),
            translated: false,
        }
    }
}

/// An article with no sufficiently similar peer in its batch.
pub type Singleton = ProcessedArticle;

/// Articles judged to report the same event.
///
/// Always holds at least two members. The representative is the first
/// member, i.e. the first one seen in source-iteration order, not the
/// longest or otherwise "best" article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryGroup {
    members: Vec<ProcessedArticle>,
}

impl StoryGroup {
    /// Returns `None` when fewer than two members are given.
    pub fn new(members: Vec<ProcessedArticle>) -> Option<Self> {
        (members.len() >= 2).then_some(Self { members })
    }

    pub fn representative(&self) -> &ProcessedArticle {
        &self.members[0]
    }

    pub fn members(&self) -> &[ProcessedArticle] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_members(self) -> Vec<ProcessedArticle> {
        self.members
    }
}

/// Partition of one category's batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Grouping {
    pub groups: Vec<StoryGroup>,
    pub singletons: Vec<Singleton>,
}

impl Grouping {
    pub fn all_singletons(articles: Vec<ProcessedArticle>) -> Self {
        Self {
            groups: Vec::new(),
            singletons: articles,
        }
    }

    pub fn article_count(&self) -> usize {
        self.groups.iter().map(StoryGroup::len).sum::<usize>() + self.singletons.len()
    }
}

/// One invocation of the pipeline. Only its outputs are persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRun {
    pub started_at: DateTime<Utc>,
    pub articles: BTreeMap<String, Vec<ProcessedArticle>>,
    pub groups: BTreeMap<String, Vec<StoryGroup>>,
    pub singletons: BTreeMap<String, Vec<Singleton>>,
}

impl CollectionRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            articles: BTreeMap::new(),
            groups: BTreeMap::new(),
            singletons: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, category: &str, articles: Vec<ProcessedArticle>, grouping: Grouping) {
        self.articles.insert(category.to_string(), articles);
        self.groups.insert(category.to_string(), grouping.groups);
        self.singletons
            .insert(category.to_string(), grouping.singletons);
    }
}
