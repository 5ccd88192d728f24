mod data;

pub mod controller;
pub mod loader;
pub mod render;
#[cfg(feature = "web")]
pub mod web;

pub use controller::{
    BlockState, BlockView, Catalog, Effect, Event, Provenance, ScrollAlign, UnknownTopic, ViewState,
};
pub use data::fallback_collection;
pub use loader::{DataSource, DataUnavailable, LoadOutcome, LoaderConfig, RecoveryPolicy};
pub use render::{LinkMode, PageOptions, PageShell};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single external resource attached to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

/// A named subject with a description and an ordered list of links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Topic {
    /// Returns true when the name or description contains `needle`.
    ///
    /// `needle` must already be normalized with [`normalize_query`].
    pub fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Trims and lower-cases a search query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

#[derive(Debug)]
pub enum CollectionError {
    Malformed(serde_json::Error),
    DuplicateId(String),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Malformed(err) => write!(f, "malformed topic document: {err}"),
            CollectionError::DuplicateId(id) => write!(f, "duplicate topic id {id:?}"),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectionError::Malformed(err) => Some(err),
            CollectionError::DuplicateId(_) => None,
        }
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(value: serde_json::Error) -> Self {
        CollectionError::Malformed(value)
    }
}

/// Ordered, immutable set of topics with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TopicCollection {
    topics: Vec<Topic>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TopicCollection {
    pub fn new(topics: Vec<Topic>) -> Result<Self, CollectionError> {
        let mut index = HashMap::with_capacity(topics.len());
        for (position, topic) in topics.iter().enumerate() {
            if index.insert(topic.id.clone(), position).is_some() {
                return Err(CollectionError::DuplicateId(topic.id.clone()));
            }
        }
        Ok(Self { topics, index })
    }

    /// Parses a JSON array of topics.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CollectionError> {
        let topics: Vec<Topic> = serde_json::from_slice(bytes)?;
        Self::new(topics)
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Topic> {
        self.position(id).map(|position| &self.topics[position])
    }

    /// Returns the index of the topic with `id` in collection order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Returns topics whose name or description contains `query`, ignoring case.
    /// An empty or whitespace-only query returns every topic.
    pub fn search(&self, query: &str) -> Vec<&Topic> {
        let needle = normalize_query(query);
        self.topics
            .iter()
            .filter(|topic| topic.matches(&needle))
            .collect()
    }
}

impl<'a> IntoIterator for &'a TopicCollection {
    type Item = &'a Topic;
    type IntoIter = std::slice::Iter<'a, Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.topics.iter()
    }
}
