//! Read-only guidance lookup used by coordinators.

use serde::{Deserialize, Serialize};

/// A guidance document returned for a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceDoc {
    pub title: String,
    pub body: String,
}

/// Source of guidance documents. Implementations must not mutate plan state.
pub trait KnowledgeBase: Send + Sync {
    /// Documents relevant to `topic`, most relevant first.
    fn guidance(&self, topic: &str) -> Vec<GuidanceDoc>;
}

/// In-memory knowledge base keyed by lowercase keywords.
#[derive(Debug, Default, Clone)]
pub struct StaticKnowledgeBase {
    entries: Vec<(Vec<String>, GuidanceDoc)>,
}

impl StaticKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document matched by any of `keywords`.
    pub fn with_doc<I, S>(mut self, keywords: I, doc: GuidanceDoc) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        self.entries.push((keywords, doc));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KnowledgeBase for StaticKnowledgeBase {
    fn guidance(&self, topic: &str) -> Vec<GuidanceDoc> {
        let topic = topic.to_lowercase();
        let mut scored: Vec<(usize, usize, &GuidanceDoc)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(idx, (keywords, doc))| {
                let hits = keywords.iter().filter(|k| topic.contains(k.as_str())).count();
                (hits > 0).then_some((hits, idx, doc))
            })
            .collect();

        // More keyword hits first; insertion order breaks ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, doc)| doc.clone()).collect()
    }
}
