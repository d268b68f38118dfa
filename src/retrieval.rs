//! Knowledge snippet retrieval for prompt enrichment.
//!
//! The index is a JSON metadata file of knowledge chunks. Search scores
//! `example` chunks by query-term overlap, groups hits by topic, and merges
//! each topic's texts into one snippet. An empty result is a normal
//! outcome — the composer substitutes its placeholder.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RetrievalError;

/// Chunk type eligible for retrieval.
const EXAMPLE_CHUNK: &str = "example";

/// A single indexed knowledge chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeEntry {
    pub text: String,
    #[serde(default)]
    pub chunk_type: String,
    #[serde(default)]
    pub topic_path: String,
}

/// Similarity-retrieval collaborator: query text in, snippets out.
#[async_trait]
pub trait SnippetIndex: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Vec<String>;
}

/// Term-overlap index over a knowledge metadata file.
pub struct KeywordIndex {
    entries: Vec<KnowledgeEntry>,
}

impl KeywordIndex {
    /// Load the metadata file. Missing or malformed files are load errors;
    /// the caller decides whether to run without retrieval.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&raw)
            .map_err(|e| RetrievalError::Parse(format!("{}: {e}", path.display())))?;
        Ok(Self { entries })
    }

    /// Build an index from in-memory entries.
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SnippetIndex for KeywordIndex {
    async fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &KnowledgeEntry)> = self
            .entries
            .iter()
            .filter(|e| e.chunk_type == EXAMPLE_CHUNK)
            .filter_map(|e| {
                let entry_terms = terms(&e.text);
                let overlap = query_terms.intersection(&entry_terms).count();
                (overlap > 0).then_some((overlap, e))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(top_k);

        // Merge hits that share a topic, preserving first-seen topic order.
        let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
        for (_score, entry) in &scored {
            match grouped.iter_mut().find(|(t, _)| *t == entry.topic_path) {
                Some((_, texts)) => texts.push(entry.text.as_str()),
                None => grouped.push((entry.topic_path.as_str(), vec![entry.text.as_str()])),
            }
        }
        grouped
            .into_iter()
            .map(|(_, texts)| texts.join(". "))
            .collect()
    }
}
