//! Retrieval-augmented context assembly.
//!
//! Given a main query and optional sub-queries, retrieves the top-k
//! chunks for each from the code context table, deduplicates them, and
//! renders a token-bounded composite context. The context is always
//! appended to the user prompt under a clearly delimited section, never
//! spliced into the middle.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::storage::{Filter, VectorStore};

/// Default token budget for assembled context.
pub const DEFAULT_TOKEN_BUDGET: usize = 6000;

/// Default hits retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Header line that introduces the retrieved-context section.
pub const CONTEXT_HEADER: &str = "# Relevant Code Context (retrieved)";

/// A retrieval request for context assembly.
#[derive(Debug, Clone)]
pub struct ContextQuery {
    /// Primary query text.
    pub main_query: String,
    /// Additional queries, each retrieved independently.
    pub sub_queries: Vec<String>,
    /// Equality filters applied to every retrieval.
    pub filters: Vec<Filter>,
    /// Token budget for the assembled context.
    pub token_budget: usize,
    /// Hits per query.
    pub top_k: usize,
}

impl ContextQuery {
    /// Creates a query with default budget and depth.
    #[must_use]
    pub fn new(main_query: &str) -> Self {
        Self {
            main_query: main_query.to_string(),
            sub_queries: Vec::new(),
            filters: Vec::new(),
            token_budget: DEFAULT_TOKEN_BUDGET,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Adds a sub-query.
    #[must_use]
    pub fn sub_query(mut self, query: &str) -> Self {
        self.sub_queries.push(query.to_string());
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Overrides the token budget.
    #[must_use]
    pub const fn token_budget(mut self, budget: usize) -> Self {
        self.token_budget = budget;
        self
    }
}

/// Assembles bounded retrieval context from the code context table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    /// Creates a context builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Retrieves and renders context for a query.
    ///
    /// Results are unique by chunk id across the main query and all
    /// sub-queries, concatenated in retrieval order, and truncated at
    /// chunk granularity to the token budget (~4 characters per token).
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or retrieval fails.
    pub fn build(
        &self,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
        query: &ContextQuery,
    ) -> Result<String> {
        let mut seen = std::collections::HashSet::new();
        let mut sections = Vec::new();
        let mut spent_tokens = 0usize;

        let mut queries = vec![query.main_query.clone()];
        queries.extend(query.sub_queries.iter().cloned());

        'outer: for text in &queries {
            let vector = embedder.embed(text)?;
            let hits = store.top_k(&vector, query.top_k, &query.filters)?;
            for hit in hits {
                if !seen.insert(hit.item.chunk_id.clone()) {
                    continue;
                }
                let section = format!(
                    "--- Start Chunk: {}:{} ---\n{}\n--- End Chunk: {}:{} ---",
                    hit.item.path,
                    hit.item.chunk_name,
                    hit.item.content,
                    hit.item.path,
                    hit.item.chunk_name,
                );
                let cost = section.len().div_ceil(4);
                if spent_tokens + cost > query.token_budget {
                    tracing::debug!(
                        kept = sections.len(),
                        budget = query.token_budget,
                        "context budget reached"
                    );
                    break 'outer;
                }
                spent_tokens += cost;
                sections.push(section);
            }
        }

        Ok(sections.join("\n\n"))
    }
}

/// Appends retrieved context to a prompt under a delimited section.
///
/// An empty context leaves the prompt untouched.
#[must_use]
pub fn apply_context(prompt: &str, context: &str) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }
    format!("{prompt}\n\n{CONTEXT_HEADER}\n{context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, ChunkKind};
    use crate::embedding::HashEmbedder;
    use crate::storage::SqliteStore;

    const DIMS: usize = 32;

    fn seeded_store(embedder: &HashEmbedder, entries: &[(&str, &str, &str)]) -> SqliteStore {
        let mut store = SqliteStore::in_memory(DIMS).unwrap();
        store.init().unwrap();
        let chunks: Vec<Chunk> = entries
            .iter()
            .map(|(path, name, content)| {
                let mut chunk =
                    Chunk::new(path, name, ChunkKind::Function, content, 1, 1, "python");
                chunk.vector = embedder.embed(content).unwrap();
                chunk
            })
            .collect();
        store.upsert_chunks(&chunks).unwrap();
        store
    }

    #[test]
    fn test_build_returns_delimited_chunks() {
        let embedder = HashEmbedder::new(DIMS);
        let store = seeded_store(
            &embedder,
            &[("m.py", "greet", "def greet(name):\n    return name")],
        );

        let context = ContextBuilder::new()
            .build(&store, &embedder, &ContextQuery::new("greet name"))
            .unwrap();
        assert!(context.contains("--- Start Chunk: m.py:greet ---"));
        assert!(context.contains("--- End Chunk: m.py:greet ---"));
        assert!(context.contains("def greet(name):"));
    }

    #[test]
    fn test_results_unique_across_queries() {
        let embedder = HashEmbedder::new(DIMS);
        let store = seeded_store(
            &embedder,
            &[("m.py", "greet", "def greet(name):\n    return name")],
        );

        let query = ContextQuery::new("greet name").sub_query("greet name");
        let context = ContextBuilder::new()
            .build(&store, &embedder, &query)
            .unwrap();
        assert_eq!(context.matches("--- Start Chunk:").count(), 1);
    }

    #[test]
    fn test_token_budget_truncates_at_chunk_granularity() {
        let embedder = HashEmbedder::new(DIMS);
        let long_a = "a".repeat(400);
        let long_b = "b".repeat(400);
        let store = seeded_store(
            &embedder,
            &[("a.py", "a", long_a.as_str()), ("b.py", "b", long_b.as_str())],
        );

        // Budget fits roughly one chunk.
        let query = ContextQuery::new("aaaa").token_budget(150);
        let context = ContextBuilder::new()
            .build(&store, &embedder, &query)
            .unwrap();
        assert_eq!(context.matches("--- Start Chunk:").count(), 1);
    }

    #[test]
    fn test_apply_context_appends_section() {
        let prompt = "Modify greet to accept a title.";
        let combined = apply_context(prompt, "--- Start Chunk: m.py:greet ---");
        assert!(combined.starts_with(prompt));
        assert!(combined.contains(CONTEXT_HEADER));
    }

    #[test]
    fn test_apply_empty_context_is_identity() {
        let prompt = "Modify greet.";
        assert_eq!(apply_context(prompt, ""), prompt);
    }

    #[test]
    fn test_filters_passed_through() {
        let embedder = HashEmbedder::new(DIMS);
        let store = seeded_store(
            &embedder,
            &[
                ("a.py", "f", "def f(): pass"),
                ("b.py", "g", "def g(): pass"),
            ],
        );

        let query = ContextQuery::new("def pass").filter(Filter::Path("a.py".to_string()));
        let context = ContextBuilder::new()
            .build(&store, &embedder, &query)
            .unwrap();
        assert!(context.contains("a.py:f"));
        assert!(!context.contains("b.py:g"));
    }
}
