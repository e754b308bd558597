//! Cross-file semantic graph.
//!
//! Nodes are symbols (functions, classes, modules); edges record calls,
//! imports, and inheritance. Built once per request from the stored code
//! chunks, the graph answers the two analyzer queries: who calls a symbol,
//! and how far a change to a set of symbols ripples.

use crate::core::{Chunk, ChunkKind, RippleEntry};
use crate::error::Result;
use crate::storage::VectorStore;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

/// Incoming-edge count at or above which a symbol is high risk.
pub const HIGH_RISK_EDGES: usize = 11;

/// Incoming-edge count at or above which a symbol is medium risk.
pub const MEDIUM_RISK_EDGES: usize = 3;

/// Relationship kinds between symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Caller references callee.
    Calls,
    /// Module imports module.
    Imports,
    /// Subclass inherits from base.
    Inherits,
}

#[allow(clippy::unwrap_used)]
fn import_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+)|import\s+.*?from\s+['"]([^'"]+)['"])"#,
        )
        .unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn inherit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^class\s+\w+\s*(?:\(([\w.]+)|extends\s+([\w.]+))").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap()
    })
}

/// Cross-file caller/callee/import graph over stored chunks.
///
/// # Examples
///
/// ```
/// use codefactory_rs::core::{Chunk, ChunkKind};
/// use codefactory_rs::graph::SemanticGraph;
///
/// let chunks = vec![
///     Chunk::new("m.py", "helper", ChunkKind::Function, "def helper(): pass", 1, 1, "python"),
///     Chunk::new("m.py", "main", ChunkKind::Function, "def main():\n    helper()", 3, 4, "python"),
/// ];
/// let graph = SemanticGraph::build(&chunks);
/// assert_eq!(graph.callers("helper"), vec!["main".to_string()]);
/// ```
pub struct SemanticGraph {
    graph: DiGraph<String, EdgeKind>,
    nodes: HashMap<String, NodeIndex>,
}

impl SemanticGraph {
    /// Builds the graph from a set of chunks.
    #[must_use]
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        let mut intern = |graph: &mut DiGraph<String, EdgeKind>, name: &str| -> NodeIndex {
            *nodes
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };

        // Pass 1: every named symbol and every module becomes a node.
        let mut symbols: HashSet<String> = HashSet::new();
        for chunk in chunks {
            if matches!(chunk.chunk_type, ChunkKind::Function | ChunkKind::Class)
                && !chunk.chunk_name.is_empty()
            {
                symbols.insert(chunk.chunk_name.clone());
                intern(&mut graph, &chunk.chunk_name);
            }
            intern(&mut graph, &chunk.path);
        }

        // Pass 2: edges.
        for chunk in chunks {
            let module = intern(&mut graph, &chunk.path);

            for caps in import_pattern().captures_iter(&chunk.content) {
                let target = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str());
                if let Some(target) = target {
                    let imported = intern(&mut graph, target);
                    if module != imported {
                        graph.update_edge(module, imported, EdgeKind::Imports);
                    }
                }
            }

            if chunk.chunk_type == ChunkKind::Class {
                for caps in inherit_pattern().captures_iter(&chunk.content) {
                    let base = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                    if let Some(base) = base.filter(|b| *b != "object") {
                        let child = intern(&mut graph, &chunk.chunk_name);
                        let parent = intern(&mut graph, base);
                        if child != parent {
                            graph.update_edge(child, parent, EdgeKind::Inherits);
                        }
                    }
                }
            }

            if chunk.chunk_name.is_empty() {
                continue;
            }
            let caller = intern(&mut graph, &chunk.chunk_name);

            // A call edge for every known symbol referenced in the body.
            let mut referenced: HashSet<&str> = HashSet::new();
            for ident in identifier_pattern().find_iter(&chunk.content) {
                let name = ident.as_str();
                if name != chunk.chunk_name && symbols.contains(name) {
                    referenced.insert(name);
                }
            }
            for name in referenced {
                let callee = intern(&mut graph, name);
                graph.update_edge(caller, callee, EdgeKind::Calls);
            }
        }

        Self { graph, nodes }
    }

    /// Builds the graph from every chunk in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn from_store(store: &dyn VectorStore) -> Result<Self> {
        Ok(Self::build(&store.all_chunks()?))
    }

    /// Number of symbols in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the symbols that call `symbol`, sorted by name.
    #[must_use]
    pub fn callers(&self, symbol: &str) -> Vec<String> {
        let Some(&node) = self.nodes.get(symbol) else {
            return Vec::new();
        };
        let mut callers: Vec<String> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .filter(|edge| *edge.weight() == EdgeKind::Calls)
            .map(|edge| self.graph[edge.source()].clone())
            .collect();
        callers.sort();
        callers.dedup();
        callers
    }

    /// Incoming dependency count for a symbol (all edge kinds).
    #[must_use]
    pub fn dependents_of(&self, symbol: &str) -> usize {
        self.nodes.get(symbol).map_or(0, |&node| {
            self.graph
                .edges_directed(node, Direction::Incoming)
                .count()
        })
    }

    /// Risk classification for one symbol from its incoming edge count.
    fn risk_level(incoming: usize) -> &'static str {
        if incoming >= HIGH_RISK_EDGES {
            "high"
        } else if incoming >= MEDIUM_RISK_EDGES {
            "medium"
        } else {
            "low"
        }
    }

    /// Walks dependents of the given symbols up to a depth bound and
    /// classifies each reached symbol by its incoming edge count.
    #[must_use]
    pub fn ripple_risk(&self, symbols: &[String], depth: usize) -> Vec<RippleEntry> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();

        for symbol in symbols {
            if let Some(&node) = self.nodes.get(symbol) {
                visited.insert(node);
                queue.push_back((node, 0));
            }
        }

        let mut entries = Vec::new();
        while let Some((node, dist)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }
            for edge in self.graph.edges_directed(node, Direction::Incoming) {
                let dependent = edge.source();
                if !visited.insert(dependent) {
                    continue;
                }
                let name = self.graph[dependent].clone();
                let incoming = self
                    .graph
                    .edges_directed(dependent, Direction::Incoming)
                    .count();
                entries.push(RippleEntry {
                    symbol: name,
                    risk_level: Self::risk_level(incoming).to_string(),
                    reason: format!(
                        "{incoming} dependent(s), {} step(s) from {}",
                        dist + 1,
                        self.graph[node]
                    ),
                });
                queue.push_back((dependent, dist + 1));
            }
        }

        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        entries
    }
}
