//! Token caching
//!
//! Tokenizing is the hot inner loop of repeated chain builds, so token
//! streams are memoized per node identity. The cache is supplied by the
//! caller and survives across builds; a recalculation after editing a few
//! cells re-tokenizes only those cells.

use crate::node::NodeId;
use crate::tokenizer::Token;
use ahash::AHashMap;
use std::sync::Arc;

/// Storage for memoized token streams, keyed by node identity
///
/// Implementations only store and retrieve; invalidation on formula edits is
/// the owner's responsibility. The builder never caches [`NodeId::Adhoc`]
/// since that identity is shared by every ad hoc build.
pub trait TokenCache {
    /// Look up the token stream for a node
    fn get(&self, id: NodeId) -> Option<Arc<Vec<Token>>>;

    /// Store the token stream for a node
    fn set(&mut self, id: NodeId, tokens: Arc<Vec<Token>>);
}

/// In-memory token cache backed by a hash map
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    entries: AHashMap<u64, Arc<Vec<Token>>>,
}

impl MemoryTokenCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached stream for one node, e.g. after its formula changed
    pub fn invalidate(&mut self, id: NodeId) {
        self.entries.remove(&id.encode());
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached streams
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TokenCache for MemoryTokenCache {
    fn get(&self, id: NodeId) -> Option<Arc<Vec<Token>>> {
        self.entries.get(&id.encode()).cloned()
    }

    fn set(&mut self, id: NodeId, tokens: Arc<Vec<Token>>) {
        self.entries.insert(id.encode(), tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    #[test]
    fn test_store_and_retrieve() {
        let mut cache = MemoryTokenCache::new();
        let id = NodeId::Cell {
            sheet: 0,
            row: 0,
            col: 0,
        };
        assert!(cache.get(id).is_none());

        let tokens = Arc::new(tokenize("=A1+1").unwrap());
        cache.set(id, Arc::clone(&tokens));

        let hit = cache.get(id).unwrap();
        assert!(Arc::ptr_eq(&hit, &tokens));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate() {
        let mut cache = MemoryTokenCache::new();
        let id = NodeId::Cell {
            sheet: 0,
            row: 2,
            col: 3,
        };
        cache.set(id, Arc::new(tokenize("=1").unwrap()));
        cache.invalidate(id);
        assert!(cache.get(id).is_none());
        assert!(cache.is_empty());
    }
}
