//! Dependency chain container
//!
//! An arena of formula-cell nodes plus the finished calculation order.
//! Nodes are addressed by arena index during traversal; the packed-identity
//! index gives O(1) membership tests so a cell referenced from many ranges
//! is scheduled exactly once.

use crate::node::{FormulaCell, NodeId};
use ahash::AHashMap;

/// The result of a chain build: every reachable formula node in
/// dependencies-first order
#[derive(Debug, Default)]
pub struct DependencyChain {
    nodes: Vec<FormulaCell>,
    index: AHashMap<u64, usize>,
    order: Vec<usize>,
}

impl DependencyChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a node with this identity exists in the arena
    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id.encode())
    }

    /// Arena position of a node, if present
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id.encode()).copied()
    }

    /// Add a node to the arena, returning its position.
    ///
    /// The node is not yet part of the calculation order; that happens when
    /// its subtree finishes via [`push_order`](Self::push_order).
    pub fn add(&mut self, cell: FormulaCell) -> usize {
        let ix = self.nodes.len();
        self.index.insert(cell.id.encode(), ix);
        self.nodes.push(cell);
        ix
    }

    /// Append a finished node to the calculation order
    pub fn push_order(&mut self, ix: usize) {
        self.order.push(ix);
    }

    /// Borrow a node by arena position
    pub fn node(&self, ix: usize) -> &FormulaCell {
        &self.nodes[ix]
    }

    /// Mutably borrow a node by arena position
    pub fn node_mut(&mut self, ix: usize) -> &mut FormulaCell {
        &mut self.nodes[ix]
    }

    /// Number of nodes in the chain
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The calculation order: every node's identity, dependencies first
    pub fn calc_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().map(|&ix| self.nodes[ix].id)
    }

    /// The nodes in calculation order
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &FormulaCell> {
        self.order.iter().map(|&ix| &self.nodes[ix])
    }
}
