pub mod document;
pub mod lint;
pub mod naming;
pub mod node;
pub mod parser;
pub mod sample;
pub mod stats;

use crate::node::Node;

/// A parsed manuscript document.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Top-level block nodes, in document order.
    pub nodes: Vec<Node>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
