//! Expression tree for formulas

pub mod node;
pub mod operator;
pub mod tree;

pub use node::{Node, NodeId, NodeKind};
pub use operator::Operation;
pub use tree::Tree;
