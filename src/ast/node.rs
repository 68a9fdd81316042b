//! Expression nodes stored in a [`Tree`](super::Tree) arena

use super::operator::Operation;
use std::fmt;

/// Index of a node inside its tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Numeric literal
    Number(f64),
    /// Single letter variable with optional `_subscript`
    Variable(String),
    /// Property, key or function identifier
    Name(String),
    /// Operator with up to two children
    Operator(Operation),
    /// Unexpanded `( ... )` contents
    Group(String),
    /// Unexpanded `| ... |` contents
    Magnitude(String),
}

impl NodeKind {
    /// Operator kind, if this is an operator node
    pub fn operation(&self) -> Option<Operation> {
        match self {
            NodeKind::Operator(op) => Some(*op),
            _ => None,
        }
    }

    /// Identifier text of a variable or name node
    pub fn text(&self) -> Option<&str> {
        match self {
            NodeKind::Variable(text) | NodeKind::Name(text) => Some(text),
            _ => None,
        }
    }

    /// Variables and names
    pub fn is_text(&self) -> bool {
        self.text().is_some()
    }

    /// Raw, still unparsed group or magnitude
    pub fn is_unexpanded(&self) -> bool {
        matches!(self, NodeKind::Group(_) | NodeKind::Magnitude(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Number(n) => write!(f, "Number({n})"),
            NodeKind::Variable(v) => write!(f, "Variable({v})"),
            NodeKind::Name(n) => write!(f, "Name({n})"),
            NodeKind::Operator(op) => write!(f, "{op}"),
            NodeKind::Group(g) => write!(f, "Group({g})"),
            NodeKind::Magnitude(m) => write!(f, "Magnitude({m})"),
        }
    }
}

/// Arena slot with parent and child links
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Payload
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            left: None,
            right: None,
        }
    }

    /// Parent link
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Left operand
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    /// Right operand
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    /// An operator still missing its right operand
    pub fn is_awaiting_operand(&self) -> bool {
        matches!(self.kind, NodeKind::Operator(_)) && self.right.is_none()
    }
}
