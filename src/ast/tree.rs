//! Arena backed binary expression tree and its surgery operations

use super::node::{Node, NodeId, NodeKind};
use super::operator::Operation;
use crate::error::{FormulaError, FormulaResult};
use std::fmt::Write as _;

/// Binary expression tree whose nodes are addressed by [`NodeId`].
///
/// Surgery operations only rewrite links; nodes cut out of the tree stay in
/// the arena until [`Tree::compact`] copies the reachable part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of arena slots, including detached nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing was ever added
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node::new(kind));
        NodeId(self.nodes.len() - 1)
    }

    /// Node at `id`
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Payload at `id`
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Replace the payload at `id`, keeping its links
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0].kind = kind;
    }

    /// Operator kind at `id`
    pub fn operation(&self, id: NodeId) -> Option<Operation> {
        self.kind(id).operation()
    }

    /// Parent of `id`
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Left child of `id`
    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].left
    }

    /// Right child of `id`
    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].right
    }

    /// Follow parent links up to the root
    pub fn top(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.parent(id) {
            id = parent;
        }
        id
    }

    /// Attach `child` as the left operand of `parent`
    pub fn set_left(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].left = Some(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Attach `child` as the right operand of `parent`, failing if that slot is taken.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> FormulaResult<()> {
        if self.nodes[parent.0].right.is_some() {
            return Err(FormulaError::parse(format!(
                "{} already has a right operand",
                self.kind(parent)
            )));
        }
        self.nodes[parent.0].right = Some(child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// `node` takes over the position of `target`, which becomes its left operand.
    pub fn usurp(&mut self, node: NodeId, target: NodeId) {
        let parent = self.parent(target);
        self.relink_parent(parent, target, node);
        self.nodes[node.0].parent = parent;
        self.set_left(node, target);
        log::trace!("{} usurped {}", self.kind(node), self.kind(target));
    }

    /// `node` takes over the position of `target`, which is detached.
    pub fn replace(&mut self, node: NodeId, target: NodeId) {
        if node == target {
            return;
        }
        let parent = self.parent(target);
        self.relink_parent(parent, target, node);
        self.nodes[node.0].parent = parent;
        self.nodes[target.0].parent = None;
    }

    /// Turn `id` into a leaf holding `kind`; its children are detached.
    pub fn collapse(&mut self, id: NodeId, kind: NodeKind) {
        let node = &mut self.nodes[id.0];
        let children = [node.left.take(), node.right.take()];
        node.kind = kind;
        for child in children.into_iter().flatten() {
            self.nodes[child.0].parent = None;
        }
    }

    fn relink_parent(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        if let Some(p) = parent {
            let slot = &mut self.nodes[p.0];
            if slot.left == Some(old) {
                slot.left = Some(new);
            } else if slot.right == Some(old) {
                slot.right = Some(new);
            }
        }
    }

    /// Node ids below and including `root`, children first
    pub fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(right) = self.right(id) {
                stack.push((right, false));
            }
            if let Some(left) = self.left(id) {
                stack.push((left, false));
            }
        }
        out
    }

    /// Deep copy the subtree of `other` rooted at `root` into this arena.
    pub fn graft(&mut self, other: &Tree, root: NodeId) -> NodeId {
        let id = self.add(other.kind(root).clone());
        if let Some(left) = other.left(root) {
            let copy = self.graft(other, left);
            self.set_left(id, copy);
        }
        if let Some(right) = other.right(root) {
            let copy = self.graft(other, right);
            self.nodes[id.0].right = Some(copy);
            self.nodes[copy.0].parent = Some(id);
        }
        id
    }

    /// Copy the part reachable from `root` into a fresh arena.
    pub fn compact(&self, root: NodeId) -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.graft(self, root);
        (tree, root)
    }

    /// Check that every child points back at its parent
    pub fn is_consistent(&self, root: NodeId) -> bool {
        self.post_order(root).into_iter().all(|id| {
            [self.left(id), self.right(id)]
                .into_iter()
                .flatten()
                .all(|child| self.parent(child) == Some(id))
        })
    }

    /// Regenerate formula text for the subtree at `id`
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_text(id, &mut out);
        out
    }

    fn write_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Number(n) => {
                let _ = write!(out, "{n}");
            }
            NodeKind::Variable(text) | NodeKind::Name(text) => out.push_str(text),
            NodeKind::Group(raw) => {
                let _ = write!(out, "({raw})");
            }
            NodeKind::Magnitude(raw) => {
                let _ = write!(out, "|{raw}|");
            }
            NodeKind::Operator(op) => self.write_operator(id, *op, out),
        }
    }

    fn write_operator(&self, id: NodeId, op: Operation, out: &mut String) {
        match op {
            Operation::Transform => {
                let name = self.left(id).map(|l| self.text(l)).unwrap_or_default();
                let arg = self.right(id).map(|r| self.text(r)).unwrap_or_default();
                if name == "abs" {
                    let _ = write!(out, "|{arg}|");
                } else {
                    let _ = write!(out, "{name}({arg})");
                }
            }
            Operation::Negate => {
                out.push('-');
                if let Some(right) = self.right(id) {
                    self.write_child(op, right, true, out);
                }
            }
            _ => {
                if let Some(left) = self.left(id) {
                    self.write_child(op, left, false, out);
                }
                if op.is_arithmetic() {
                    let _ = write!(out, " {} ", op.symbol());
                } else {
                    out.push_str(op.symbol());
                }
                if let Some(right) = self.right(id) {
                    self.write_child(op, right, true, out);
                }
            }
        }
    }

    fn write_child(&self, parent: Operation, child: NodeId, is_right: bool, out: &mut String) {
        let grouped = match self.operation(child) {
            None => match self.kind(child) {
                NodeKind::Number(n) if n.is_sign_negative() => {
                    parent.precedence() > Operation::Negate.precedence()
                }
                // a bare key would read back as a literal name
                NodeKind::Variable(_) => is_right && parent == Operation::Index,
                _ => false,
            },
            Some(Operation::Transform) => false,
            Some(Operation::Negate) => parent.precedence() > Operation::Negate.precedence(),
            Some(op) => {
                op.precedence() < parent.precedence()
                    || (is_right && op.precedence() == parent.precedence())
            }
        };
        if grouped {
            out.push('(');
            self.write_text(child, out);
            out.push(')');
        } else {
            self.write_text(child, out);
        }
    }

    /// Indented multi-line rendering of the subtree at `id`
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_dump(id, 0, "", &mut out);
        out
    }

    fn write_dump(&self, id: NodeId, depth: usize, label: &str, out: &mut String) {
        let _ = writeln!(out, "{}{}{}", "  ".repeat(depth), label, self.kind(id));
        if let Some(left) = self.left(id) {
            self.write_dump(left, depth + 1, "L: ", out);
        }
        if let Some(right) = self.right(id) {
            self.write_dump(right, depth + 1, "R: ", out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(tree: &mut Tree, op: Operation, l: NodeKind, r: NodeKind) -> NodeId {
        let root = tree.add(NodeKind::Operator(op));
        let l = tree.add(l);
        let r = tree.add(r);
        tree.set_left(root, l);
        tree.append(root, r).unwrap();
        root
    }

    #[test]
    fn test_usurp_keeps_links() {
        let mut tree = Tree::new();
        let add = binary(
            &mut tree,
            Operation::Add,
            NodeKind::Number(1.0),
            NodeKind::Number(2.0),
        );
        let two = tree.right(add).unwrap();
        let mul = tree.add(NodeKind::Operator(Operation::Multiply));
        tree.usurp(mul, two);

        assert_eq!(tree.right(add), Some(mul));
        assert_eq!(tree.left(mul), Some(two));
        assert_eq!(tree.parent(two), Some(mul));
        assert_eq!(tree.top(two), add);
        assert!(tree.is_consistent(add));
    }

    #[test]
    fn test_append_rejects_occupied_slot() {
        let mut tree = Tree::new();
        let add = binary(
            &mut tree,
            Operation::Add,
            NodeKind::Number(1.0),
            NodeKind::Number(2.0),
        );
        let extra = tree.add(NodeKind::Number(3.0));
        assert!(tree.append(add, extra).is_err());
    }

    #[test]
    fn test_replace_and_compact() {
        let mut tree = Tree::new();
        let add = binary(
            &mut tree,
            Operation::Add,
            NodeKind::Variable("x".into()),
            NodeKind::Number(2.0),
        );
        let x = tree.left(add).unwrap();
        let y = tree.add(NodeKind::Variable("y".into()));
        tree.replace(y, x);
        assert_eq!(tree.parent(x), None);

        let (compact, root) = tree.compact(add);
        assert_eq!(compact.len(), 3);
        assert_eq!(compact.text(root), "y + 2");
    }

    #[test]
    fn test_text_grouping() {
        let mut tree = Tree::new();
        let sub = binary(
            &mut tree,
            Operation::Subtract,
            NodeKind::Number(2.0),
            NodeKind::Number(3.0),
        );
        let mul = tree.add(NodeKind::Operator(Operation::Multiply));
        let x = tree.add(NodeKind::Variable("x".into()));
        tree.set_left(mul, x);
        tree.append(mul, sub).unwrap();
        assert_eq!(tree.text(mul), "x * (2 - 3)");
        assert_eq!(tree.post_order(mul).last(), Some(&mul));
    }

    #[test]
    fn test_text_negative_base_and_index_key() {
        let mut tree = Tree::new();
        let pow = binary(
            &mut tree,
            Operation::Power,
            NodeKind::Number(-2.0),
            NodeKind::Variable("x".into()),
        );
        assert_eq!(tree.text(pow), "(-2)^x");

        let mul = binary(
            &mut tree,
            Operation::Multiply,
            NodeKind::Number(-2.0),
            NodeKind::Variable("x".into()),
        );
        assert_eq!(tree.text(mul), "-2 * x");

        let index = binary(
            &mut tree,
            Operation::Index,
            NodeKind::Variable("a".into()),
            NodeKind::Variable("i".into()),
        );
        assert_eq!(tree.text(index), "a:(i)");

        let keyed = binary(
            &mut tree,
            Operation::Index,
            NodeKind::Variable("a".into()),
            NodeKind::Name("b".into()),
        );
        assert_eq!(tree.text(keyed), "a:b");
    }

    #[test]
    fn test_dump() {
        let mut tree = Tree::new();
        let add = binary(
            &mut tree,
            Operation::Add,
            NodeKind::Number(1.0),
            NodeKind::Variable("x".into()),
        );
        assert_eq!(tree.dump(add), "Add\n  L: Number(1)\n  R: Variable(x)\n");
    }
}
