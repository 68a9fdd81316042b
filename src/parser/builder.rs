//! Precedence insertion by tree surgery
//!
//! Every node is placed relative to the most recently inserted one. Operators
//! climb past ancestors that bind at least as tightly and usurp their
//! position, which yields left associative precedence climbing without
//! grammar rules.

use crate::ast::{NodeId, NodeKind, Operation, Tree};
use crate::error::{FormulaError, FormulaResult};

/// Incrementally builds a tree from tokenizer output
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: Tree,
    last: Option<NodeId>,
}

impl TreeBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the next node
    pub fn push(&mut self, kind: NodeKind) -> FormulaResult<()> {
        let current = self.tree.add(kind);
        self.last = Some(match self.last {
            None => self.start(current),
            Some(last) => self.extend(last, current)?,
        });
        Ok(())
    }

    /// Finish building and return the tree with its root
    pub fn finish(self) -> FormulaResult<(Tree, NodeId)> {
        let last = self
            .last
            .ok_or_else(|| FormulaError::parse("Empty formula"))?;
        let root = self.tree.top(last);
        validate(&self.tree, root)?;
        Ok(self.tree.compact(root))
    }

    fn start(&mut self, current: NodeId) -> NodeId {
        if self.tree.operation(current) == Some(Operation::Subtract) {
            self.tree
                .set_kind(current, NodeKind::Operator(Operation::Negate));
        }
        current
    }

    fn extend(&mut self, last: NodeId, current: NodeId) -> FormulaResult<NodeId> {
        match self.tree.kind(current).clone() {
            NodeKind::Operator(op) => self.extend_operator(last, current, op),
            NodeKind::Group(_) | NodeKind::Magnitude(_) if self.tree.kind(last).is_text() => {
                let transform = self.tree.add(NodeKind::Operator(Operation::Transform));
                let transform = self.extend(last, transform)?;
                self.extend(transform, current)
            }
            NodeKind::Variable(text) | NodeKind::Name(text) => {
                if let NodeKind::Name(prior) = self.tree.kind(last) {
                    if self.is_under_access(last) {
                        let merged = format!("{prior}{text}");
                        self.tree.set_kind(last, NodeKind::Name(merged));
                        return Ok(last);
                    }
                }
                if self.is_awaiting_access_key(last) {
                    self.tree.set_kind(current, NodeKind::Name(text));
                }
                self.extend_atom(last, current)
            }
            _ => self.extend_atom(last, current),
        }
    }

    fn extend_operator(
        &mut self,
        last: NodeId,
        current: NodeId,
        op: Operation,
    ) -> FormulaResult<NodeId> {
        if self.tree.node(last).is_awaiting_operand() {
            if matches!(op, Operation::Subtract | Operation::Negate) {
                self.tree
                    .set_kind(current, NodeKind::Operator(Operation::Negate));
                self.attach_operand(last, current)?;
                return Ok(current);
            }
            return Err(FormulaError::parse(format!(
                "'{}' is missing its left operand",
                op.symbol()
            )));
        }

        let mut target = last;
        while let Some(parent) = self.tree.parent(target) {
            match self.tree.operation(parent) {
                Some(ancestor) if ancestor.precedence() >= op.precedence() => target = parent,
                _ => break,
            }
        }
        self.tree.usurp(current, target);
        Ok(current)
    }

    fn extend_atom(&mut self, last: NodeId, current: NodeId) -> FormulaResult<NodeId> {
        if self.tree.node(last).is_awaiting_operand() {
            self.attach_operand(last, current)?;
            return Ok(current);
        }
        let multiply = self.tree.add(NodeKind::Operator(Operation::Multiply));
        let multiply = self.extend(last, multiply)?;
        self.extend(multiply, current)
    }

    /// Give an operator its right operand. A leftless `-` becomes unary.
    fn attach_operand(&mut self, op_node: NodeId, operand: NodeId) -> FormulaResult<()> {
        if self.tree.left(op_node).is_none() {
            match self.tree.operation(op_node) {
                Some(Operation::Negate) => {}
                Some(Operation::Subtract) => {
                    self.tree
                        .set_kind(op_node, NodeKind::Operator(Operation::Negate));
                }
                Some(op) => {
                    return Err(FormulaError::parse(format!(
                        "'{}' is not a unary operation",
                        op.symbol()
                    )));
                }
                None => {}
            }
        }
        self.tree.append(op_node, operand)
    }

    fn is_under_access(&self, id: NodeId) -> bool {
        self.tree
            .parent(id)
            .and_then(|p| self.tree.operation(p))
            .is_some_and(Operation::is_access)
    }

    fn is_awaiting_access_key(&self, id: NodeId) -> bool {
        self.tree.node(id).is_awaiting_operand()
            && self.tree.operation(id).is_some_and(Operation::is_access)
    }
}

/// Reject operators left without operands
fn validate(tree: &Tree, root: NodeId) -> FormulaResult<()> {
    for id in tree.post_order(root) {
        let Some(op) = tree.operation(id) else {
            continue;
        };
        if tree.right(id).is_none() {
            return Err(FormulaError::parse(format!(
                "'{}' is missing its right operand",
                if op == Operation::Transform {
                    "function application"
                } else {
                    op.symbol()
                }
            )));
        }
        if op != Operation::Negate && tree.left(id).is_none() {
            return Err(FormulaError::parse(format!(
                "'{}' is not a unary operation",
                op.symbol()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::Tokenizer;

    fn build(input: &str) -> FormulaResult<(Tree, NodeId)> {
        let mut tokenizer = Tokenizer::new(input);
        let mut builder = TreeBuilder::new();
        while let Some(kind) = tokenizer.consume_node()? {
            builder.push(kind)?;
        }
        builder.finish()
    }

    #[test]
    fn test_precedence_climbing() {
        let (tree, root) = build("1 + 2 * 3 ^ 4").unwrap();
        assert_eq!(tree.operation(root), Some(Operation::Add));
        assert_eq!(tree.text(root), "1 + 2 * 3^4");
        assert!(tree.is_consistent(root));
    }

    #[test]
    fn test_left_associativity() {
        let (tree, root) = build("8 - 3 - 2").unwrap();
        let left = tree.left(root).unwrap();
        assert_eq!(tree.operation(left), Some(Operation::Subtract));
        assert_eq!(tree.text(root), "8 - 3 - 2");
    }

    #[test]
    fn test_implicit_multiply_and_transform() {
        let (tree, root) = build("2sin(x)").unwrap();
        assert_eq!(tree.operation(root), Some(Operation::Multiply));
        let right = tree.right(root).unwrap();
        assert_eq!(tree.operation(right), Some(Operation::Transform));
        assert_eq!(tree.kind(tree.left(right).unwrap()), &NodeKind::Name("sin".into()));
    }

    #[test]
    fn test_unary_minus() {
        let (tree, root) = build("-2^2").unwrap();
        assert_eq!(tree.operation(root), Some(Operation::Negate));
        let (tree, root) = build("2^-3").unwrap();
        assert_eq!(tree.operation(root), Some(Operation::Power));
        let right = tree.right(root).unwrap();
        assert_eq!(tree.operation(right), Some(Operation::Negate));
    }

    #[test]
    fn test_access_names_merge() {
        let (tree, root) = build("a.Length").unwrap();
        assert_eq!(tree.operation(root), Some(Operation::Property));
        assert_eq!(
            tree.kind(tree.right(root).unwrap()),
            &NodeKind::Name("Length".into())
        );

        let (tree, root) = build("a:b:c").unwrap();
        assert_eq!(tree.text(root), "a:b:c");
        assert_eq!(
            tree.kind(tree.right(root).unwrap()),
            &NodeKind::Name("c".into())
        );
    }

    #[test]
    fn test_missing_operands() {
        assert!(build("*3").is_err());
        assert!(build("2 +").is_err());
        assert!(build("2 * / 3").is_err());
        assert!(build("").is_err());
    }
}
