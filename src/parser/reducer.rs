//! Group expansion and constant folding
//!
//! Runs innermost first. Groups and magnitudes were captured as raw text by
//! the tokenizer and are reparsed here; operators over two literals collapse
//! into a single literal.

use super::parse_expression;
use crate::ast::{NodeId, NodeKind, Operation, Tree};
use crate::error::FormulaResult;

/// Transform name a magnitude desugars to
pub const MAGNITUDE_TRANSFORM: &str = "abs";

/// Reduce the subtree at `id`, returning the node now occupying its position.
pub fn reduce(tree: &mut Tree, id: NodeId) -> FormulaResult<NodeId> {
    if let Some(left) = tree.left(id) {
        reduce(tree, left)?;
    }
    if let Some(right) = tree.right(id) {
        reduce(tree, right)?;
    }

    match tree.kind(id).clone() {
        NodeKind::Group(text) => {
            let (sub, root) = parse_expression(&text)?;
            let grafted = tree.graft(&sub, root);
            tree.replace(grafted, id);
            Ok(grafted)
        }
        NodeKind::Magnitude(text) => {
            let (sub, root) = parse_expression(&text)?;
            let grafted = tree.graft(&sub, root);
            let transform = tree.add(NodeKind::Operator(Operation::Transform));
            let name = tree.add(NodeKind::Name(MAGNITUDE_TRANSFORM.to_string()));
            tree.replace(transform, id);
            tree.set_left(transform, name);
            tree.append(transform, grafted)?;
            Ok(transform)
        }
        NodeKind::Operator(op) => {
            if let Some(value) = fold(tree, id, op) {
                log::trace!("folded {} into {value}", tree.text(id));
                tree.collapse(id, NodeKind::Number(value));
            }
            Ok(id)
        }
        _ => Ok(id),
    }
}

fn literal(tree: &Tree, id: Option<NodeId>) -> Option<f64> {
    match tree.kind(id?) {
        NodeKind::Number(n) => Some(*n),
        _ => None,
    }
}

fn fold(tree: &Tree, id: NodeId, op: Operation) -> Option<f64> {
    match op {
        Operation::Negate => op.apply_numeric(0.0, literal(tree, tree.right(id))?),
        op if op.is_arithmetic() || op == Operation::Power => op.apply_numeric(
            literal(tree, tree.left(id))?,
            literal(tree, tree.right(id))?,
        ),
        _ => None,
    }
}
