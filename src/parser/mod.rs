//! Formula parser
//!
//! Text is sliced by the [`Tokenizer`], placed by the [`TreeBuilder`] and
//! finally expanded and folded by the [`reducer`].

pub mod builder;
pub mod reducer;
pub mod specification;
pub mod tokenizer;

pub use builder::TreeBuilder;
pub use specification::Specification;
pub use tokenizer::Tokenizer;

use crate::ast::{NodeId, Tree};
use crate::error::FormulaResult;

/// Parse an expression (without specification) into a reduced, compact tree
pub fn parse_expression(text: &str) -> FormulaResult<(Tree, NodeId)> {
    build(text).map_err(|e| e.with_expression(text.trim()))
}

fn build(text: &str) -> FormulaResult<(Tree, NodeId)> {
    let mut tokenizer = Tokenizer::new(text);
    let mut builder = TreeBuilder::new();
    while let Some(kind) = tokenizer.consume_node()? {
        builder.push(kind)?;
    }
    let (mut tree, root) = builder.finish()?;
    let root = reducer::reduce(&mut tree, root)?;
    Ok(tree.compact(root))
}

/// Split formula source into its specification and expression parts
pub fn split_declaration(source: &str) -> (Option<&str>, &str) {
    match source.split_once('=') {
        Some((spec, expr)) => (Some(spec), expr),
        None => (None, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_declaration() {
        assert_eq!(split_declaration("f(x) = 2x"), (Some("f(x) "), " 2x"));
        assert_eq!(split_declaration("2x"), (None, "2x"));
    }

    #[test]
    fn test_error_carries_source() {
        let err = parse_expression("2 + #").unwrap_err();
        assert_eq!(err.expression(), Some("2 + #"));
    }
}
