//! Lexical slicing of formula text into nodes
//!
//! The tokenizer works directly on the source slice. Groups and magnitudes
//! are captured as raw text and expanded later by the reducer.

use crate::ast::{NodeKind, Operation};
use crate::error::{FormulaError, FormulaResult};

/// Characters that terminate a name lookahead
const OPERATOR_CHARS: &[char] = &['+', '-', '*', '/', '%', '^', ':', '.', '(', ')', '|'];

/// Cursor over formula or specification text
#[derive(Debug, Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    position: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer at the start of `input`
    pub fn new(input: &'input str) -> Self {
        Self { input, position: 0 }
    }

    /// Byte offset of the cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Unconsumed text
    pub fn remaining(&self) -> &'input str {
        &self.input[self.position..]
    }

    /// True once every character was consumed
    pub fn is_finished(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Next character without consuming it
    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Consume one character
    pub fn consume_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace at the cursor
    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.consume_char();
        }
    }

    /// First operator character ahead of the cursor, if any
    pub fn next_operator(&self) -> Option<char> {
        self.remaining().chars().find(|c| OPERATOR_CHARS.contains(c))
    }

    /// Letters, digits and `_`, skipping embedded whitespace
    pub fn consume_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
            } else if !c.is_whitespace() {
                break;
            }
            self.consume_char();
        }
        name
    }

    /// One letter, optionally followed by `_` and a subscript name
    pub fn consume_variable(&mut self) -> FormulaResult<String> {
        let mut name = String::new();
        match self.peek() {
            Some(c) if c.is_alphabetic() => {
                name.push(c);
                self.consume_char();
            }
            other => {
                return Err(FormulaError::parse(format!(
                    "Expected a variable, found {}",
                    describe(other)
                )));
            }
        }
        if self.peek() == Some('_') {
            self.consume_char();
            name.push('_');
            name.push_str(&self.consume_name());
        }
        Ok(name)
    }

    /// Digits and radix points, skipping embedded whitespace
    pub fn consume_numeric_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
            } else if !c.is_whitespace() {
                break;
            }
            self.consume_char();
        }
        text
    }

    /// Numeric literal
    pub fn consume_number(&mut self) -> FormulaResult<f64> {
        let text = self.consume_numeric_text();
        text.parse::<f64>()
            .map_err(|_| FormulaError::parse(format!("Unable to convert '{text}' to a number")))
    }

    /// Type name with balanced `<...>` generic arguments. A `,` outside
    /// generics or any other symbol ends the name.
    pub fn consume_typename(&mut self) -> String {
        let mut name = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '<' => depth += 1,
                '>' if depth > 0 => depth -= 1,
                ',' if depth > 0 => {}
                c if c.is_whitespace() => {
                    self.consume_char();
                    continue;
                }
                c if c.is_alphanumeric() || c == '_' || c == '.' => {}
                _ => break,
            }
            name.push(c);
            self.consume_char();
        }
        name
    }

    /// Text up to the `)` matching an already consumed `(`
    pub fn consume_group(&mut self) -> FormulaResult<String> {
        let start = self.position;
        let mut depth = 1usize;
        while let Some(c) = self.consume_char() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.input[start..self.position - 1].to_string());
                    }
                }
                _ => {}
            }
        }
        Err(FormulaError::parse("Unterminated group, expected ')'"))
    }

    /// Text up to the next `|` outside parentheses, after an already consumed `|`
    pub fn consume_magnitude(&mut self) -> FormulaResult<String> {
        let start = self.position;
        let mut depth = 0usize;
        while let Some(c) = self.consume_char() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '|' if depth == 0 => {
                    return Ok(self.input[start..self.position - 1].to_string());
                }
                _ => {}
            }
        }
        Err(FormulaError::parse("Unterminated magnitude, expected '|'"))
    }

    /// Map the next lexeme to a node. Returns `None` at the end of input.
    pub fn consume_node(&mut self) -> FormulaResult<Option<NodeKind>> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        if let Some(op) = Operation::from_char(c) {
            self.consume_char();
            return Ok(Some(NodeKind::Operator(op)));
        }

        let kind = match c {
            '(' => {
                self.consume_char();
                NodeKind::Group(self.consume_group()?)
            }
            '|' => {
                self.consume_char();
                NodeKind::Magnitude(self.consume_magnitude()?)
            }
            c if c.is_alphabetic() => match self.next_operator() {
                Some('(') | Some('|') => NodeKind::Name(self.consume_name()),
                _ => NodeKind::Variable(self.consume_variable()?),
            },
            c if c.is_ascii_digit() => NodeKind::Number(self.consume_number()?),
            other => {
                return Err(FormulaError::parse(format!(
                    "Unexpected symbol '{other}' at offset {}",
                    self.position
                )));
            }
        };
        Ok(Some(kind))
    }
}

fn describe(c: Option<char>) -> String {
    match c {
        Some(c) => format!("'{c}'"),
        None => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(input: &str) -> Vec<NodeKind> {
        let mut tokenizer = Tokenizer::new(input);
        let mut out = Vec::new();
        while let Some(node) = tokenizer.consume_node().unwrap() {
            out.push(node);
        }
        out
    }

    #[test]
    fn test_operators_and_numbers() {
        assert_eq!(
            nodes("3 * 2.5^2"),
            vec![
                NodeKind::Number(3.0),
                NodeKind::Operator(Operation::Multiply),
                NodeKind::Number(2.5),
                NodeKind::Operator(Operation::Power),
                NodeKind::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_names_and_variables() {
        assert_eq!(
            nodes("sin(x) + x_1"),
            vec![
                NodeKind::Name("sin".into()),
                NodeKind::Group("x".into()),
                NodeKind::Operator(Operation::Add),
                NodeKind::Variable("x_1".into()),
            ]
        );
        assert_eq!(
            nodes("ab"),
            vec![NodeKind::Variable("a".into()), NodeKind::Variable("b".into())]
        );
    }

    #[test]
    fn test_nested_groups_and_magnitudes() {
        assert_eq!(
            nodes("((1)(2))|(|3|)(|c|)|"),
            vec![
                NodeKind::Group("(1)(2)".into()),
                NodeKind::Magnitude("(|3|)(|c|)".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated() {
        assert!(Tokenizer::new("(1 + 2").consume_node().is_err());
        assert!(Tokenizer::new("|1 + 2").consume_node().is_err());
    }

    #[test]
    fn test_unexpected_symbol() {
        let err = Tokenizer::new("#").consume_node().unwrap_err();
        assert!(err.message().contains("Unexpected symbol '#'"));
        assert!(Tokenizer::new("1.2.3").consume_node().is_err());
    }

    #[test]
    fn test_typename() {
        let mut tokenizer = Tokenizer::new("Pair<number, number>, y");
        assert_eq!(tokenizer.consume_typename(), "Pair<number,number>");
        assert_eq!(tokenizer.peek(), Some(','));

        let mut tokenizer = Tokenizer::new("number)");
        assert_eq!(tokenizer.consume_typename(), "number");
    }

    #[test]
    fn test_trailing_whitespace() {
        assert_eq!(nodes("2   "), vec![NodeKind::Number(2.0)]);
    }
}
