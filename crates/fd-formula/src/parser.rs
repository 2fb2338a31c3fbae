//! Formula text parser.
//!
//! Grammar:
//!
//! ```text
//! formula := literal | field | call
//! call    := name '{' formula (',' formula)* '}'
//! ```
//!
//! The operator's arity class fixes how many arguments a call takes; the last
//! argument of the *WithParam classes must be a numeric literal. Literals are
//! decoded by trial conversion: integer first, then float, otherwise the token
//! is a field name.

use crate::{
    error::ParseError,
    node::{Arity, Children, Literal, Node},
    registry::OperatorRegistry,
};

/// Parses formula text against an operator registry.
#[derive(Debug, Clone, Copy)]
pub struct FormulaParser<'a> {
    registry: &'a OperatorRegistry,
}

impl Default for FormulaParser<'static> {
    fn default() -> Self {
        Self::new(OperatorRegistry::standard())
    }
}

impl<'a> FormulaParser<'a> {
    /// Create a parser resolving operator names in `registry`.
    pub const fn new(registry: &'a OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Parse a formula.
    pub fn parse(&self, text: &str) -> Result<Node, ParseError> {
        let text = text.trim();
        match text.find('{') {
            None => parse_leaf(text),
            Some(open) => self.parse_call(text, open),
        }
    }

    fn parse_call(&self, text: &str, open: usize) -> Result<Node, ParseError> {
        let close = matching_brace(text, open)
            .ok_or_else(|| ParseError::UnbalancedBraces(text.to_string()))?;
        if close != text.len() - 1 {
            return Err(ParseError::UnbalancedBraces(text.to_string()));
        }

        let name = text[..open].trim();
        let arity = self
            .registry
            .arity_of(name)
            .ok_or_else(|| ParseError::UnknownOperator(name.to_string()))?;

        let args = split_arguments(&text[open + 1..close])
            .ok_or_else(|| ParseError::UnbalancedBraces(text.to_string()))?;
        if args.len() != arity.arg_count() {
            return Err(ParseError::MalformedArgumentCount {
                operator: name.to_string(),
                arity,
                expected: arity.arg_count(),
                found: args.len(),
            });
        }

        let sub = |i: usize| self.parse(args[i]).map(Box::new);
        let num = |i: usize| parse_number(args[i].trim());
        let children = match arity {
            Arity::Unary => Children::Unary { left: sub(0)? },
            Arity::UnaryWithParam => Children::UnaryWithParam {
                left: sub(0)?,
                num: num(1)?,
            },
            Arity::Binary => Children::Binary {
                left: sub(0)?,
                right: sub(1)?,
            },
            Arity::BinaryWithParam => Children::BinaryWithParam {
                left: sub(0)?,
                right: sub(1)?,
                num: num(2)?,
            },
            Arity::Ternary => Children::Ternary {
                left: sub(0)?,
                middle: sub(1)?,
                right: sub(2)?,
            },
        };
        Ok(Node::call(name, children))
    }
}

/// Parse a formula with the builtin operators.
pub fn parse(text: &str) -> Result<Node, ParseError> {
    FormulaParser::default().parse(text)
}

/// Index of the brace closing the one at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a call body on the commas that belong to it.
///
/// Scans backwards from the end of the body keeping a brace depth, so commas
/// inside nested calls are skipped. Returns `None` on unbalanced braces.
fn split_arguments(body: &str) -> Option<Vec<&str>> {
    let mut args = Vec::new();
    let mut depth = 0_i32;
    let mut end = body.len();
    for (i, b) in body.bytes().enumerate().rev() {
        match b {
            b'}' => depth += 1,
            b'{' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            b',' if depth == 0 => {
                args.push(&body[i + 1..end]);
                end = i;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(&body[..end]);
    args.reverse();
    Some(args)
}

fn parse_number(token: &str) -> Result<Literal, ParseError> {
    if let Ok(v) = token.parse::<i64>() {
        return Ok(Literal::Int(v));
    }
    token
        .parse::<f64>()
        .map(Literal::Float)
        .map_err(|_| ParseError::MalformedLiteral(token.to_string()))
}

/// Whether `token` parses back as a field reference rather than a literal.
pub(crate) fn is_field_name(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && parse_number(token).is_err()
}

fn parse_leaf(token: &str) -> Result<Node, ParseError> {
    if token.contains('}') {
        return Err(ParseError::UnbalancedBraces(token.to_string()));
    }
    if let Ok(literal) = parse_number(token) {
        return Ok(Node::literal(literal));
    }
    if is_field_name(token) {
        Ok(Node::field(token))
    } else {
        Err(ParseError::MalformedLiteral(token.to_string()))
    }
}
