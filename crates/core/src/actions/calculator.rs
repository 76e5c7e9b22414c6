//! Arithmetic evaluation for the `calculate` action.
//!
//! Input is first reduced to the allow-list of digits, `+ - * / . ( )` and
//! spaces. Whatever survives is parsed by a small recursive-descent
//! evaluator; nothing else is ever interpreted. Input length and nesting
//! depth are both capped so hostile input cannot exhaust the stack.

use thiserror::Error;

/// Longest expression accepted, counted after filtering.
pub const MAX_EXPRESSION_LEN: usize = 1024;
/// Deepest nesting of parentheses and unary signs accepted.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("expression is empty after filtering")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("malformed number '{0}'")]
    BadNumber(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected trailing input")]
    TrailingInput,
    #[error("result is not a finite number")]
    NonFinite,
    #[error("expression is longer than {} characters", MAX_EXPRESSION_LEN)]
    TooLong,
    #[error("expression nests deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Drops every character outside the allow-list.
pub fn sanitize(expression: &str) -> String {
    expression
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '.' | '(' | ')' | ' '))
        .collect()
}

/// Filters `expression` and evaluates what remains.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let filtered = sanitize(expression);
    if filtered.len() > MAX_EXPRESSION_LEN {
        return Err(CalcError::TooLong);
    }
    let tokens = tokenize(&filtered)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(CalcError::TrailingInput);
    }
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(value)
}

/// Formats a result without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::BadNumber(literal.clone()))?;
                tokens.push(Token::Num(value));
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    /// Runs `f` one nesting level deeper.
    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<f64, CalcError>,
    ) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = if op == Token::Star { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(CalcError::TrailingInput),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(_) => Err(CalcError::TrailingInput),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_precedence() {
        assert_relative_eq!(evaluate("2+2*3").unwrap(), 8.0);
        assert_relative_eq!(evaluate("(2+2)*3").unwrap(), 12.0);
        assert_relative_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_relative_eq!(evaluate("100 / 10 / 5").unwrap(), 2.0);
    }

    #[test]
    fn test_decimals_and_unary() {
        assert_relative_eq!(evaluate("0.1 + 0.2").unwrap(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(evaluate(".5 * 4").unwrap(), 2.0);
        assert_relative_eq!(evaluate("-(3 - 5)").unwrap(), 2.0);
        assert_relative_eq!(evaluate("2 * -3").unwrap(), -6.0);
    }

    #[test]
    fn test_disallowed_characters_are_filtered() {
        assert_eq!(sanitize("2+2; rm -rf /"), "2+2  - /");
        assert_eq!(evaluate("DROP TABLE;"), Err(CalcError::Empty));
        assert_relative_eq!(evaluate("what is 6*7?").unwrap(), 42.0);
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(evaluate("2+"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("(1+2"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("1 2"), Err(CalcError::TrailingInput));
        assert!(matches!(evaluate("1.2.3"), Err(CalcError::BadNumber(_))));
        assert_eq!(evaluate("()"), Err(CalcError::TrailingInput));
    }

    #[test]
    fn test_non_finite_results() {
        assert_eq!(evaluate("1/0"), Err(CalcError::NonFinite));
        assert_eq!(evaluate("0/0"), Err(CalcError::NonFinite));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_relative_eq!(evaluate(&nested).unwrap(), 1.0);
        assert_relative_eq!(evaluate("--1").unwrap(), 1.0);

        let too_deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(evaluate(&too_deep), Err(CalcError::TooDeep));
        assert_eq!(evaluate(&format!("{}1", "-".repeat(200))), Err(CalcError::TooDeep));
    }

    #[test]
    fn test_huge_input_is_rejected_without_recursing() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(evaluate(&parens), Err(CalcError::TooLong));
        assert_eq!(evaluate(&format!("{}1", "-".repeat(10_000))), Err(CalcError::TooLong));
        // Filtered characters do not count toward the limit.
        let padded = format!("{}1+1", "x".repeat(10_000));
        assert_relative_eq!(evaluate(&padded).unwrap(), 2.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(8.0), "8");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
    }
}
