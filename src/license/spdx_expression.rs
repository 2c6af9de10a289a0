//! License expression parser
//!
//! Parses the canonical string form back into an [`Expression`]:
//!   `MIT`
//!   `GPL-2.0+`
//!   `GPL-2.0-only WITH Classpath-exception-2.0`
//!   `(MIT AND BSD-2-Clause) OR Apache-2.0`
//!   `LicenseRef-FooCorp-Custom`
//!   `NONE`
//!
//! Parsing is purely structural. Mapping identifiers onto the registry
//! (and demoting unknown ones to `Unresolved`) happens in
//! `Registry::parse_expression`.

use crate::license::{Expression, NONE};

/// Prefix of placeholder references for unidentified licenses
pub const LICENSE_REF_PREFIX: &str = "LicenseRef-";

/// Parse an expression string
pub fn parse(input: &str) -> Result<Expression, String> {
    let tokens = tokenize(input)?;
    let (expr, rest) = parse_or(&tokens)?;
    if !rest.is_empty() {
        return Err(format!("Unexpected tokens after expression: {:?}", rest));
    }
    Ok(expr)
}

// ─── Tokenizer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                match word.to_uppercase().as_str() {
                    "AND" => tokens.push(Token::And),
                    "OR" => tokens.push(Token::Or),
                    "WITH" => tokens.push(Token::With),
                    _ => tokens.push(Token::Identifier(word)),
                }
            }
        }
    }

    Ok(tokens)
}

// ─── Recursive Descent Parser ──────────────────────────────────────
// Precedence: WITH > AND > OR (WITH binds tightest)

fn parse_or(tokens: &[Token]) -> Result<(Expression, &[Token]), String> {
    let (first, mut rest) = parse_and(tokens)?;
    let mut operands = vec![first];

    while !rest.is_empty() && rest[0] == Token::Or {
        let (next, r) = parse_and(&rest[1..])?;
        operands.push(next);
        rest = r;
    }

    Ok((Expression::any_of(operands), rest))
}

fn parse_and(tokens: &[Token]) -> Result<(Expression, &[Token]), String> {
    let (first, mut rest) = parse_with(tokens)?;
    let mut operands = vec![first];

    while !rest.is_empty() && rest[0] == Token::And {
        let (next, r) = parse_with(&rest[1..])?;
        operands.push(next);
        rest = r;
    }

    Ok((Expression::all_of(operands), rest))
}

fn parse_with(tokens: &[Token]) -> Result<(Expression, &[Token]), String> {
    let (base, rest) = parse_primary(tokens)?;

    if !rest.is_empty() && rest[0] == Token::With {
        let exception = match rest.get(1) {
            Some(Token::Identifier(exception)) => exception.clone(),
            _ => return Err("Expected exception identifier after WITH".to_string()),
        };
        if base.is_set() || base.is_with_exception() {
            return Err("WITH must follow a simple license identifier".to_string());
        }
        return Ok((Expression::with_exception(base, exception), &rest[2..]));
    }

    Ok((base, rest))
}

fn parse_primary(tokens: &[Token]) -> Result<(Expression, &[Token]), String> {
    if tokens.is_empty() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[0] {
        Token::LParen => {
            let (expr, rest) = parse_or(&tokens[1..])?;
            if rest.is_empty() || rest[0] != Token::RParen {
                return Err("Missing closing parenthesis".to_string());
            }
            Ok((expr, &rest[1..]))
        }
        Token::Identifier(id) => Ok((identifier(id)?, &tokens[1..])),
        other => Err(format!("Unexpected token: {:?}", other)),
    }
}

fn identifier(word: &str) -> Result<Expression, String> {
    if let Some(base) = word.strip_suffix('+') {
        if base.is_empty() || base.ends_with('+') {
            return Err(format!("Malformed or-later identifier: {}", word));
        }
        return Ok(Expression::or_later(identifier(base)?));
    }
    if word.eq_ignore_ascii_case(NONE) {
        return Ok(Expression::none());
    }
    if let Some(reference) = word.strip_prefix(LICENSE_REF_PREFIX) {
        return Ok(Expression::unresolved(reference, "", Vec::new()));
    }
    Ok(Expression::single(word))
}
