// Filter expression parser
// Turns filter text such as `age > :minAge AND (name LIKE 'A%' OR name IS NULL)`
// into a FilterExpr tree. Field names are not checked here; the same tree can be
// compiled against any definition.

use super::filter::{CompareOp, FilterExpr, Operand};
use crate::value::Value;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// Deepest run of parentheses and NOTs accepted in filter text
pub const MAX_NESTING_DEPTH: usize = 64;

/// A syntax error in filter text
#[derive(Debug, Clone, Error, PartialEq)]
#[error("filter parse error at position {position}: {message} (near `{remainder}`)")]
pub struct ParseError {
    /// Byte offset of the offending token
    pub position: usize,
    /// Input left unparsed from `position` on
    pub remainder: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Param(String),
    Str(String),
    Number(Value),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    End,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

/// Parse filter text into an expression tree
pub fn parse(input: &str) -> Result<FilterExpr, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = ExprParser {
        input,
        tokens,
        cursor: 0,
        depth: 0,
    };

    let expr = parser.parse_or()?;
    if parser.peek() != &Token::End {
        return Err(parser.error("unexpected input after expression"));
    }
    Ok(expr)
}

fn error_at(input: &str, position: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        position,
        remainder: input[position..].to_string(),
        message: message.into(),
    }
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();

        while let Some(&(position, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }

            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                ',' => self.single(Token::Comma),
                '=' => self.single(Token::Op(CompareOp::Eq)),
                '!' => {
                    self.chars.next();
                    if !self.eat('=') {
                        return Err(error_at(self.input, position, "expected `!=`"));
                    }
                    Token::Op(CompareOp::NotEq)
                }
                '<' => {
                    self.chars.next();
                    if self.eat('=') {
                        Token::Op(CompareOp::LtEq)
                    } else if self.eat('>') {
                        Token::Op(CompareOp::NotEq)
                    } else {
                        Token::Op(CompareOp::Lt)
                    }
                }
                '>' => {
                    self.chars.next();
                    if self.eat('=') {
                        Token::Op(CompareOp::GtEq)
                    } else {
                        Token::Op(CompareOp::Gt)
                    }
                }
                '\'' => self.string(position)?,
                ':' => {
                    self.chars.next();
                    let name = self.word();
                    if name.is_empty() {
                        return Err(error_at(
                            self.input,
                            position,
                            "expected a parameter name after `:`",
                        ));
                    }
                    Token::Param(name)
                }
                '-' | '0'..='9' => self.number(position)?,
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.word()),
                other => {
                    return Err(error_at(
                        self.input,
                        position,
                        format!("unexpected character `{}`", other),
                    ))
                }
            };

            tokens.push(Spanned { token, position });
        }

        tokens.push(Spanned {
            token: Token::End,
            position: self.input.len(),
        });
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn eat(&mut self, expected: char) -> bool {
        match self.chars.peek() {
            Some(&(_, c)) if c == expected => {
                self.chars.next();
                true
            }
            _ => false,
        }
    }

    /// Identifier characters; dots allow qualified names like `c.name`
    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }

    /// Single-quoted string; `''` is an escaped quote
    fn string(&mut self, start: usize) -> Result<Token, ParseError> {
        self.chars.next();
        let mut value = String::new();

        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    if self.eat('\'') {
                        value.push('\'');
                    } else {
                        return Ok(Token::Str(value));
                    }
                }
                Some((_, c)) => value.push(c),
                None => return Err(error_at(self.input, start, "unterminated string literal")),
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut text = String::new();
        if self.eat('-') {
            text.push('-');
        }

        let mut seen_dot = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() || (c == '.' && !seen_dot) {
                seen_dot |= c == '.';
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        let value = if seen_dot {
            text.parse::<f64>().ok().map(Value::Float)
        } else {
            text.parse::<i64>().ok().map(Value::Integer)
        };

        value
            .map(Token::Number)
            .ok_or_else(|| error_at(self.input, start, format!("invalid number `{}`", text)))
    }
}

struct ExprParser<'a> {
    input: &'a str,
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.cursor].token
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.cursor].token.clone();
        if token != Token::End {
            self.cursor += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        error_at(self.input, self.tokens[self.cursor].position, message)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn parse_or(&mut self) -> Result<FilterExpr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, ParseError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("AND") {
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, ParseError> {
        if self.at_keyword("NOT") {
            self.enter()?;
            self.advance();
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(inner.not());
        }

        if self.peek() == &Token::LParen {
            self.enter()?;
            self.advance();
            let inner = self.parse_or()?;
            self.expect(Token::RParen, "`)`")?;
            self.depth -= 1;
            return Ok(inner);
        }

        self.parse_predicate()
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_predicate(&mut self) -> Result<FilterExpr, ParseError> {
        let left = self.parse_operand()?;

        if let Token::Op(op) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_operand()?;
            return Ok(FilterExpr::Compare { left, op, right });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            if !self.eat_keyword("NULL") {
                return Err(self.error("expected NULL"));
            }
            return Ok(FilterExpr::IsNull {
                operand: left,
                negated,
            });
        }

        let negated = self.eat_keyword("NOT");

        if self.eat_keyword("LIKE") {
            let right = self.parse_operand()?;
            let op = if negated {
                CompareOp::NotLike
            } else {
                CompareOp::Like
            };
            return Ok(FilterExpr::Compare { left, op, right });
        }

        if self.eat_keyword("IN") {
            self.expect(Token::LParen, "`(` after IN")?;
            let mut list = vec![self.parse_operand()?];
            while self.peek() == &Token::Comma {
                self.advance();
                list.push(self.parse_operand()?);
            }
            self.expect(Token::RParen, "`)` to close IN list")?;
            return Ok(FilterExpr::In {
                operand: left,
                list,
                negated,
            });
        }

        if negated {
            Err(self.error("expected LIKE or IN after NOT"))
        } else {
            Err(self.error("expected a comparison operator"))
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        let operand = match self.peek() {
            Token::Str(s) => Operand::Literal(Value::Text(s.clone())),
            Token::Number(n) => Operand::Literal(n.clone()),
            Token::Param(name) => Operand::Param(name.clone()),
            Token::Ident(word) => match word.to_ascii_uppercase().as_str() {
                "TRUE" => Operand::Literal(Value::Boolean(true)),
                "FALSE" => Operand::Literal(Value::Boolean(false)),
                "NULL" => Operand::Literal(Value::Null),
                "AND" | "OR" | "NOT" | "LIKE" | "IN" | "IS" => {
                    return Err(self.error(format!("unexpected keyword {}", word)))
                }
                _ => Operand::Field(word.clone()),
            },
            _ => return Err(self.error("expected a value, parameter or field")),
        };

        self.advance();
        Ok(operand)
    }
}
