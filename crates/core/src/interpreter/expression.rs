use std::fmt;

use tracing::trace;

use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::lexer::{Lexeme, LexemeKind};
use crate::reference::ResourceReference;

use super::scope::{CallError, ScopeId, Scopes};
use super::token::Token;

/// An unevaluated slice of lexemes.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    lexemes: Vec<Lexeme>,
}

impl Expression {
    pub fn new(lexemes: Vec<Lexeme>) -> Self {
        Expression { lexemes }
    }

    pub fn lexemes(&self) -> &[Lexeme] {
        &self.lexemes
    }

    pub fn is_empty(&self) -> bool {
        self.lexemes.is_empty()
    }

    pub fn evaluate(&self, scopes: &Scopes, scope: ScopeId) -> Result<Token> {
        if self.lexemes.is_empty() {
            return Err(Diagnostic::new(ErrorKind::UnexpectedLexeme, "empty expression")
                .with_code(code::BAD_VALUE));
        }
        let mut evaluator = Evaluator {
            lexemes: &self.lexemes,
            pos: 0,
            scopes,
            scope,
        };
        let value = evaluator.expression(0)?;
        if let Some(extra) = evaluator.peek() {
            return Err(Diagnostic::unexpected(extra).with_info("expected end of expression"));
        }
        trace!(expression = %self, value = %value, "evaluated");
        Ok(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, lexeme) in self.lexemes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match lexeme.kind {
                LexemeKind::String => write!(f, "{:?}", lexeme.text)?,
                LexemeKind::Reference => write!(f, "#{}", lexeme.text)?,
                LexemeKind::Variable => write!(f, "${}", lexeme.text)?,
                _ => f.write_str(&lexeme.text)?,
            }
        }
        Ok(())
    }
}

fn binary_precedence(kind: LexemeKind) -> Option<u8> {
    Some(match kind {
        LexemeKind::Pipe => 1,
        LexemeKind::Caret => 2,
        LexemeKind::Ampersand => 3,
        LexemeKind::ShiftLeft | LexemeKind::ShiftRight => 4,
        LexemeKind::Plus | LexemeKind::Minus => 5,
        LexemeKind::Star | LexemeKind::Slash | LexemeKind::Percent => 6,
        _ => return None,
    })
}

struct Evaluator<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
    scopes: &'a Scopes,
    scope: ScopeId,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&'a Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Lexeme> {
        match self.lexemes.get(self.pos) {
            Some(lexeme) => {
                self.pos += 1;
                Ok(lexeme)
            }
            None => Err(self.at_end("expected a value")),
        }
    }

    fn at_end(&self, reason: &str) -> Diagnostic {
        let diag = Diagnostic::new(
            ErrorKind::UnexpectedLexeme,
            format!("{} at end of expression", reason),
        );
        match self.lexemes.last() {
            Some(last) => diag.located(last),
            None => diag,
        }
    }

    fn close(&mut self, kind: LexemeKind) -> Result<()> {
        match self.peek() {
            Some(lexeme) if lexeme.is(kind) => {
                self.pos += 1;
                Ok(())
            }
            Some(lexeme) => Err(Diagnostic::unexpected(lexeme)
                .with_info(format!("expected {}", kind.describe()))),
            None => Err(self.at_end(&format!("expected {}", kind.describe()))),
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Token> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek() {
            let Some(precedence) = binary_precedence(op.kind) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(precedence + 1)?;
            lhs = apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Token> {
        let Some(op) = self.peek() else {
            return Err(self.at_end("expected a value"));
        };
        if !matches!(op.kind, LexemeKind::Minus | LexemeKind::Tilde | LexemeKind::Bang) {
            return self.primary();
        }
        self.pos += 1;
        let operand = self.unary()?;
        let n = integer_operand(op, &operand)?;
        let value = match op.kind {
            LexemeKind::Minus => n.checked_neg().ok_or_else(|| overflow(op))?,
            LexemeKind::Tilde => !n,
            _ => i64::from(n == 0),
        };
        Ok(Token::Integer(value))
    }

    fn primary(&mut self) -> Result<Token> {
        let lexeme = self.next()?;
        match lexeme.kind {
            LexemeKind::Integer => Ok(Token::Integer(lexeme.integer()?)),
            LexemeKind::String => Ok(Token::String(lexeme.text.clone())),
            LexemeKind::Reference => ResourceReference::parse(&lexeme.text)
                .map(Token::Reference)
                .ok_or_else(|| {
                    Diagnostic::at(
                        ErrorKind::InvalidValue,
                        lexeme,
                        format!("'#{}' is not a valid resource reference", lexeme.text),
                    )
                    .with_code(code::BAD_VALUE)
                }),
            LexemeKind::Variable if lexeme.text.is_empty() => self.group(),
            LexemeKind::Variable => self.lookup(lexeme),
            LexemeKind::LParen => {
                self.pos -= 1;
                self.group()
            }
            LexemeKind::LBracket => self.list(),
            LexemeKind::Identifier => match lexeme.text.as_str() {
                "true" => Ok(Token::Integer(1)),
                "false" => Ok(Token::Integer(0)),
                _ if self.peek().is_some_and(|l| l.is(LexemeKind::LParen)) => self.call(lexeme),
                _ => self.lookup(lexeme),
            },
            _ => Err(Diagnostic::unexpected(lexeme).with_info("expected a value")),
        }
    }

    /// `( expression )`
    fn group(&mut self) -> Result<Token> {
        self.close(LexemeKind::LParen)?;
        let value = self.expression(0)?;
        self.close(LexemeKind::RParen)?;
        Ok(value)
    }

    /// `[ a, b, ... ]`, the opening bracket already consumed.
    fn list(&mut self) -> Result<Token> {
        let mut items = Vec::new();
        if self.peek().is_some_and(|l| l.is(LexemeKind::RBracket)) {
            self.pos += 1;
            return Ok(Token::List(items));
        }
        loop {
            items.push(self.expression(0)?);
            match self.next()? {
                l if l.is(LexemeKind::Comma) => continue,
                l if l.is(LexemeKind::RBracket) => return Ok(Token::List(items)),
                l => return Err(Diagnostic::unexpected(l).with_info("expected ',' or ']'")),
            }
        }
    }

    fn lookup(&self, name: &Lexeme) -> Result<Token> {
        self.scopes
            .variable(self.scope, &name.text)
            .cloned()
            .ok_or_else(|| {
                Diagnostic::at(
                    ErrorKind::UnresolvedSymbol,
                    name,
                    format!("unrecognized variable '{}'", name.text),
                )
            })
    }

    /// `name ( arg, ... )` with arbitrarily nested arguments.
    fn call(&mut self, name: &Lexeme) -> Result<Token> {
        self.close(LexemeKind::LParen)?;
        let mut arguments = Vec::new();
        if self.peek().is_some_and(|l| l.is(LexemeKind::RParen)) {
            self.pos += 1;
        } else {
            loop {
                arguments.push(self.expression(0)?);
                match self.next()? {
                    l if l.is(LexemeKind::Comma) => continue,
                    l if l.is(LexemeKind::RParen) => break,
                    l => return Err(Diagnostic::unexpected(l).with_info("expected ',' or ')'")),
                }
            }
        }
        self.scopes
            .call(self.scope, &name.text, &arguments)
            .map_err(|err| match err {
                CallError::Unknown => Diagnostic::at(
                    ErrorKind::UnresolvedSymbol,
                    name,
                    format!("unrecognized function '{}'", name.text),
                ),
                CallError::Arity { expected, found } => Diagnostic::at(
                    ErrorKind::InvalidValue,
                    name,
                    format!(
                        "function '{}' takes {} argument(s) but {} were given",
                        name.text, expected, found
                    ),
                ),
                CallError::Failed(reason) => Diagnostic::at(
                    ErrorKind::InvalidValue,
                    name,
                    format!("call to '{}' failed: {}", name.text, reason),
                ),
            })
    }
}

fn integer_operand(op: &Lexeme, value: &Token) -> Result<i64> {
    value.as_integer().ok_or_else(|| {
        Diagnostic::at(
            ErrorKind::InvalidValue,
            op,
            format!("operator '{}' needs an integer operand, found {}", op.text, value.type_name()),
        )
    })
}

fn overflow(op: &Lexeme) -> Diagnostic {
    Diagnostic::at(
        ErrorKind::InvalidValue,
        op,
        format!("arithmetic overflow in '{}'", op.text),
    )
}

fn apply_binary(op: &Lexeme, lhs: Token, rhs: Token) -> Result<Token> {
    if op.is(LexemeKind::Plus) {
        if let (Token::String(_), _) | (_, Token::String(_)) = (&lhs, &rhs) {
            return Ok(Token::String(format!("{}{}", lhs, rhs)));
        }
    }
    let a = integer_operand(op, &lhs)?;
    let b = integer_operand(op, &rhs)?;
    let shift = || u32::try_from(b).ok().filter(|s| *s < 64);
    let value = match op.kind {
        LexemeKind::Plus => a.checked_add(b),
        LexemeKind::Minus => a.checked_sub(b),
        LexemeKind::Star => a.checked_mul(b),
        LexemeKind::Slash | LexemeKind::Percent if b == 0 => {
            return Err(Diagnostic::at(ErrorKind::InvalidValue, op, "division by zero"))
        }
        LexemeKind::Slash => a.checked_div(b),
        LexemeKind::Percent => a.checked_rem(b),
        LexemeKind::Ampersand => Some(a & b),
        LexemeKind::Pipe => Some(a | b),
        LexemeKind::Caret => Some(a ^ b),
        LexemeKind::ShiftLeft => shift().map(|s| a << s),
        LexemeKind::ShiftRight => shift().map(|s| a >> s),
        _ => return Err(Diagnostic::unexpected(op)),
    };
    value.map(Token::Integer).ok_or_else(|| overflow(op))
}
