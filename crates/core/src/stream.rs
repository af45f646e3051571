//! Cursor over a lexeme sequence with lookahead and expectation checks.

use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::expectation::Expectation;
use crate::lexer::{Lexeme, LexemeKind};

/// Saved cursor position for a bounded rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

/// Ordered lexemes plus a forward-moving cursor.
///
/// The final lexeme is always [`LexemeKind::Eof`]; peeking past the end keeps
/// returning it.
#[derive(Debug, Clone)]
pub struct TokenStream {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl TokenStream {
    pub fn new(lexemes: Vec<Lexeme>) -> Self {
        debug_assert!(lexemes.last().is_some_and(|l| l.is(LexemeKind::Eof)));
        TokenStream { lexemes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn finished(&self) -> bool {
        self.peek(0).is(LexemeKind::Eof)
    }

    /// Lexeme `offset` positions ahead of the cursor, without consuming.
    pub fn peek(&self, offset: usize) -> &Lexeme {
        let last = self.lexemes.len() - 1;
        &self.lexemes[(self.pos + offset).min(last)]
    }

    /// Consume and return the current lexeme.
    pub fn read(&mut self) -> Lexeme {
        let lexeme = self.peek(0).clone();
        self.advance();
        lexeme
    }

    pub fn advance(&mut self) {
        if self.pos < self.lexemes.len() - 1 {
            self.pos += 1;
        }
    }

    /// True when each expectation holds at successive positions from the
    /// cursor. An optional expectation that does not hold is skipped without
    /// using up a position. Never consumes.
    pub fn expect(&self, expectations: &[Expectation<'_>]) -> bool {
        let mut offset = 0;
        for expectation in expectations {
            if expectation.matches(self.peek(offset)) {
                offset += 1;
            } else if !expectation.is_optional() {
                return false;
            }
        }
        true
    }

    /// True when any of the alternatives holds at the cursor.
    pub fn expect_any(&self, alternatives: &[Expectation<'_>]) -> bool {
        alternatives.iter().any(|e| e.matches(self.peek(0)))
    }

    /// Consume one lexeme per matching expectation if every required
    /// expectation holds, otherwise fail at the first offending lexeme
    /// without consuming any. Absent optional lexemes are left out of the
    /// result.
    pub fn ensure(&mut self, expectations: &[Expectation<'_>]) -> Result<Vec<Lexeme>> {
        let mut count = 0;
        for expectation in expectations {
            let lexeme = self.peek(count);
            if expectation.matches(lexeme) {
                count += 1;
            } else if !expectation.is_optional() {
                return Err(expectation.failure(lexeme));
            }
        }
        Ok((0..count).map(|_| self.read()).collect())
    }

    /// Consume the current lexeme if it matches.
    pub fn accept(&mut self, expectation: Expectation<'_>) -> Option<Lexeme> {
        if expectation.matches(self.peek(0)) {
            Some(self.read())
        } else {
            None
        }
    }

    /// Consume a lexeme of `kind`, failing with an unexpected-lexeme
    /// diagnostic otherwise.
    pub fn take(&mut self, kind: LexemeKind) -> Result<Lexeme> {
        let mut taken = self.ensure(&[Expectation::kind(kind)])?;
        Ok(taken.remove(0))
    }

    /// Consume the identifier `word`.
    pub fn take_word(&mut self, word: &str) -> Result<Lexeme> {
        let texts = [word];
        let mut taken = self.ensure(&[Expectation::kind_with(LexemeKind::Identifier, &texts)])?;
        Ok(taken.remove(0))
    }

    pub fn accept_kind(&mut self, kind: LexemeKind) -> Option<Lexeme> {
        self.accept(Expectation::kind(kind))
    }

    pub fn mark(&self) -> Mark {
        Mark(self.pos)
    }

    /// Move the cursor back to `mark`. Only backwards moves are permitted.
    pub fn rewind(&mut self, mark: Mark) {
        debug_assert!(mark.0 <= self.pos, "rewind may only move backwards");
        self.pos = mark.0.min(self.pos);
    }

    /// Lexemes from the cursor up to, not including, the next `terminator`
    /// at bracket depth zero. The terminator itself is left unconsumed.
    pub fn read_until(&mut self, terminator: LexemeKind) -> Result<Vec<Lexeme>> {
        let start = self.peek(0).clone();
        let mut depth = 0usize;
        let mut out = Vec::new();
        loop {
            let lexeme = self.peek(0);
            match lexeme.kind {
                LexemeKind::Eof => {
                    return Err(Diagnostic::at(
                        ErrorKind::UnexpectedLexeme,
                        &start,
                        format!("expected {} before end of input", terminator.describe()),
                    ))
                }
                kind if kind == terminator && depth == 0 => return Ok(out),
                LexemeKind::LParen | LexemeKind::LBrace | LexemeKind::LBracket => depth += 1,
                LexemeKind::RParen | LexemeKind::RBrace | LexemeKind::RBracket => {
                    if depth == 0 {
                        return Err(Diagnostic::unexpected(lexeme));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            out.push(self.read());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn stream(src: &str) -> TokenStream {
        TokenStream::new(lex(src, "t.kdl").unwrap())
    }

    #[test]
    fn peek_does_not_consume_and_saturates_at_eof() {
        let s = stream("a b");
        assert_eq!(s.peek(0).text, "a");
        assert_eq!(s.peek(1).text, "b");
        assert!(s.peek(10).is(LexemeKind::Eof));
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn expect_checks_successive_positions() {
        let s = stream("type Foo :");
        assert!(s.expect(&[
            Expectation::kind_with(LexemeKind::Identifier, &["type"]),
            Expectation::kind(LexemeKind::Identifier),
            Expectation::kind(LexemeKind::Colon),
        ]));
        assert!(!s.expect(&[Expectation::kind(LexemeKind::Colon)]));
    }

    #[test]
    fn expect_any_matches_one_alternative() {
        let s = stream("override");
        assert!(s.expect_any(&[
            Expectation::kind_with(LexemeKind::Identifier, &["new"]),
            Expectation::kind_with(LexemeKind::Identifier, &["override"]),
        ]));
    }

    #[test]
    fn ensure_consumes_exactly_on_success() {
        let mut s = stream("a = 1 ;");
        let taken = s
            .ensure(&[
                Expectation::kind(LexemeKind::Identifier),
                Expectation::kind(LexemeKind::Equals),
                Expectation::kind(LexemeKind::Integer),
            ])
            .unwrap();
        assert_eq!(taken.len(), 3);
        assert_eq!(s.position(), 3);
    }

    #[test]
    fn ensure_consumes_nothing_on_failure() {
        let mut s = stream("a = \"x\" ;");
        let err = s
            .ensure(&[
                Expectation::kind(LexemeKind::Identifier),
                Expectation::kind(LexemeKind::Equals),
                Expectation::kind(LexemeKind::Integer),
            ])
            .unwrap_err();
        assert_eq!(s.position(), 0);
        assert_eq!(err.kind, ErrorKind::UnexpectedLexeme);
        assert_eq!(err.location.unwrap().column, 5);
    }

    #[test]
    fn absent_optional_is_skipped() {
        let expectations = [
            Expectation::kind(LexemeKind::String).optional(),
            Expectation::kind(LexemeKind::Identifier),
            Expectation::kind(LexemeKind::Equals),
        ];
        assert!(stream("x = 1").expect(&expectations));
        assert!(stream("\"doc\" x = 1").expect(&expectations));
        assert!(!stream("1 x =").expect(&expectations));

        let mut s = stream("x = 1");
        let taken = s.ensure(&expectations).unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(s.peek(0).text, "1");

        let mut s = stream("\"doc\" x = 1");
        let taken = s.ensure(&expectations).unwrap();
        assert_eq!(taken.len(), 3);
        assert_eq!(taken[0].text, "doc");
    }

    #[test]
    fn optional_does_not_swallow_other_lexemes() {
        let mut s = stream("a , b");
        let err = s
            .ensure(&[
                Expectation::kind(LexemeKind::Identifier),
                Expectation::kind(LexemeKind::Semicolon).optional(),
                Expectation::kind(LexemeKind::Identifier),
            ])
            .unwrap_err();
        assert_eq!(s.position(), 0);
        assert_eq!(err.location.unwrap().column, 3);
    }

    #[test]
    fn ensure_all_or_nothing_over_many_inputs() {
        let sources = ["x", "x y", "x 1", "1 x", "", "x y z", "; ;"];
        let expectations = [
            Expectation::kind(LexemeKind::Identifier),
            Expectation::kind(LexemeKind::Identifier),
        ];
        for src in sources {
            let mut s = stream(src);
            match s.ensure(&expectations) {
                Ok(_) => assert_eq!(s.position(), 2, "source {:?}", src),
                Err(_) => assert_eq!(s.position(), 0, "source {:?}", src),
            }
        }
    }

    #[test]
    fn rewind_restores_mark() {
        let mut s = stream("Nested < X >");
        let mark = s.mark();
        s.read();
        s.read();
        s.rewind(mark);
        assert_eq!(s.peek(0).text, "Nested");
    }

    #[test]
    fn read_until_respects_nesting() {
        let mut s = stream("f(a; b) + 1; next");
        let body = s.read_until(LexemeKind::Semicolon).unwrap();
        assert_eq!(body.len(), 8);
        assert!(s.peek(0).is(LexemeKind::Semicolon));
    }

    #[test]
    fn read_until_fails_at_eof() {
        let mut s = stream("a b");
        let err = s.read_until(LexemeKind::Semicolon).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedLexeme);
    }
}
