//! KDL source parser.
//!
//! The parser walks one file's token stream and applies each item to the
//! compile session as it goes: directives update metadata and scopes, type
//! definitions are registered, declarations populate the project. There is
//! no separate syntax tree.

use std::path::{Path, PathBuf};

use crate::compile::Session;
use crate::diagnostic::{Diagnostic, Result};
use crate::expectation::Expectation;
use crate::lexer::{Lexeme, LexemeKind};
use crate::stream::TokenStream;
use crate::types::{Decorator, Decorators};

mod declaration;
mod directives;
mod type_definition;
mod values;

/// Directive names handled at the top level. Any other `@name` is a
/// decorator.
const DIRECTIVES: &[&str] = &[
    "project",
    "author",
    "version",
    "license",
    "copyright",
    "email",
    "out",
    "var",
    "import",
    "format",
];

pub(crate) struct Parser<'s, 'p> {
    stream: TokenStream,
    session: &'s mut Session<'p>,
    path: PathBuf,
}

impl<'s, 'p> Parser<'s, 'p> {
    pub(crate) fn new(stream: TokenStream, session: &'s mut Session<'p>, path: &Path) -> Self {
        Parser {
            stream,
            session,
            path: path.to_path_buf(),
        }
    }

    /// Parse every top-level item of the file.
    pub(crate) fn parse(mut self) -> Result<()> {
        while !self.stream.finished() {
            self.item()?;
        }
        Ok(())
    }

    fn item(&mut self) -> Result<()> {
        if self.stream.accept_kind(LexemeKind::Semicolon).is_some() {
            return Ok(());
        }
        let directive = Expectation::kind_with(LexemeKind::Directive, DIRECTIVES);
        if self.stream.expect(&[directive]) {
            return self.directive();
        }

        let decorators = self.decorators()?;
        let keyword = self.stream.peek(0).clone();
        if keyword.is_word("type") {
            self.type_definition(decorators)
        } else if keyword.is_word("declare") && decorators.is_empty() {
            self.declaration()
        } else {
            Err(Diagnostic::unexpected(&keyword)
                .with_info("expected a directive, 'type' or 'declare'"))
        }
    }

    /// Zero or more `@name` or `@name(arg, ...)` annotations.
    fn decorators(&mut self) -> Result<Decorators> {
        let mut decorators = Decorators::default();
        while let Some(name) = self.stream.accept_kind(LexemeKind::Directive) {
            let mut arguments = Vec::new();
            if self.stream.accept_kind(LexemeKind::LParen).is_some()
                && self.stream.accept_kind(LexemeKind::RParen).is_none()
            {
                let argument = [
                    Expectation::kind(LexemeKind::Identifier),
                    Expectation::kind(LexemeKind::String),
                    Expectation::kind(LexemeKind::Integer),
                ];
                loop {
                    if !self.stream.expect_any(&argument) {
                        return Err(Diagnostic::unexpected(self.stream.peek(0))
                            .with_info("decorator arguments are identifiers, strings or integers"));
                    }
                    let lexeme = self.stream.read();
                    arguments.push(lexeme.text);
                    if self.stream.accept_kind(LexemeKind::Comma).is_none() {
                        self.stream.take(LexemeKind::RParen)?;
                        break;
                    }
                }
            }
            decorators.push(Decorator {
                name: name.text,
                arguments,
            });
        }
        Ok(decorators)
    }

    /// Terminating `;` of an item.
    fn end_item(&mut self) -> Result<Lexeme> {
        self.stream.take(LexemeKind::Semicolon)
    }
}

#[cfg(test)]
mod tests;
