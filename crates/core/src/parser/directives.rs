use tracing::debug;

use super::Parser;
use crate::config::Format;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::expectation::Expectation;
use crate::interpreter::Expression;
use crate::lexer::LexemeKind;

impl<'s, 'p> Parser<'s, 'p> {
    pub(super) fn directive(&mut self) -> Result<()> {
        let directive = self.stream.take(LexemeKind::Directive)?;
        match directive.text.as_str() {
            "out" => {
                let path = self.stream.take(LexemeKind::String)?;
                debug!(unit = %path.text, "switching output unit");
                self.session.unit = path.text;
            }
            "var" => self.variable()?,
            "import" => self.import()?,
            "format" => self.format()?,
            key => {
                let value = self.stream.take(LexemeKind::String)?;
                self.session.project.metadata.set(key, &value.text);
            }
        }
        self.end_item()?;
        Ok(())
    }

    /// `@var name = expression;`
    fn variable(&mut self) -> Result<()> {
        let name = self.stream.take(LexemeKind::Identifier)?;
        self.stream.take(LexemeKind::Equals)?;
        let expression = Expression::new(self.stream.read_until(LexemeKind::Semicolon)?);
        let root = self.session.scopes.root();
        let value = expression
            .evaluate(&self.session.scopes, root)
            .map_err(|diag| diag.located(&name))?;
        self.session.scopes.set_variable(root, &name.text, value);
        Ok(())
    }

    /// `@import "relative/path.kdl";`
    fn import(&mut self) -> Result<()> {
        let target = self.stream.take(LexemeKind::String)?;
        let provider = self.session.provider();
        let resolved = provider
            .resolve_import(&self.path, &target.text)
            .map_err(|e| {
                Diagnostic::at(
                    ErrorKind::Io,
                    &target,
                    format!("cannot resolve import '{}': {}", target.text, e),
                )
            })?;
        debug!(import = %resolved.display(), from = %self.path.display(), "importing");
        self.session
            .compile_file(&resolved)
            .map_err(|diag| diag.located(&target))
    }

    /// `@format [set|requires] <format>;`. A bare format name means `set`.
    fn format(&mut self) -> Result<()> {
        let modes = ["set", "requires"];
        let taken = self.stream.ensure(&[
            Expectation::kind_with(LexemeKind::Identifier, &modes).optional(),
            Expectation::kind(LexemeKind::Identifier),
        ])?;
        let Some((name, mode)) = taken.split_last() else {
            return Err(Diagnostic::unexpected(self.stream.peek(0)));
        };
        let requires = mode.first().is_some_and(|m| m.text == "requires");
        let format: Format = name.text.parse().map_err(|reason: String| {
            Diagnostic::at(ErrorKind::InvalidValue, name, reason).with_code(code::BAD_VALUE)
        })?;
        if !requires {
            debug!(%format, "target format set");
            self.session.project.format = format;
        } else if self.session.project.format != format {
            return Err(Diagnostic::at(
                ErrorKind::InvalidValue,
                name,
                format!(
                    "this source requires the {} format but the target is {}",
                    format, self.session.project.format
                ),
            )
            .with_code(code::ILLEGAL_VALUE));
        }
        Ok(())
    }
}
