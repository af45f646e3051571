use super::Parser;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::interpreter::{Expression, Token};
use crate::lexer::{Lexeme, LexemeKind};
use crate::types::{BinaryKind, SymbolList, TypeDefinition};
use crate::value::ValueContainer;

impl<'s, 'p> Parser<'s, 'p> {
    // -- Values --------------------------------------------------

    /// Lexemes of one value, up to a `terminator` at bracket depth zero. With
    /// `symbols_may_follow`, a `[Name = ...` symbol list also ends the value.
    pub(super) fn value_lexemes(
        &mut self,
        terminators: &[LexemeKind],
        symbols_may_follow: bool,
    ) -> Result<Vec<Lexeme>> {
        let mut depth = 0usize;
        let mut lexemes = Vec::new();
        loop {
            let kind = self.stream.peek(0).kind;
            if depth == 0 && terminators.contains(&kind) {
                break;
            }
            match kind {
                LexemeKind::Eof => {
                    return Err(Diagnostic::unexpected(self.stream.peek(0))
                        .with_info("value is never terminated"))
                }
                LexemeKind::LBracket
                    if depth == 0
                        && symbols_may_follow
                        && self.stream.peek(1).is(LexemeKind::Identifier)
                        && self.stream.peek(2).is(LexemeKind::Equals) =>
                {
                    break
                }
                LexemeKind::LParen | LexemeKind::LBracket => depth += 1,
                LexemeKind::RParen | LexemeKind::RBracket => {
                    if depth == 0 {
                        return Err(Diagnostic::unexpected(self.stream.peek(0)));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            lexemes.push(self.stream.read());
        }
        if lexemes.is_empty() {
            return Err(Diagnostic::unexpected(self.stream.peek(0)).with_info("expected a value"));
        }
        Ok(lexemes)
    }

    /// Resolve value lexemes for a slot of `kind`. A lone identifier naming a
    /// symbol yields the symbol's value; anything else is evaluated with the
    /// symbols visible as variables.
    pub(super) fn convert(
        &mut self,
        lexemes: &[Lexeme],
        kind: &BinaryKind,
        symbols: &SymbolList,
    ) -> Result<ValueContainer> {
        let first = &lexemes[0];
        let illegal = |reason: String| {
            Diagnostic::at(ErrorKind::InvalidValue, first, reason).with_code(code::ILLEGAL_VALUE)
        };

        if let [single] = lexemes {
            if single.is(LexemeKind::Identifier) {
                if let Some(value) = symbols.lookup(&single.text) {
                    value.check_fits(kind).map_err(illegal)?;
                    return Ok(value.clone());
                }
            }
        }

        let root = self.session.scopes.root();
        let scope = self.session.scopes.shadow(root);
        for (name, value) in symbols.iter() {
            if let Some(token) = value.to_token() {
                self.session.scopes.set_variable(scope, name, token);
            }
        }
        let evaluated = Expression::new(lexemes.to_vec()).evaluate(&self.session.scopes, scope);
        self.session.scopes.discard(scope);

        let token = evaluated.map_err(|diag| {
            if diag.kind == ErrorKind::UnresolvedSymbol && lexemes.len() == 1 {
                diag.with_code(code::UNRECOGNIZED_SYMBOL)
                    .with_info("not a symbol of this field or a global variable")
            } else {
                diag
            }
        })?;
        ValueContainer::from_token(token, kind).map_err(illegal)
    }

    /// Evaluate a parenthesised, comma-separated argument list in the global
    /// scope. `lexemes` excludes the parentheses.
    pub(super) fn arguments(&self, lexemes: &[Lexeme]) -> Result<Vec<Token>> {
        let root = self.session.scopes.root();
        split_arguments(lexemes)
            .into_iter()
            .map(|argument| Expression::new(argument).evaluate(&self.session.scopes, root))
            .collect()
    }

    /// Run `definition`'s constructor matching the argument count. Every
    /// assigned template label becomes `prefix + label`.
    pub(super) fn construct_values(
        &mut self,
        definition: &TypeDefinition,
        call: &Lexeme,
        arguments: Vec<Token>,
        prefix: &str,
    ) -> Result<Vec<(String, ValueContainer)>> {
        let constructor = definition.constructor_for(arguments.len()).ok_or_else(|| {
            Diagnostic::at(
                ErrorKind::UnresolvedSymbol,
                call,
                format!(
                    "type '{}' has no constructor taking {} argument(s)",
                    definition.name,
                    arguments.len()
                ),
            )
        })?;
        let root = self.session.scopes.root();
        let results = constructor
            .execute(&mut self.session.scopes, root, &arguments, &definition.template)
            .map_err(|diag| diag.with_info(format!("in constructor of '{}'", definition.name)))?;

        let mut values = Vec::new();
        for (label, token) in results {
            let Some(token) = token else { continue };
            let Some(slot) = definition.template.field_named(&label) else {
                continue;
            };
            let value = ValueContainer::from_token(token, &slot.kind).map_err(|reason| {
                Diagnostic::at(
                    ErrorKind::InvalidValue,
                    call,
                    format!("constructor result '{}': {}", label, reason),
                )
                .with_code(code::ILLEGAL_VALUE)
            })?;
            values.push((format!("{}{}", prefix, label), value));
        }
        Ok(values)
    }
}

/// Split lexemes at commas outside brackets.
fn split_arguments(lexemes: &[Lexeme]) -> Vec<Vec<Lexeme>> {
    let mut arguments = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    for lexeme in lexemes {
        match lexeme.kind {
            LexemeKind::Comma if depth == 0 => {
                arguments.push(std::mem::take(&mut current));
                continue;
            }
            LexemeKind::LParen | LexemeKind::LBracket => depth += 1,
            LexemeKind::RParen | LexemeKind::RBracket => depth = depth.saturating_sub(1),
            _ => {}
        }
        current.push(lexeme.clone());
    }
    if !current.is_empty() || !arguments.is_empty() {
        arguments.push(current);
    }
    arguments
}
