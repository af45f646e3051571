use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::trace;

use crate::diagnostic::{Diagnostic, Result};
use crate::lexer::{Lexeme, LexemeKind};
use crate::stream::TokenStream;

use super::expression::Expression;
use super::scope::{ScopeId, Scopes};
use super::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Returned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `name = expression`
    Assign { target: String },
    /// `return [expression]`
    Return,
    /// A bare expression, usually a function call.
    Evaluate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub expression: Expression,
    anchor: Lexeme,
}

impl Statement {
    /// Classify the lexemes of one statement (terminator excluded).
    pub fn parse(mut lexemes: Vec<Lexeme>, anchor: Lexeme) -> Statement {
        let starts_assignment = lexemes.len() >= 2
            && lexemes[0].is(LexemeKind::Identifier)
            && lexemes[1].is(LexemeKind::Equals);
        let (kind, body) = if lexemes.first().is_some_and(|l| l.is_word("return")) {
            lexemes.remove(0);
            (StatementKind::Return, lexemes)
        } else if starts_assignment {
            let rest = lexemes.split_off(2);
            let target = lexemes.swap_remove(0).text;
            (StatementKind::Assign { target }, rest)
        } else {
            (StatementKind::Evaluate, lexemes)
        };
        Statement {
            kind,
            expression: Expression::new(body),
            anchor,
        }
    }

    fn execute(&self, scopes: &mut Scopes, scope: ScopeId) -> Result<Option<Token>> {
        trace!(statement = %self.expression, "executing");
        match &self.kind {
            StatementKind::Assign { target } => {
                let value = self.expression.evaluate(scopes, scope)?;
                scopes.set_variable(scope, target, value);
                Ok(None)
            }
            StatementKind::Return if self.expression.is_empty() => Ok(None),
            StatementKind::Return => self.expression.evaluate(scopes, scope).map(Some),
            StatementKind::Evaluate => {
                self.expression.evaluate(scopes, scope)?;
                Ok(None)
            }
        }
    }
}

/// Outcome of running a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptResult {
    pub status: Status,
    /// Every watched name, mapped to its final value if the script bound it.
    pub variables: BTreeMap<String, Option<Token>>,
    pub returned: Option<Token>,
    pub errors: Vec<Diagnostic>,
}

impl ScriptResult {
    pub fn into_result(self) -> Result<BTreeMap<String, Option<Token>>> {
        match self.errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(self.variables),
        }
    }
}

/// An ordered, immutable list of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    statements: Vec<Statement>,
}

impl Script {
    pub fn new(statements: Vec<Statement>) -> Self {
        Script { statements }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Parse `{ statement; statement; ... }`.
    pub fn parse(stream: &mut TokenStream) -> Result<Script> {
        stream.take(LexemeKind::LBrace)?;
        let mut statements = Vec::new();
        while stream.accept_kind(LexemeKind::RBrace).is_none() {
            let anchor = stream.peek(0).clone();
            let lexemes = stream.read_until(LexemeKind::Semicolon)?;
            stream.take(LexemeKind::Semicolon)?;
            if lexemes.is_empty() {
                continue;
            }
            statements.push(Statement::parse(lexemes, anchor));
        }
        Ok(Script { statements })
    }

    /// Run the script in a fresh shadow of `parent`.
    ///
    /// `arguments` are bound in the shadow before watching starts, so an
    /// argument named like a watched label is not reported unless the script
    /// assigns it. Every name in `watched` appears in the result. A failing statement is
    /// recorded, its assignment target receives `0`, and execution continues.
    pub fn execute(
        &self,
        scopes: &mut Scopes,
        parent: ScopeId,
        arguments: &[(String, Token)],
        watched: &[String],
    ) -> ScriptResult {
        let scope = scopes.shadow(parent);
        for (name, value) in arguments {
            scopes.set_variable(scope, name, value.clone());
        }
        let captured: Rc<RefCell<BTreeMap<String, Option<Token>>>> = Rc::new(RefCell::new(
            watched.iter().map(|name| (name.clone(), None)).collect(),
        ));
        let sink = Rc::clone(&captured);
        scopes.on_change(
            scope,
            Box::new(move |name, value, _reason| {
                if let Some(slot) = sink.borrow_mut().get_mut(name) {
                    *slot = Some(value.clone());
                }
            }),
        );

        let mut status = Status::Ok;
        let mut returned = None;
        let mut errors = Vec::new();
        for statement in &self.statements {
            match statement.execute(scopes, scope) {
                Ok(value) if statement.kind == StatementKind::Return => {
                    returned = value;
                    if status == Status::Ok {
                        status = Status::Returned;
                    }
                    break;
                }
                Ok(_) => {}
                Err(diag) => {
                    status = Status::Error;
                    errors.push(diag.located(&statement.anchor));
                    if let StatementKind::Assign { target } = &statement.kind {
                        scopes.set_variable(scope, target, Token::Integer(0));
                    }
                }
            }
        }
        scopes.discard(scope);

        let variables = captured.borrow().clone();
        ScriptResult {
            status,
            variables,
            returned,
            errors,
        }
    }
}
