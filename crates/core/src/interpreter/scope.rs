//! Arena of lexical scopes.
//!
//! Scopes live in a single [`Scopes`] arena and refer to their parent by
//! index. Shadow scopes are pushed for one evaluation and discarded in LIFO
//! order, so nothing bound in a shadow can outlive it or leak into its
//! parent.

use std::collections::HashMap;

use crate::hash::hash_name;

use super::token::Token;

/// Index of a scope in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Create,
    Update,
}

/// Called with the variable name and new value on every create or update.
pub type ChangeCallback = Box<dyn FnMut(&str, &Token, ChangeReason)>;

/// Signature of a native function.
pub type NativeFunction = fn(&[Token]) -> Result<Token, String>;

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub value: Token,
}

#[derive(Clone)]
pub struct Function {
    pub name: String,
    /// Exact argument count, or `None` for variadic functions.
    pub arity: Option<usize>,
    pub body: NativeFunction,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Why a call could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Unknown,
    Arity { expected: usize, found: usize },
    Failed(String),
}

#[derive(Default)]
struct Frame {
    parent: Option<ScopeId>,
    variables: HashMap<u64, Variable>,
    functions: HashMap<u64, Function>,
    on_change: Option<ChangeCallback>,
}

pub struct Scopes {
    frames: Vec<Frame>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    /// An arena holding one empty root scope.
    pub fn new() -> Self {
        Scopes {
            frames: vec![Frame::default()],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Number of live scopes, root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a child of `parent`.
    pub fn shadow(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(Frame {
            parent: Some(parent),
            ..Frame::default()
        });
        ScopeId(self.frames.len() - 1)
    }

    /// Drop `scope` and every scope pushed after it. The root is never
    /// discarded.
    pub fn discard(&mut self, scope: ScopeId) {
        self.frames.truncate(scope.0.max(1));
    }

    pub fn on_change(&mut self, scope: ScopeId, callback: ChangeCallback) {
        self.frames[scope.0].on_change = Some(callback);
    }

    /// Bind `name` in `scope` only if it is not already bound there.
    pub fn add_variable(&mut self, scope: ScopeId, name: &str, value: Token) -> bool {
        let key = hash_name(name);
        if self.frames[scope.0].variables.contains_key(&key) {
            return false;
        }
        self.set_variable(scope, name, value);
        true
    }

    /// Create or update `name` in `scope` itself. Parent scopes are never
    /// written.
    pub fn set_variable(&mut self, scope: ScopeId, name: &str, value: Token) {
        let frame = &mut self.frames[scope.0];
        let key = hash_name(name);
        let reason = match frame.variables.get_mut(&key) {
            Some(existing) => {
                existing.value = value.clone();
                ChangeReason::Update
            }
            None => {
                frame.variables.insert(
                    key,
                    Variable {
                        name: name.to_owned(),
                        value: value.clone(),
                    },
                );
                ChangeReason::Create
            }
        };
        if let Some(callback) = frame.on_change.as_mut() {
            callback(name, &value, reason);
        }
    }

    /// Resolve `name` from `scope` towards the root.
    pub fn variable(&self, scope: ScopeId, name: &str) -> Option<&Token> {
        let key = hash_name(name);
        self.chain(scope)
            .find_map(|frame| frame.variables.get(&key).filter(|v| v.name == name))
            .map(|v| &v.value)
    }

    pub fn add_function(&mut self, scope: ScopeId, function: Function) {
        let key = hash_name(&function.name);
        self.frames[scope.0].functions.insert(key, function);
    }

    pub fn function(&self, scope: ScopeId, name: &str) -> Option<&Function> {
        let key = hash_name(name);
        self.chain(scope)
            .find_map(|frame| frame.functions.get(&key).filter(|f| f.name == name))
    }

    pub fn call(
        &self,
        scope: ScopeId,
        name: &str,
        arguments: &[Token],
    ) -> Result<Token, CallError> {
        let function = self.function(scope, name).ok_or(CallError::Unknown)?;
        if let Some(expected) = function.arity {
            if expected != arguments.len() {
                return Err(CallError::Arity {
                    expected,
                    found: arguments.len(),
                });
            }
        }
        (function.body)(arguments).map_err(CallError::Failed)
    }

    fn chain(&self, scope: ScopeId) -> impl Iterator<Item = &Frame> {
        std::iter::successors(Some(scope), |id| self.frames[id.0].parent)
            .map(|id| &self.frames[id.0])
    }
}
