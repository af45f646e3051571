//! Embedded expression and statement interpreter.
//!
//! Used for constructor bodies, `@var` directives and computed `$( ... )`
//! field values. Scopes live in an arena ([`Scopes`]); each script run gets
//! exactly one shadow scope that is discarded when the run ends.

pub mod builtins;
pub mod expression;
pub mod scope;
pub mod script;
pub mod token;

pub use expression::Expression;
pub use scope::{ChangeReason, Function, ScopeId, Scopes};
pub use script::{Script, ScriptResult, Statement, StatementKind, Status};
pub use token::Token;
