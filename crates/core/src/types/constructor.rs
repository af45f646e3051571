use std::collections::BTreeMap;

use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::interpreter::{ScopeId, Scopes, Script, Token};

use super::binary_template::BinaryTemplate;
use super::decorator::Decorators;

/// A parameterised script that synthesises field values.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConstructor {
    pub parameters: Vec<String>,
    pub script: Script,
    pub decorators: Decorators,
}

impl TypeConstructor {
    pub fn new(parameters: Vec<String>, script: Script) -> Self {
        TypeConstructor {
            parameters,
            script,
            decorators: Decorators::default(),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Run the constructor with `arguments` bound to its parameters.
    ///
    /// Every top-level label of `template` is watched; the returned map has
    /// exactly those keys, `None` for labels the script never assigned.
    pub fn execute(
        &self,
        scopes: &mut Scopes,
        scope: ScopeId,
        arguments: &[Token],
        template: &BinaryTemplate,
    ) -> Result<BTreeMap<String, Option<Token>>> {
        if arguments.len() != self.arity() {
            return Err(Diagnostic::new(
                ErrorKind::InvalidValue,
                format!(
                    "constructor takes {} argument(s) but {} were given",
                    self.arity(),
                    arguments.len()
                ),
            ));
        }
        let bound: Vec<(String, Token)> = self
            .parameters
            .iter()
            .cloned()
            .zip(arguments.iter().cloned())
            .collect();
        self.script
            .execute(scopes, scope, &bound, &template.labels())
            .into_result()
    }
}
