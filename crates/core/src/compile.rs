//! Compile driver: source files in, populated and encoded [`Project`] out.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CompileOptions;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::interpreter::{builtins, Scopes};
use crate::lexer::lex;
use crate::parser::Parser;
use crate::project::Project;
use crate::source::{InMemoryProvider, SourceProvider};
use crate::stream::TokenStream;

/// Name given to the buffer compiled by [`compile_str`].
pub const INLINE_SOURCE: &str = "<input>.kdl";

/// Mutable state of one compilation, threaded through the parser.
pub(crate) struct Session<'p> {
    provider: &'p dyn SourceProvider,
    pub(crate) options: CompileOptions,
    pub(crate) project: Project,
    pub(crate) scopes: Scopes,
    /// Unit receiving declarations; changed by `@out`.
    pub(crate) unit: String,
    visited: HashSet<PathBuf>,
    stack: Vec<PathBuf>,
}

impl<'p> Session<'p> {
    fn new(provider: &'p dyn SourceProvider, options: CompileOptions) -> Self {
        let mut scopes = Scopes::new();
        builtins::install(&mut scopes);
        let project = Project::with_format(options.format);
        Session {
            provider,
            unit: options.default_unit.clone(),
            options,
            project,
            scopes,
            visited: HashSet::new(),
            stack: Vec::new(),
        }
    }

    pub(crate) fn provider(&self) -> &'p dyn SourceProvider {
        self.provider
    }

    /// Lex and parse `path`. `@import` re-enters here; a file already on the
    /// import stack is a cycle, a file compiled earlier is skipped.
    pub(crate) fn compile_file(&mut self, path: &Path) -> Result<()> {
        let canonical = self
            .provider
            .canonicalize(path)
            .map_err(|e| unavailable(path, e))?;

        if self.stack.contains(&canonical) {
            let mut cycle: Vec<String> = self
                .stack
                .iter()
                .skip_while(|p| **p != canonical)
                .map(|p| p.display().to_string())
                .collect();
            cycle.push(canonical.display().to_string());
            return Err(Diagnostic::new(
                ErrorKind::DuplicateDefinition,
                format!("import cycle detected at '{}'", path.display()),
            )
            .with_info(cycle.join(" -> ")));
        }
        if !self.visited.insert(canonical.clone()) {
            debug!(file = %path.display(), "already compiled, skipping import");
            return Ok(());
        }

        let text = self
            .provider
            .read_source(path)
            .map_err(|e| unavailable(path, e))?;
        let lexemes = lex(&text, &path.to_string_lossy())?;
        debug!(file = %path.display(), lexemes = lexemes.len(), "lexed source");

        self.stack.push(canonical);
        let parsed = Parser::new(TokenStream::new(lexemes), self, path).parse();
        self.stack.pop();
        parsed
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Io,
        format!("cannot read '{}': {}", path.display(), err),
    )
    .with_code(code::SOURCE_UNAVAILABLE)
}

/// Compile the file at `path` and everything it imports, then encode every
/// declared resource.
pub fn compile(
    path: impl AsRef<Path>,
    provider: &dyn SourceProvider,
    options: CompileOptions,
) -> Result<Project> {
    let mut session = Session::new(provider, options);
    session.compile_file(path.as_ref())?;
    let mut project = session.project;
    let encoded = project.encode()?;
    debug!(resources = encoded, units = project.units().count(), "compilation finished");
    Ok(project)
}

/// Compile a single in-memory buffer. Imports are unavailable.
pub fn compile_str(source: &str, options: CompileOptions) -> Result<Project> {
    let provider = InMemoryProvider::new().with_file(INLINE_SOURCE, source);
    compile(INLINE_SOURCE, &provider, options)
}
