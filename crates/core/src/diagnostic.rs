//! Structured compiler diagnostics.
//!
//! Every failure in the pipeline is a [`Diagnostic`]: a kind, a stable
//! `KDLnnn` reason code, a reason line, optional source position with the
//! offending source line, and free-form info lines. [`Diagnostic::report`]
//! renders them in a fixed order for terminals; [`Diagnostic::to_json_value`]
//! renders them for tooling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lexer::Lexeme;

/// Stable reason codes carried by diagnostics.
pub mod code {
    pub const UNRECOGNIZED_CHARACTER: &str = "KDL001";
    pub const UNTERMINATED_LITERAL: &str = "KDL002";
    pub const UNEXPECTED_TOKEN: &str = "KDL006";
    pub const UNRECOGNIZED_TYPE: &str = "KDL009";
    pub const UNKNOWN_FIELD: &str = "KDL013";
    pub const BAD_VALUE: &str = "KDL018";
    pub const ILLEGAL_VALUE: &str = "KDL021";
    pub const UNRECOGNIZED_SYMBOL: &str = "KDL035";
    pub const COUNTER_WITHOUT_LIST: &str = "KDL038";
    pub const UNRECOGNIZED_BINARY_TYPE: &str = "KDL039";
    pub const LIST_BRACKETING: &str = "KDL040";
    pub const MISSING_NESTED_TYPE: &str = "KDL045";
    pub const DUPLICATE_RESOURCE: &str = "KDL050";
    pub const DUPLICATE_DEFINITION: &str = "KDL051";
    pub const SOURCE_UNAVAILABLE: &str = "KDL060";
}

/// Classification of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed token in the source text.
    Lexical,
    /// An `ensure`/`expect` predicate failed at a known position.
    UnexpectedLexeme,
    /// Unknown function, variable, field, symbol or type name.
    UnresolvedSymbol,
    /// Identifier collision within a (container, type) pair.
    DuplicateResource,
    /// Illegal OCNT/LSTC/LSTE bracketing or a bad field-type name.
    MalformedTemplate,
    /// A type, field, template label or constructor declared twice.
    DuplicateDefinition,
    /// A value that does not fit the slot it is assigned to.
    InvalidValue,
    /// The source provider could not supply a file.
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::UnexpectedLexeme => "unexpected lexeme",
            ErrorKind::UnresolvedSymbol => "unresolved symbol",
            ErrorKind::DuplicateResource => "duplicate resource",
            ErrorKind::MalformedTemplate => "malformed template",
            ErrorKind::DuplicateDefinition => "duplicate definition",
            ErrorKind::InvalidValue => "invalid value",
            ErrorKind::Io => "source unavailable",
        }
    }

    fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Lexical => code::UNRECOGNIZED_CHARACTER,
            ErrorKind::UnexpectedLexeme => code::UNEXPECTED_TOKEN,
            ErrorKind::UnresolvedSymbol => code::UNRECOGNIZED_SYMBOL,
            ErrorKind::DuplicateResource => code::DUPLICATE_RESOURCE,
            ErrorKind::MalformedTemplate => code::UNRECOGNIZED_BINARY_TYPE,
            ErrorKind::DuplicateDefinition => code::DUPLICATE_DEFINITION,
            ErrorKind::InvalidValue => code::ILLEGAL_VALUE,
            ErrorKind::Io => code::SOURCE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a lexeme in its source file. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

/// A compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {reason}")]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub code: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            code: kind.default_code().to_owned(),
            reason: reason.into(),
            info: Vec::new(),
            location: None,
            source_line: None,
        }
    }

    /// A diagnostic positioned at `lexeme`, excerpting its source line.
    pub fn at(kind: ErrorKind, lexeme: &Lexeme, reason: impl Into<String>) -> Self {
        Diagnostic::new(kind, reason).located(lexeme)
    }

    /// The default failure of an expectation check.
    pub fn unexpected(lexeme: &Lexeme) -> Self {
        let found = if lexeme.text.is_empty() {
            lexeme.kind.describe().to_owned()
        } else {
            format!("'{}'", lexeme.text)
        };
        Diagnostic::at(
            ErrorKind::UnexpectedLexeme,
            lexeme,
            format!("unexpected {} encountered", found),
        )
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = code.to_owned();
        self
    }

    pub fn with_info(mut self, line: impl Into<String>) -> Self {
        self.info.push(line.into());
        self
    }

    /// Attach a position only if the diagnostic has none yet.
    pub fn located(mut self, lexeme: &Lexeme) -> Self {
        if self.location.is_none() {
            self.location = Some(lexeme.location());
            self.source_line = lexeme.source_line().map(str::to_owned);
        }
        self
    }

    /// Render the diagnostic: location header, reason, source excerpt,
    /// info lines.
    pub fn report(&self) -> String {
        let mut out = String::new();
        match &self.location {
            Some(loc) => out.push_str(&format!(
                "{}:{}:{}: error[{}]: {}\n",
                loc.file, loc.line, loc.column, self.code, self.kind
            )),
            None => out.push_str(&format!("error[{}]: {}\n", self.code, self.kind)),
        }
        out.push_str(&format!("    {}\n", self.reason));

        if let (Some(loc), Some(text)) = (&self.location, &self.source_line) {
            let gutter = loc.line.to_string();
            let pad = " ".repeat(gutter.len());
            let caret = " ".repeat(loc.column.saturating_sub(1) as usize);
            out.push_str(&format!("{} |\n", pad));
            out.push_str(&format!("{} | {}\n", gutter, text));
            out.push_str(&format!("{} | {}^\n", pad, caret));
        }

        for line in &self.info {
            out.push_str(&format!("    = {}\n", line));
        }
        out
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind":        self.kind,
            "code":        self.code,
            "reason":      self.reason,
            "info":        self.info,
            "file":        self.location.as_ref().map(|l| l.file.clone()),
            "line":        self.location.as_ref().map(|l| l.line),
            "column":      self.location.as_ref().map(|l| l.column),
            "source_line": self.source_line,
        })
    }
}

impl From<std::io::Error> for Diagnostic {
    fn from(err: std::io::Error) -> Self {
        Diagnostic::new(ErrorKind::Io, err.to_string())
    }
}

/// Result alias used throughout the compiler.
pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    #[test]
    fn report_orders_header_reason_excerpt_info() {
        let lexemes = lex("type Foo\n  : bad;", "demo.kdl").unwrap();
        let colon = &lexemes[2];
        let diag = Diagnostic::at(ErrorKind::UnexpectedLexeme, colon, "expected '{'")
            .with_info("while parsing type 'Foo'");
        let report = diag.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "demo.kdl:2:3: error[KDL006]: unexpected lexeme");
        assert_eq!(lines[1], "    expected '{'");
        assert_eq!(lines[2], "  |");
        assert_eq!(lines[3], "2 |   : bad;");
        assert_eq!(lines[4], "  |   ^");
        assert_eq!(lines[5], "    = while parsing type 'Foo'");
    }

    #[test]
    fn report_without_location_has_no_excerpt() {
        let diag = Diagnostic::new(ErrorKind::DuplicateResource, "resource #128 exists");
        assert_eq!(
            diag.report(),
            "error[KDL050]: duplicate resource\n    resource #128 exists\n"
        );
    }

    #[test]
    fn located_keeps_first_position() {
        let lexemes = lex("a b", "x.kdl").unwrap();
        let diag = Diagnostic::at(ErrorKind::InvalidValue, &lexemes[0], "bad").located(&lexemes[1]);
        assert_eq!(diag.location.unwrap().column, 1);
    }

    #[test]
    fn json_value_has_stable_fields() {
        let diag = Diagnostic::new(ErrorKind::MalformedTemplate, "oops")
            .with_code(code::COUNTER_WITHOUT_LIST);
        let json = diag.to_json_value();
        assert_eq!(json["kind"], "malformed_template");
        assert_eq!(json["code"], "KDL038");
        assert!(json["line"].is_null());
    }
}
