//! Composable predicates over a single lexeme.

use crate::diagnostic::Diagnostic;
use crate::lexer::{Lexeme, LexemeKind};

/// Builds the diagnostic raised when an expectation fails inside `ensure`.
pub type FailureHandler = fn(&Lexeme) -> Diagnostic;

/// A predicate on one lexeme: an optional required kind and/or a set of
/// acceptable texts, evaluated with a polarity.
///
/// An `optional` expectation may be absent: when it does not hold,
/// [`TokenStream::expect`](crate::stream::TokenStream::expect) and
/// [`TokenStream::ensure`](crate::stream::TokenStream::ensure) skip it and
/// test the next expectation against the same lexeme.
#[derive(Clone, Copy)]
pub struct Expectation<'a> {
    kind: Option<LexemeKind>,
    texts: &'a [&'a str],
    polarity: bool,
    optional: bool,
    on_failure: Option<FailureHandler>,
}

impl<'a> Expectation<'a> {
    pub fn kind(kind: LexemeKind) -> Self {
        Expectation {
            kind: Some(kind),
            texts: &[],
            polarity: true,
            optional: false,
            on_failure: None,
        }
    }

    /// Any lexeme whose text is one of `texts`.
    pub fn any_text(texts: &'a [&'a str]) -> Self {
        Expectation {
            kind: None,
            texts,
            polarity: true,
            optional: false,
            on_failure: None,
        }
    }

    /// A lexeme of `kind` whose text is one of `texts`.
    pub fn kind_with(kind: LexemeKind, texts: &'a [&'a str]) -> Self {
        Expectation {
            kind: Some(kind),
            texts,
            polarity: true,
            optional: false,
            on_failure: None,
        }
    }

    /// Evaluate with the given polarity: `be(false)` inverts the predicate.
    pub fn be(mut self, polarity: bool) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn on_failure(mut self, handler: FailureHandler) -> Self {
        self.on_failure = Some(handler);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn matches(&self, lexeme: &Lexeme) -> bool {
        let kind_ok = self.kind.map_or(true, |k| lexeme.kind == k);
        let text_ok = self.texts.is_empty() || self.texts.contains(&lexeme.text.as_str());
        (kind_ok && text_ok) == self.polarity
    }

    pub fn failure(&self, lexeme: &Lexeme) -> Diagnostic {
        match self.on_failure {
            Some(handler) => handler(lexeme),
            None => {
                let mut diag = Diagnostic::unexpected(lexeme);
                if let Some(wanted) = self.describe() {
                    diag.reason = format!("{}; expected {}", diag.reason, wanted);
                }
                diag
            }
        }
    }

    fn describe(&self) -> Option<String> {
        let what = match (self.kind, self.texts) {
            (_, texts) if !texts.is_empty() => texts
                .iter()
                .map(|t| format!("'{}'", t))
                .collect::<Vec<_>>()
                .join(" or "),
            (Some(kind), _) => kind.describe().to_owned(),
            (None, _) => return None,
        };
        Some(if self.polarity {
            what
        } else {
            format!("anything but {}", what)
        })
    }
}
