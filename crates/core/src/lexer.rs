use std::fmt;
use std::rc::Rc;

use crate::diagnostic::{code, Diagnostic, ErrorKind, Result, SourceLocation};

/// A source file held in memory for the duration of one compilation.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        SourceFile {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Text of the 1-based `line`, without its terminator.
    pub fn line(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        self.text.lines().nth(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexemeKind {
    /// Identifiers and keywords, including dotted paths such as `Ns.Type`.
    Identifier,
    /// Decimal or `0x` hexadecimal integer; text is kept as written.
    Integer,
    /// Quoted string; text is the content with escapes resolved.
    String,
    /// `#...` resource reference; text excludes the `#`.
    Reference,
    /// `$name`; text excludes the `$`.
    Variable,
    /// `@name`; text excludes the `@`.
    Directive,
    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LAngle,
    RAngle,
    Comma,
    Semicolon,
    Colon,
    Equals,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Bang,
    ShiftLeft,
    ShiftRight,
    // End of input
    Eof,
}

impl LexemeKind {
    pub fn describe(self) -> &'static str {
        match self {
            LexemeKind::Identifier => "identifier",
            LexemeKind::Integer => "integer",
            LexemeKind::String => "string",
            LexemeKind::Reference => "resource reference",
            LexemeKind::Variable => "variable",
            LexemeKind::Directive => "directive",
            LexemeKind::LBrace => "'{'",
            LexemeKind::RBrace => "'}'",
            LexemeKind::LParen => "'('",
            LexemeKind::RParen => "')'",
            LexemeKind::LBracket => "'['",
            LexemeKind::RBracket => "']'",
            LexemeKind::LAngle => "'<'",
            LexemeKind::RAngle => "'>'",
            LexemeKind::Comma => "','",
            LexemeKind::Semicolon => "';'",
            LexemeKind::Colon => "':'",
            LexemeKind::Equals => "'='",
            LexemeKind::Plus => "'+'",
            LexemeKind::Minus => "'-'",
            LexemeKind::Star => "'*'",
            LexemeKind::Slash => "'/'",
            LexemeKind::Percent => "'%'",
            LexemeKind::Ampersand => "'&'",
            LexemeKind::Pipe => "'|'",
            LexemeKind::Caret => "'^'",
            LexemeKind::Tilde => "'~'",
            LexemeKind::Bang => "'!'",
            LexemeKind::ShiftLeft => "'<<'",
            LexemeKind::ShiftRight => "'>>'",
            LexemeKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for LexemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// One positioned token. Never mutated after the lexer produces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
    source: Rc<SourceFile>,
}

impl Lexeme {
    pub fn is(&self, kind: LexemeKind) -> bool {
        self.kind == kind
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == LexemeKind::Identifier && self.text == word
    }

    pub fn file(&self) -> &str {
        &self.source.path
    }

    pub fn source_line(&self) -> Option<&str> {
        self.source.line(self.line)
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            file: self.source.path.clone(),
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    /// Value of an integer lexeme.
    pub fn integer(&self) -> Result<i64> {
        parse_integer(&self.text).ok_or_else(|| {
            Diagnostic::at(
                ErrorKind::Lexical,
                self,
                format!("invalid integer literal '{}'", self.text),
            )
        })
    }
}

/// Parse a decimal or `0x` hexadecimal literal, with an optional sign.
pub fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"));
    let magnitude = match hex {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok().or_else(|| {
            // Hex literals may spell out a full 64-bit pattern.
            hex.is_some().then_some(magnitude as i64)
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split `text` into lexemes. Comments and whitespace are dropped; the
/// returned sequence always ends with an [`LexemeKind::Eof`] lexeme.
pub fn lex(text: &str, path: &str) -> Result<Vec<Lexeme>> {
    lex_source(Rc::new(SourceFile::new(path, text)))
}

pub fn lex_source(source: Rc<SourceFile>) -> Result<Vec<Lexeme>> {
    let chars: Vec<(usize, char)> = source.text.char_indices().collect();
    let end_offset = source.text.len();
    let mut lexemes = Vec::new();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut line_start = 0usize;

    let at = |pos: usize| chars.get(pos).map(|&(_, c)| c);

    let error = |kind_code: &str, line: u32, column: u32, offset: usize, reason: String| {
        let mut diag = Diagnostic::new(ErrorKind::Lexical, reason).with_code(kind_code);
        diag.location = Some(SourceLocation {
            file: source.path.clone(),
            line,
            column,
            offset,
        });
        diag.source_line = source.line(line).map(str::to_owned);
        diag
    };

    while pos < chars.len() {
        let (offset, c) = chars[pos];
        let column = (pos - line_start) as u32 + 1;

        // Line comment
        if c == '/' && at(pos + 1) == Some('/') {
            while pos < chars.len() && chars[pos].1 != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && at(pos + 1) == Some('*') {
            pos += 2;
            loop {
                match at(pos) {
                    None => {
                        return Err(error(
                            code::UNTERMINATED_LITERAL,
                            line,
                            column,
                            offset,
                            "unterminated block comment".into(),
                        ))
                    }
                    Some('*') if at(pos + 1) == Some('/') => {
                        pos += 2;
                        break;
                    }
                    Some('\n') => {
                        pos += 1;
                        line += 1;
                        line_start = pos;
                    }
                    Some(_) => pos += 1,
                }
            }
            continue;
        }

        if c.is_whitespace() {
            pos += 1;
            if c == '\n' {
                line += 1;
                line_start = pos;
            }
            continue;
        }

        let mut push = |kind: LexemeKind, text: String| {
            lexemes.push(Lexeme {
                kind,
                text,
                line,
                column,
                offset,
                source: Rc::clone(&source),
            });
        };

        // String literal
        if c == '"' {
            pos += 1;
            let mut s = String::new();
            loop {
                match at(pos) {
                    None | Some('\n') => {
                        return Err(error(
                            code::UNTERMINATED_LITERAL,
                            line,
                            column,
                            offset,
                            "unterminated string literal".into(),
                        ))
                    }
                    Some('"') => {
                        pos += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = match at(pos + 1) {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('r') => '\r',
                            Some('0') => '\0',
                            Some('"') => '"',
                            Some('\\') => '\\',
                            other => {
                                return Err(error(
                                    code::UNRECOGNIZED_CHARACTER,
                                    line,
                                    column,
                                    offset,
                                    format!(
                                        "invalid escape sequence '\\{}'",
                                        other.map(String::from).unwrap_or_default()
                                    ),
                                ))
                            }
                        };
                        s.push(escaped);
                        pos += 2;
                    }
                    Some(sc) => {
                        s.push(sc);
                        pos += 1;
                    }
                }
            }
            push(LexemeKind::String, s);
            continue;
        }

        // Integer
        if c.is_ascii_digit() {
            let start = pos;
            if c == '0' && matches!(at(pos + 1), Some('x') | Some('X')) {
                pos += 2;
                while at(pos).is_some_and(|h| h.is_ascii_hexdigit()) {
                    pos += 1;
                }
            } else {
                while at(pos).is_some_and(|d| d.is_ascii_digit()) {
                    pos += 1;
                }
            }
            if at(pos).is_some_and(is_ident_continue) {
                return Err(error(
                    code::UNRECOGNIZED_CHARACTER,
                    line,
                    column,
                    offset,
                    "malformed integer literal".into(),
                ));
            }
            let text: String = chars[start..pos].iter().map(|&(_, ch)| ch).collect();
            if parse_integer(&text).is_none() {
                return Err(error(
                    code::BAD_VALUE,
                    line,
                    column,
                    offset,
                    format!("integer literal '{}' does not fit in 64 bits", text),
                ));
            }
            push(LexemeKind::Integer, text);
            continue;
        }

        // Identifier or dotted identifier path
        if is_ident_start(c) {
            let start = pos;
            loop {
                while at(pos).is_some_and(is_ident_continue) {
                    pos += 1;
                }
                if at(pos) == Some('.') && at(pos + 1).is_some_and(is_ident_start) {
                    pos += 1;
                    continue;
                }
                break;
            }
            let text: String = chars[start..pos].iter().map(|&(_, ch)| ch).collect();
            push(LexemeKind::Identifier, text);
            continue;
        }

        // Sigil-prefixed lexemes
        if matches!(c, '#' | '$' | '@') {
            let start = pos + 1;
            pos = start;
            let body_char = |ch: char| -> bool {
                if c == '#' {
                    is_ident_continue(ch) || ch == '.' || ch == '-'
                } else {
                    is_ident_continue(ch)
                }
            };
            while at(pos).is_some_and(body_char) {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().map(|&(_, ch)| ch).collect();
            let kind = match c {
                '#' => LexemeKind::Reference,
                '$' => LexemeKind::Variable,
                _ => LexemeKind::Directive,
            };
            // `$(` introduces an inline expression and carries no name.
            if text.is_empty() && !(c == '$' && at(pos) == Some('(')) {
                return Err(error(
                    code::UNRECOGNIZED_CHARACTER,
                    line,
                    column,
                    offset,
                    format!("expected a name after '{}'", c),
                ));
            }
            push(kind, text);
            continue;
        }

        let (kind, width) = match (c, at(pos + 1)) {
            ('<', Some('<')) => (LexemeKind::ShiftLeft, 2),
            ('>', Some('>')) => (LexemeKind::ShiftRight, 2),
            ('{', _) => (LexemeKind::LBrace, 1),
            ('}', _) => (LexemeKind::RBrace, 1),
            ('(', _) => (LexemeKind::LParen, 1),
            (')', _) => (LexemeKind::RParen, 1),
            ('[', _) => (LexemeKind::LBracket, 1),
            (']', _) => (LexemeKind::RBracket, 1),
            ('<', _) => (LexemeKind::LAngle, 1),
            ('>', _) => (LexemeKind::RAngle, 1),
            (',', _) => (LexemeKind::Comma, 1),
            (';', _) => (LexemeKind::Semicolon, 1),
            (':', _) => (LexemeKind::Colon, 1),
            ('=', _) => (LexemeKind::Equals, 1),
            ('+', _) => (LexemeKind::Plus, 1),
            ('-', _) => (LexemeKind::Minus, 1),
            ('*', _) => (LexemeKind::Star, 1),
            ('/', _) => (LexemeKind::Slash, 1),
            ('%', _) => (LexemeKind::Percent, 1),
            ('&', _) => (LexemeKind::Ampersand, 1),
            ('|', _) => (LexemeKind::Pipe, 1),
            ('^', _) => (LexemeKind::Caret, 1),
            ('~', _) => (LexemeKind::Tilde, 1),
            ('!', _) => (LexemeKind::Bang, 1),
            (other, _) => {
                return Err(error(
                    code::UNRECOGNIZED_CHARACTER,
                    line,
                    column,
                    offset,
                    format!("unexpected character '{}'", other),
                ))
            }
        };
        let text: String = chars[pos..pos + width].iter().map(|&(_, ch)| ch).collect();
        push(kind, text);
        pos += width;
    }

    let column = (chars.len() - line_start) as u32 + 1;
    lexemes.push(Lexeme {
        kind: LexemeKind::Eof,
        text: String::new(),
        line,
        column,
        offset: end_offset,
        source,
    });
    Ok(lexemes)
}
