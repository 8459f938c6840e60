use std::fmt;

/// Byte range of a token in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Byte offset from start of the expression
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
}

impl SourceLocation {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Create a span from this location to another
    pub fn span_to(&self, other: &SourceLocation) -> SourceLocation {
        SourceLocation {
            offset: self.offset,
            length: other.end().saturating_sub(self.offset),
        }
    }
}

/// Token type enumeration - all possible tokens in PromQL
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(String),
    Duration(String),
    /// Quoted string, raw text including quotes
    String { raw: String, terminated: bool },

    // Identifiers and keywords (keywords are classified by the parser)
    Ident(String),

    // Punctuation
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    LeftParen,    // (
    RightParen,   // )
    Comma,        // ,
    Colon,        // :

    // Operators
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    Caret,    // ^
    EqEq,     // ==
    NotEq,    // !=
    LtEq,     // <=
    Lt,       // <
    GtEq,     // >=
    Gt,       // >
    Eq,       // =
    EqTilde,  // =~
    NotTilde, // !~

    /// A character that cannot start any token (e.g. a lone `!`)
    Invalid(char),

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Duration(d) => write!(f, "{}", d),
            TokenKind::String { raw, .. } => write!(f, "{}", raw),
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::EqTilde => write!(f, "=~"),
            TokenKind::NotTilde => write!(f, "!~"),
            TokenKind::Invalid(ch) => write!(f, "{}", ch),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its location in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    pub fn start(&self) -> usize {
        self.location.offset
    }

    pub fn end(&self) -> usize {
        self.location.end()
    }

    /// The identifier text, if this token is an identifier
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Check whether this is the identifier `keyword`, ignoring case
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.ident()
            .is_some_and(|name| name.eq_ignore_ascii_case(keyword))
    }
}
