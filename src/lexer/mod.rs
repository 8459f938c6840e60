//! Lexer (tokenizer) for PromQL expressions.
//!
//! Converts source text into a stream of [`token::Token`]s for the parser.
//! Lexing never fails: characters that cannot start a token are emitted as
//! [`TokenKind::Invalid`] so the parser can turn them into error nodes.

pub mod token;

use token::{SourceLocation, Token, TokenKind};

/// Units accepted in a duration literal, longest first
const DURATION_UNITS: [&str; 7] = ["ms", "s", "m", "h", "d", "w", "y"];

/// Lexer for PromQL expressions
pub struct Lexer<'a> {
    /// Source code being lexed
    source: &'a str,
    /// Characters for iteration
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// Current position in bytes
    position: usize,
    /// Start position of current token
    token_start: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given expression
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            position: 0,
            token_start: 0,
        }
    }

    /// Get the source code
    pub fn source(&self) -> &str {
        self.source
    }

    /// Tokenize the entire source; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.token_start = self.position;

        let Some(ch) = self.peek_char() else {
            return self.make_token(TokenKind::Eof);
        };

        match ch {
            'a'..='z' | 'A'..='Z' | '_' => self.lex_identifier(),
            '0'..='9' => self.lex_number_or_duration(),
            '.' if matches!(self.peek_char_at(1), Some(c) if c.is_ascii_digit()) => {
                self.lex_number_or_duration()
            }
            '"' | '\'' | '`' => self.lex_string(ch),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '^' => self.single(TokenKind::Caret),
            '=' => match self.peek_char_at(1) {
                Some('=') => self.double(TokenKind::EqEq),
                Some('~') => self.double(TokenKind::EqTilde),
                _ => self.single(TokenKind::Eq),
            },
            '!' => match self.peek_char_at(1) {
                Some('=') => self.double(TokenKind::NotEq),
                Some('~') => self.double(TokenKind::NotTilde),
                _ => self.single(TokenKind::Invalid('!')),
            },
            '<' => match self.peek_char_at(1) {
                Some('=') => self.double(TokenKind::LtEq),
                _ => self.single(TokenKind::Lt),
            },
            '>' => match self.peek_char_at(1) {
                Some('=') => self.double(TokenKind::GtEq),
                _ => self.single(TokenKind::Gt),
            },
            other => self.single(TokenKind::Invalid(other)),
        }
    }

    /// Peek at the current character without consuming it
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// Peek at a character at offset from current position
    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.source[self.position..].chars().nth(offset)
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.position = pos + ch.len_utf8();
        Some(ch)
    }

    /// Advance until the byte position reaches `end`
    fn advance_to(&mut self, end: usize) {
        while self.position < end {
            if self.advance().is_none() {
                break;
            }
        }
    }

    /// Skip whitespace and `#` line comments
    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        self.advance();
        self.make_token(kind)
    }

    fn double(&mut self, kind: TokenKind) -> Token {
        self.advance();
        self.advance();
        self.make_token(kind)
    }

    /// Lex an identifier; metric names may contain colons
    fn lex_identifier(&mut self) -> Token {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[self.token_start..self.position];
        self.make_token(TokenKind::Ident(text.to_string()))
    }

    /// Lex a number literal, or a duration such as `5m` or `1h30m`
    fn lex_number_or_duration(&mut self) -> Token {
        if let Some(end) = scan_duration(self.source, self.token_start) {
            self.advance_to(end);
            let text = &self.source[self.token_start..self.position];
            return self.make_token(TokenKind::Duration(text.to_string()));
        }

        if self.peek_char() == Some('0') && matches!(self.peek_char_at(1), Some('x' | 'X')) {
            self.advance();
            self.advance();
            while matches!(self.peek_char(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
        } else {
            self.consume_digits();
            if self.peek_char() == Some('.') {
                self.advance();
                self.consume_digits();
            }
            if matches!(self.peek_char(), Some('e' | 'E')) {
                let sign = matches!(self.peek_char_at(1), Some('+' | '-'));
                let digit_at = if sign { 2 } else { 1 };
                if matches!(self.peek_char_at(digit_at), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                    if sign {
                        self.advance();
                    }
                    self.consume_digits();
                }
            }
        }

        let text = &self.source[self.token_start..self.position];
        self.make_token(TokenKind::Number(text.to_string()))
    }

    fn consume_digits(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Lex a quoted string; an unterminated string runs to the end of input
    fn lex_string(&mut self, quote: char) -> Token {
        self.advance(); // opening quote
        let mut terminated = false;

        while let Some(ch) = self.advance() {
            if ch == '\\' && quote != '`' {
                self.advance();
            } else if ch == quote {
                terminated = true;
                break;
            }
        }

        let raw = self.source[self.token_start..self.position].to_string();
        self.make_token(TokenKind::String { raw, terminated })
    }

    /// Create a token from the current token start to the current position
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            SourceLocation::new(self.token_start, self.position - self.token_start),
        )
    }
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == ':'
}

/// Return the end of a duration literal starting at `start`, if there is one
fn scan_duration(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = start;
    let mut parts = 0;

    loop {
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            break;
        }
        let unit = DURATION_UNITS
            .iter()
            .find(|unit| source[i..].starts_with(*unit));
        match unit {
            Some(unit) => {
                i += unit.len();
                parts += 1;
            }
            None => {
                i = digits_start;
                break;
            }
        }
    }

    if parts == 0 {
        return None;
    }
    match source[i..].chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => Some(i),
    }
}
