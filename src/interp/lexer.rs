//! Lexer: tokenizes script source
//!
//! Produces the token stream the parser consumes. Handles numbers, string
//! literals in single or double quotes, identifiers, keywords, operators,
//! and `#` line comments.

use crate::interp::ScriptError;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The raw text of the token (unescaped content for strings)
    pub text: String,
    /// Line number (1-based)
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }
}

/// Token types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Literals and identifiers
    Int,
    Float,
    Str,
    Ident,

    // Keywords
    Fn,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    True,
    False,
    Nil,
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Structural
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,

    // End of input
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Int => "integer",
            Self::Float => "number",
            Self::Str => "string literal",
            Self::Ident => "identifier",
            Self::Fn => "fn",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::For => "for",
            Self::In => "in",
            Self::Return => "return",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::True => "true",
            Self::False => "false",
            Self::Nil => "nil",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Assign => "=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Lexer for script source
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line));
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ScriptError> {
        let ch = self.input[self.pos];
        let line = self.line;

        match ch {
            '(' => self.single(TokenKind::LParen, "("),
            ')' => self.single(TokenKind::RParen, ")"),
            '{' => self.single(TokenKind::LBrace, "{"),
            '}' => self.single(TokenKind::RBrace, "}"),
            '[' => self.single(TokenKind::LBracket, "["),
            ']' => self.single(TokenKind::RBracket, "]"),
            ',' => self.single(TokenKind::Comma, ","),
            ';' => self.single(TokenKind::Semicolon, ";"),
            '+' => self.single(TokenKind::Plus, "+"),
            '-' => self.single(TokenKind::Minus, "-"),
            '*' => self.single(TokenKind::Star, "*"),
            '/' => self.single(TokenKind::Slash, "/"),
            '%' => self.single(TokenKind::Percent, "%"),
            '=' => {
                if self.peek_at(1) == Some('=') {
                    self.advance();
                    self.single(TokenKind::Eq, "==")
                } else {
                    self.single(TokenKind::Assign, "=")
                }
            }
            '!' => {
                if self.peek_at(1) == Some('=') {
                    self.advance();
                    self.single(TokenKind::Ne, "!=")
                } else {
                    Err(ScriptError::parse(line, "unexpected character: '!'"))
                }
            }
            '<' => {
                if self.peek_at(1) == Some('=') {
                    self.advance();
                    self.single(TokenKind::Le, "<=")
                } else {
                    self.single(TokenKind::Lt, "<")
                }
            }
            '>' => {
                if self.peek_at(1) == Some('=') {
                    self.advance();
                    self.single(TokenKind::Ge, ">=")
                } else {
                    self.single(TokenKind::Gt, ">")
                }
            }
            '\'' | '"' => self.read_string_literal(ch),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier_or_keyword()),
            other => Err(ScriptError::parse(
                line,
                format!("unexpected character: '{}'", other),
            )),
        }
    }

    fn single(&mut self, kind: TokenKind, text: &str) -> Result<Token, ScriptError> {
        let line = self.line;
        self.advance();
        Ok(Token::new(kind, text, line))
    }

    fn read_string_literal(&mut self, quote: char) -> Result<Token, ScriptError> {
        let line = self.line;
        self.advance(); // skip opening quote

        let mut text = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(ScriptError::parse(line, "unterminated string literal"));
            };
            if ch == quote {
                break;
            }
            if ch == '\n' {
                return Err(ScriptError::parse(line, "unterminated string literal"));
            }
            if ch == '\\' {
                self.advance();
                let Some(escaped) = self.peek() else {
                    return Err(ScriptError::parse(line, "unterminated string literal"));
                };
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    other => {
                        return Err(ScriptError::parse(
                            self.line,
                            format!("unknown escape: '\\{}'", other),
                        ))
                    }
                }
                self.advance();
            } else {
                text.push(ch);
                self.advance();
            }
        }

        self.advance(); // skip closing quote
        Ok(Token::new(TokenKind::Str, text, line))
    }

    fn read_number(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // A dot followed by a digit continues into a float literal.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            return Ok(Token::new(TokenKind::Float, text, line));
        }

        Ok(Token::new(TokenKind::Int, text, line))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let line = self.line;
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match text.as_str() {
            "fn" => TokenKind::Fn,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Ident,
        };

        Token::new(kind, text, line)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.peek() {
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

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            if self.input[self.pos] == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}
