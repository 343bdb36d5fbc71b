use crate::diagnostics::{Diagnostic, ErrorKind};

/// Fixed reserved-word set of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Fn,
    If,
    Else,
    While,
    For,
    In,
    Range,
    Return,
    Break,
    Continue,
    Import,
    True,
    False,
    Null,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    /// Generic single-character operator: one of `+ - * / % < > ! =`.
    /// The parser, not the lexer, decides what an `=` means.
    Op(char),
    EqEq,
    NotEq,
    LessEq,
    GreaterEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Eof,
}

impl TokenKind {
    /// Short human-readable form used in parser diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(_) => "integer literal".into(),
            TokenKind::Float(_) => "float literal".into(),
            TokenKind::Str(_) => "string literal".into(),
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Keyword(kw) => format!("keyword `{}`", kw.as_str()),
            TokenKind::Op(ch) => format!("`{ch}`"),
            TokenKind::EqEq => "`==`".into(),
            TokenKind::NotEq => "`!=`".into(),
            TokenKind::LessEq => "`<=`".into(),
            TokenKind::GreaterEq => "`>=`".into(),
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::LBrace => "`{`".into(),
            TokenKind::RBrace => "`}`".into(),
            TokenKind::LBracket => "`[`".into(),
            TokenKind::RBracket => "`]`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::Semicolon => "`;`".into(),
            TokenKind::Colon => "`:`".into(),
            TokenKind::Dot => "`.`".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::Fn => "fn",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Range => "range",
            Keyword::Return => "return",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Import => "import",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::And => "and",
            Keyword::Or => "or",
        }
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "let" => Kw::Let,
        "fn" => Kw::Fn,
        "if" => Kw::If,
        "else" => Kw::Else,
        "while" => Kw::While,
        "for" => Kw::For,
        "in" => Kw::In,
        "range" => Kw::Range,
        "return" => Kw::Return,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "import" => Kw::Import,
        "true" => Kw::True,
        "false" => Kw::False,
        "null" => Kw::Null,
        "and" => Kw::And,
        "or" => Kw::Or,
        _ => return None,
    };
    Some(keyword)
}

/// One lexical token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    file: &'a str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, file: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            file,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(ErrorKind::Lex, message).at(self.file, self.line, self.col)
    }

    /// Produce the full token stream, terminated by an `Eof` sentinel.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek(0) {
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            if ch == '#' {
                while let Some(c) = self.peek(0) {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }

            let line = self.line;
            let col = self.col;

            // Two-character operators win over single-character scanning.
            if let Some(kind) = self.two_char_op(ch) {
                self.bump();
                self.bump();
                tokens.push(Token { kind, line, col });
                continue;
            }

            if let Some(kind) = punctuation(ch) {
                self.bump();
                tokens.push(Token { kind, line, col });
                continue;
            }

            if "+-*/%<>!=".contains(ch) {
                self.bump();
                tokens.push(Token {
                    kind: TokenKind::Op(ch),
                    line,
                    col,
                });
                continue;
            }

            let kind = if ch == '"' {
                self.string_literal()?
            } else if ch.is_ascii_digit() {
                self.number_literal()?
            } else if ch.is_alphabetic() || ch == '_' {
                self.identifier_or_keyword()
            } else {
                return Err(self.error(format!("Unexpected character: {ch:?}")));
            };
            tokens.push(Token { kind, line, col });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            col: self.col,
        });
        Ok(tokens)
    }

    fn two_char_op(&self, ch: char) -> Option<TokenKind> {
        let next = self.peek(1)?;
        match (ch, next) {
            ('=', '=') => Some(TokenKind::EqEq),
            ('!', '=') => Some(TokenKind::NotEq),
            ('<', '=') => Some(TokenKind::LessEq),
            ('>', '=') => Some(TokenKind::GreaterEq),
            _ => None,
        }
    }

    fn string_literal(&mut self) -> Result<TokenKind, Diagnostic> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek(0) {
                None => return Err(self.error("Unterminated string")),
                Some('"') => {
                    self.bump();
                    return Ok(TokenKind::Str(value));
                }
                Some('\\') => {
                    self.bump();
                    match self.peek(0) {
                        Some('n') => {
                            self.bump();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.bump();
                            value.push('\t');
                        }
                        Some('"') => {
                            self.bump();
                            value.push('"');
                        }
                        Some('\\') => {
                            self.bump();
                            value.push('\\');
                        }
                        Some(other) => {
                            return Err(self.error(format!("Unknown escape \\{other}")));
                        }
                        None => return Err(self.error("Unterminated string")),
                    }
                }
                Some(_) => {
                    let ch = self.bump().unwrap();
                    value.push(ch);
                }
            }
        }
    }

    fn number_literal(&mut self) -> Result<TokenKind, Diagnostic> {
        let mut buf = String::new();
        buf.push(self.bump().unwrap());
        while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
            buf.push(self.bump().unwrap());
        }
        // A dot only joins the literal when a digit follows it; `1.` stays
        // an integer and the dot becomes its own token.
        let is_float = self.peek(0) == Some('.')
            && matches!(self.peek(1), Some(c) if c.is_ascii_digit());
        if is_float {
            buf.push(self.bump().unwrap());
            while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                buf.push(self.bump().unwrap());
            }
            buf.parse()
                .map(TokenKind::Float)
                .map_err(|_| self.error("Float literal out of range"))
        } else {
            buf.parse()
                .map(TokenKind::Int)
                .map_err(|_| self.error("Integer literal out of range"))
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let mut name = String::new();
        name.push(self.bump().unwrap());
        while matches!(self.peek(0), Some(c) if c.is_alphanumeric() || c == '_') {
            name.push(self.bump().unwrap());
        }
        match keyword_for(&name) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(name),
        }
    }
}

fn punctuation(ch: char) -> Option<TokenKind> {
    let kind = match ch {
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        ',' => TokenKind::Comma,
        ';' => TokenKind::Semicolon,
        ':' => TokenKind::Colon,
        '.' => TokenKind::Dot,
        _ => return None,
    };
    Some(kind)
}
