use std::io::BufRead;
use std::rc::Rc;

use tramp_core::{SourceLocation, TrampError};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplice,
    Dot,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Symbol(String),
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub location: Rc<SourceLocation>,
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '\'' | '"' | '`' | ',' | ';')
}

/// Tokenizer that pulls one line at a time from `input`. No token spans a
/// line boundary.
pub struct Lexer<R> {
    input: R,
    file: Rc<str>,
    line_no: usize,
    text: Rc<str>,
    chars: Vec<char>,
    pos: usize,
    at_eof: bool,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(input: R, file: &str) -> Self {
        Lexer {
            input,
            file: file.into(),
            line_no: 0,
            text: "".into(),
            chars: Vec::new(),
            pos: 0,
            at_eof: false,
        }
    }

    /// Location of the current read position.
    pub fn location(&self) -> Rc<SourceLocation> {
        self.location_at(self.pos)
    }

    fn location_at(&self, pos: usize) -> Rc<SourceLocation> {
        Rc::new(SourceLocation::new(
            self.file.clone(),
            self.line_no,
            pos + 1,
            self.text.clone(),
        ))
    }

    fn next_line(&mut self) -> Result<bool, TrampError> {
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf)?;
        if n == 0 {
            self.at_eof = true;
            self.chars.clear();
            self.pos = 0;
            return Ok(false);
        }
        let line = buf.trim_end_matches(['\n', '\r']);
        self.line_no += 1;
        self.text = line.into();
        self.chars = line.chars().collect();
        self.pos = 0;
        Ok(true)
    }

    /// Return the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, TrampError> {
        loop {
            while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.chars.len() {
                if self.at_eof || !self.next_line()? {
                    return Ok(None);
                }
                continue;
            }

            let start = self.pos;
            let location = self.location_at(start);
            let ch = self.chars[start];
            let token = match ch {
                ';' => {
                    self.pos = self.chars.len();
                    continue;
                }
                '(' => {
                    self.pos += 1;
                    Token::LParen
                }
                ')' => {
                    self.pos += 1;
                    Token::RParen
                }
                '\'' => {
                    self.pos += 1;
                    Token::Quote
                }
                '`' => {
                    self.pos += 1;
                    Token::Quasiquote
                }
                ',' => {
                    if self.chars.get(start + 1) == Some(&'@') {
                        self.pos += 2;
                        Token::UnquoteSplice
                    } else {
                        self.pos += 1;
                        Token::Unquote
                    }
                }
                '"' => self.read_string(&location)?,
                _ => self.read_atom(),
            };
            return Ok(Some(SpannedToken { token, location }));
        }
    }

    fn read_string(&mut self, location: &Rc<SourceLocation>) -> Result<Token, TrampError> {
        let mut i = self.pos + 1;
        let mut out = String::new();
        while i < self.chars.len() {
            match self.chars[i] {
                '"' => {
                    self.pos = i + 1;
                    return Ok(Token::String(out));
                }
                '\\' => {
                    let escaped = match self.chars.get(i + 1) {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(TrampError::syntax(
                                format!("unknown string escape \\{other}"),
                                self.location_at(i),
                            ))
                        }
                        None => break,
                    };
                    out.push(escaped);
                    i += 2;
                }
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        let rest: String = self.chars[self.pos..].iter().collect();
        self.pos = self.chars.len();
        Err(TrampError::syntax(
            format!("unexpected trailing content {rest}"),
            location.clone(),
        ))
    }

    fn read_atom(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.chars.len() && !is_delimiter(self.chars[self.pos]) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        classify_atom(text)
    }
}

fn looks_like_float(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

/// Booleans, then integers, then floats; anything else is a symbol.
fn classify_atom(text: String) -> Token {
    match text.as_str() {
        "#t" => return Token::Bool(true),
        "#f" => return Token::Bool(false),
        "." => return Token::Dot,
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Token::Int(n);
    }
    if looks_like_float(&text) {
        if let Ok(f) = text.parse::<f64>() {
            return Token::Float(f);
        }
    }
    Token::Symbol(text)
}

/// Tokenize a whole string. Mostly useful for tests and tooling.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, TrampError> {
    let mut lexer = Lexer::new(input.as_bytes(), "<string>");
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}
