use std::io::BufRead;
use std::rc::Rc;

use tramp_core::{Interner, SourceLocation, Symbol, TrampError, Value};

use crate::lexer::{Lexer, SpannedToken, Token};

/// Reads one datum at a time from a character stream. Every pair built by
/// the reader carries the location of the token that produced its head.
pub struct Reader<'a, R> {
    lexer: Lexer<R>,
    interner: &'a Interner,
    last_location: Rc<SourceLocation>,
}

impl<'a, R: BufRead> Reader<'a, R> {
    pub fn new(input: R, file: &str, interner: &'a Interner) -> Self {
        let lexer = Lexer::new(input, file);
        let last_location = lexer.location();
        Reader {
            lexer,
            interner,
            last_location,
        }
    }

    /// Location of the most recently consumed token.
    pub fn last_location(&self) -> Rc<SourceLocation> {
        self.last_location.clone()
    }

    fn advance(&mut self) -> Result<Option<SpannedToken>, TrampError> {
        let tok = self.lexer.next_token()?;
        if let Some(tok) = &tok {
            self.last_location = tok.location.clone();
        }
        Ok(tok)
    }

    fn expect_token(&mut self) -> Result<SpannedToken, TrampError> {
        match self.advance()? {
            Some(tok) => Ok(tok),
            None => Err(TrampError::syntax(
                "unexpected EOF",
                self.last_location.clone(),
            )),
        }
    }

    /// Read the next datum, or `None` at end of input.
    pub fn next_form(&mut self) -> Result<Option<Value>, TrampError> {
        match self.advance()? {
            Some(tok) => self.parse_expr(tok).map(Some),
            None => Ok(None),
        }
    }

    /// Read the next datum, returning the `#<eof>` symbol at end of input.
    pub fn read(&mut self) -> Result<Value, TrampError> {
        Ok(self
            .next_form()?
            .unwrap_or_else(|| Value::Symbol(self.interner.keywords().eof.clone())))
    }

    fn parse_expr(&mut self, tok: SpannedToken) -> Result<Value, TrampError> {
        let SpannedToken { token, location } = tok;
        match token {
            Token::LParen => self.parse_list(location),
            Token::RParen => Err(TrampError::syntax("unexpected )", location)),
            Token::Dot => Err(TrampError::syntax("unexpected .", location)),
            Token::Quote => self.parse_quoted(self.interner.keywords().quote.clone(), location),
            Token::Quasiquote => {
                self.parse_quoted(self.interner.keywords().quasiquote.clone(), location)
            }
            Token::Unquote => {
                self.parse_quoted(self.interner.keywords().unquote.clone(), location)
            }
            Token::UnquoteSplice => {
                self.parse_quoted(self.interner.keywords().unquote_splicing.clone(), location)
            }
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Int(n) => Ok(Value::Int(n)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::String(s) => Ok(Value::string(&s)),
            Token::Symbol(s) => Ok(Value::Symbol(self.interner.intern(&s))),
        }
    }

    fn parse_quoted(
        &mut self,
        keyword: Symbol,
        location: Rc<SourceLocation>,
    ) -> Result<Value, TrampError> {
        let next = self.expect_token()?;
        let datum_location = next.location.clone();
        let datum = self.parse_expr(next)?;
        Ok(Value::cons_at(
            Value::Symbol(keyword),
            Value::cons_at(datum, Value::Nil, Some(datum_location)),
            Some(location),
        ))
    }

    fn parse_list(&mut self, open: Rc<SourceLocation>) -> Result<Value, TrampError> {
        let mut items = Vec::new();
        loop {
            let Some(tok) = self.advance()? else {
                return Err(TrampError::syntax("unexpected EOF in list", open));
            };
            match tok.token {
                Token::RParen => return Ok(Value::list_with_locations(items, Value::Nil)),
                Token::Dot => {
                    if items.is_empty() {
                        return Err(TrampError::syntax("unexpected .", tok.location));
                    }
                    let next = self.expect_token()?;
                    let tail = self.parse_expr(next)?;
                    let close = self.expect_token()?;
                    if close.token != Token::RParen {
                        return Err(TrampError::syntax(
                            "expected ) after dotted pair",
                            close.location,
                        ));
                    }
                    return Ok(Value::list_with_locations(items, tail));
                }
                _ => {
                    let location = tok.location.clone();
                    let value = self.parse_expr(tok)?;
                    items.push((value, Some(location)));
                }
            }
        }
    }
}

/// Read every datum in `input`.
pub fn read_str(input: &str, interner: &Interner) -> Result<Vec<Value>, TrampError> {
    let mut reader = Reader::new(input.as_bytes(), "<string>", interner);
    let mut forms = Vec::new();
    while let Some(form) = reader.next_form()? {
        forms.push(form);
    }
    Ok(forms)
}

/// Read exactly one datum from `input`.
pub fn read_one(input: &str, interner: &Interner) -> Result<Value, TrampError> {
    let mut reader = Reader::new(input.as_bytes(), "<string>", interner);
    match reader.next_form()? {
        Some(form) => Ok(form),
        None => Err(TrampError::syntax("unexpected EOF", reader.last_location())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str) -> Value {
        let interner = Interner::default();
        read_one(input, &interner).unwrap()
    }

    fn read_err(input: &str) -> String {
        let interner = Interner::default();
        read_str(input, &interner).unwrap_err().to_string()
    }

    #[test]
    fn test_read_atoms() {
        assert_eq!(read("42"), Value::Int(42));
        assert_eq!(read("-1.5"), Value::Float(-1.5));
        assert_eq!(read("#t"), Value::Bool(true));
        assert_eq!(read("\"hi\""), Value::string("hi"));
        assert_eq!(read("()"), Value::Nil);
    }

    #[test]
    fn test_read_list_and_dotted() {
        assert_eq!(read("(1 2 3)").to_string(), "(1 2 3)");
        assert_eq!(read("(1 2 . 3)").to_string(), "(1 2 . 3)");
        assert_eq!(read("(a (b c) d)").to_string(), "(a (b c) d)");
        let p = read("(1 . 2)");
        assert!(!p.is_list());
        assert_eq!(p.as_pair().unwrap().len(), 1);
    }

    #[test]
    fn test_read_quote_forms() {
        assert_eq!(read("'x").to_string(), "(quote x)");
        assert_eq!(
            read("`(a ,b ,@c)").to_string(),
            "(quasiquote (a (unquote b) (unquote-splicing c)))"
        );
    }

    #[test]
    fn test_symbols_are_interned() {
        let interner = Interner::default();
        let forms = read_str("foo foo", &interner).unwrap();
        assert!(forms[0].is_eq(&forms[1]));
        assert_eq!(forms[0], Value::Symbol(interner.intern("foo")));
    }

    #[test]
    fn test_pairs_carry_element_locations() {
        let v = read("(a\n  (b c))");
        let first = v.as_pair().unwrap();
        let loc = first.location().unwrap();
        assert_eq!((loc.line, loc.column), (1, 2));
        let second = first.tail().as_pair().unwrap();
        let loc = second.location().unwrap();
        assert_eq!((loc.line, loc.column), (2, 3));
        let inner = second.head().as_pair().unwrap();
        let loc = inner.location().unwrap();
        assert_eq!((loc.line, loc.column), (2, 4));
    }

    #[test]
    fn test_quote_locations() {
        let v = read(" 'x");
        let outer = v.as_pair().unwrap();
        assert_eq!(outer.location().unwrap().column, 2);
        let datum = outer.tail().as_pair().unwrap();
        assert_eq!(datum.location().unwrap().column, 3);
    }

    #[test]
    fn test_read_eof_symbol() {
        let interner = Interner::default();
        let mut reader = Reader::new("1 ; done".as_bytes(), "t.scm", &interner);
        assert_eq!(reader.read().unwrap(), Value::Int(1));
        let eof = reader.read().unwrap();
        assert_eq!(eof, Value::Symbol(interner.keywords().eof.clone()));
    }

    #[test]
    fn test_eof_literal_is_an_ordinary_symbol() {
        let interner = Interner::default();
        let mut reader = Reader::new("#<eof>".as_bytes(), "t.scm", &interner);
        let literal = reader.read().unwrap();
        assert_eq!(literal.to_string(), "#<eof>");
        assert_ne!(literal, Value::Symbol(interner.keywords().eof.clone()));
        let end = reader.read().unwrap();
        assert_eq!(end, Value::Symbol(interner.keywords().eof.clone()));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(read_err(")").contains("unexpected )"));
        assert!(read_err("(1 2").contains("unexpected EOF"));
        assert!(read_err("'").contains("unexpected EOF"));
        assert!(read_err("( . 1)").contains("unexpected ."));
        assert!(read_err(".").contains("unexpected ."));
        assert!(read_err("(a . b c)").contains("expected ) after dotted pair"));
    }

    #[test]
    fn test_error_location() {
        let interner = Interner::default();
        let err = read_str("(ok)\n  )", &interner).unwrap_err();
        match err {
            TrampError::Syntax { location, .. } => {
                assert_eq!((location.line, location.column), (2, 3));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_multiline_form() {
        let interner = Interner::default();
        let forms = read_str("(define x\n  10)\n(+ x 1)", &interner).unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[1].to_string(), "(+ x 1)");
    }
}
