use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use lasso::{Key, Rodeo, Spur};

struct SymbolData {
    key: Spur,
    name: Box<str>,
}

/// An interned identifier. Two symbols are equal only if they came out of
/// the same [`Interner`] for the same text.
#[derive(Clone)]
pub struct Symbol(Rc<SymbolData>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn key(&self) -> Spur {
        self.0.key
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.name())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How identifier text is canonicalized before interning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    /// Fold identifiers to lowercase, so `Foo` and `foo` are the same symbol.
    FoldLowercase,
}

/// Symbols the reader, expander and evaluator dispatch on by identity.
pub struct Keywords {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub if_: Symbol,
    pub define: Symbol,
    pub set: Symbol,
    pub lambda: Symbol,
    pub begin: Symbol,
    pub define_macro: Symbol,
    pub cons: Symbol,
    pub append: Symbol,
    pub eof: Symbol,
}

/// Append-only symbol table owned by one interpreter.
pub struct Interner {
    rodeo: RefCell<Rodeo>,
    symbols: RefCell<Vec<Symbol>>,
    case: CaseSensitivity,
    keywords: Keywords,
}

fn intern_into(rodeo: &mut Rodeo, symbols: &mut Vec<Symbol>, text: &str) -> Symbol {
    intern_named(rodeo, symbols, text, text)
}

fn intern_named(
    rodeo: &mut Rodeo,
    symbols: &mut Vec<Symbol>,
    key_text: &str,
    name: &str,
) -> Symbol {
    let key = rodeo.get_or_intern(key_text);
    let idx = key.into_usize();
    if let Some(sym) = symbols.get(idx) {
        return sym.clone();
    }
    debug_assert_eq!(idx, symbols.len(), "interner keys must be dense");
    let sym = Symbol(Rc::new(SymbolData {
        key,
        name: name.into(),
    }));
    symbols.push(sym.clone());
    sym
}

/// Reserve a symbol that prints as `name` but that no source text can
/// produce. The key text contains whitespace, which ends every token.
fn reserved(rodeo: &mut Rodeo, symbols: &mut Vec<Symbol>, name: &str) -> Symbol {
    intern_named(rodeo, symbols, &format!(" reserved {name}"), name)
}

impl Interner {
    pub fn new(case: CaseSensitivity) -> Self {
        let mut rodeo = Rodeo::default();
        let mut symbols = Vec::new();
        let eof = reserved(&mut rodeo, &mut symbols, "#<eof>");
        let mut kw = |name: &str| intern_into(&mut rodeo, &mut symbols, name);
        let keywords = Keywords {
            quote: kw("quote"),
            quasiquote: kw("quasiquote"),
            unquote: kw("unquote"),
            unquote_splicing: kw("unquote-splicing"),
            if_: kw("if"),
            define: kw("define"),
            set: kw("set!"),
            lambda: kw("lambda"),
            begin: kw("begin"),
            define_macro: kw("define-macro"),
            cons: kw("cons"),
            append: kw("append"),
            eof,
        };
        Interner {
            rodeo: RefCell::new(rodeo),
            symbols: RefCell::new(symbols),
            case,
            keywords,
        }
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    fn canonical<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.case {
            CaseSensitivity::Sensitive => Cow::Borrowed(text),
            CaseSensitivity::FoldLowercase if text.chars().any(char::is_uppercase) => {
                Cow::Owned(text.to_lowercase())
            }
            CaseSensitivity::FoldLowercase => Cow::Borrowed(text),
        }
    }

    /// Return the unique symbol for `text`, creating it on first use.
    pub fn intern(&self, text: &str) -> Symbol {
        let text = self.canonical(text);
        intern_into(
            &mut self.rodeo.borrow_mut(),
            &mut self.symbols.borrow_mut(),
            &text,
        )
    }

    /// Look up an existing symbol without creating one.
    pub fn get(&self, text: &str) -> Option<Symbol> {
        let text = self.canonical(text);
        let key = self.rodeo.borrow().get(text.as_ref())?;
        self.symbols.borrow().get(key.into_usize()).cloned()
    }

    pub fn len(&self) -> usize {
        self.symbols.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new(CaseSensitivity::default())
    }
}
