use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::context::EvalContext;
use crate::env::Env;
use crate::error::{CallStack, SourceLocation, TrampError};
use crate::symbol::Symbol;

/// A native function callable from Scheme. Receives already-evaluated
/// arguments and the call stack at the call site.
pub type NativeFnInner =
    dyn Fn(&EvalContext, &[Value], &CallStack) -> Result<Value, TrampError>;

pub struct NativeFn {
    pub name: String,
    pub func: Box<NativeFnInner>,
}

impl NativeFn {
    pub fn simple(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, TrampError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(move |_ctx, args, _stack| f(args)),
        }
    }

    pub fn with_ctx(
        name: impl Into<String>,
        f: impl Fn(&EvalContext, &[Value], &CallStack) -> Result<Value, TrampError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(f),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native-fn {}>", self.name)
    }
}

/// A user-defined procedure.
pub struct Closure {
    /// `()`, a symbol, or a proper list of symbols.
    pub params: Value,
    pub body: Value,
    pub env: Env,
    pub location: Rc<SourceLocation>,
    name: OnceCell<Symbol>,
}

impl Closure {
    pub fn new(params: Value, body: Value, env: Env, location: Rc<SourceLocation>) -> Self {
        Closure {
            params,
            body,
            env,
            location,
            name: OnceCell::new(),
        }
    }

    pub fn name(&self) -> Option<&Symbol> {
        self.name.get()
    }

    /// Record the name this closure was first `define`d under. Later
    /// definitions of the same closure keep the original name.
    pub fn stamp_name(&self, name: &Symbol) {
        let _ = self.name.set(name.clone());
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name.get())
            .field("params", &self.params)
            .field("body", &self.body)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Procedure {
    Closure(Rc<Closure>),
    Native(Rc<NativeFn>),
}

impl Procedure {
    pub fn native(f: NativeFn) -> Self {
        Procedure::Native(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &Procedure) -> bool {
        match (self, other) {
            (Procedure::Closure(a), Procedure::Closure(b)) => Rc::ptr_eq(a, b),
            (Procedure::Native(a), Procedure::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Closure(c) => match c.name() {
                Some(name) => write!(f, "#<procedure {name}>"),
                None => write!(f, "#<procedure at {}>", c.location),
            },
            Procedure::Native(n) => write!(f, "#<procedure {}>", n.name),
        }
    }
}

/// A cons cell. Length and list-ness are computed once from the tail at
/// construction and never change.
pub struct Pair {
    head: Value,
    tail: Value,
    location: Option<Rc<SourceLocation>>,
    length: usize,
    is_list: bool,
}

impl Pair {
    pub fn new(head: Value, tail: Value, location: Option<Rc<SourceLocation>>) -> Self {
        let (length, is_list) = match &tail {
            Value::Pair(p) => (p.length + 1, p.is_list),
            Value::Nil => (1, true),
            _ => (1, false),
        };
        Pair {
            head,
            tail,
            location,
            length,
            is_list,
        }
    }

    pub fn head(&self) -> &Value {
        &self.head
    }

    pub fn tail(&self) -> &Value {
        &self.tail
    }

    /// Location of the token that produced this cell, if it came from the reader.
    pub fn location(&self) -> Option<&Rc<SourceLocation>> {
        self.location.as_ref()
    }

    pub fn location_or_unknown(&self) -> Rc<SourceLocation> {
        self.location.clone().unwrap_or_else(SourceLocation::unknown)
    }

    /// Number of cells before the first non-pair tail.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// True when the chain ends in `()`.
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// Iterate over the heads of this chain, ignoring an improper tail.
    pub fn iter(&self) -> PairIter<'_> {
        PairIter { next: Some(self) }
    }

    /// Iterate over the cells of this chain, so callers can see each
    /// element's location.
    pub fn cells(&self) -> impl Iterator<Item = &Pair> {
        std::iter::successors(Some(self), |pair| match &pair.tail {
            Value::Pair(next) => Some(next.as_ref()),
            _ => None,
        })
    }
}

impl Drop for Pair {
    fn drop(&mut self) {
        let mut next = std::mem::replace(&mut self.tail, Value::Nil);
        while let Value::Pair(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => next = std::mem::replace(&mut pair.tail, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pair(f, self, true)
    }
}

pub struct PairIter<'a> {
    next: Option<&'a Pair>,
}

impl<'a> Iterator for PairIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        let pair = self.next?;
        self.next = match &pair.tail {
            Value::Pair(p) => Some(p.as_ref()),
            _ => None,
        };
        Some(&pair.head)
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(Symbol),
    Pair(Rc<Pair>),
    Procedure(Procedure),
    /// Result of forms evaluated only for effect.
    Unspecified,
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Rc::new(Pair::new(head, tail, None)))
    }

    pub fn cons_at(head: Value, tail: Value, location: Option<Rc<SourceLocation>>) -> Value {
        Value::Pair(Rc::new(Pair::new(head, tail, location)))
    }

    /// Build a proper list from `items`.
    pub fn list(items: Vec<Value>) -> Value {
        Value::list_with_tail(items, Value::Nil)
    }

    /// Build a chain from `items` ending in `tail` (not copied).
    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Value {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    /// Build a chain where every cell keeps the location of its element.
    pub fn list_with_locations(
        items: Vec<(Value, Option<Rc<SourceLocation>>)>,
        tail: Value,
    ) -> Value {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, (item, loc)| Value::cons_at(item, acc, loc))
    }

    pub fn native(f: NativeFn) -> Value {
        Value::Procedure(Procedure::native(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(p) if p.is_list() => "list",
            Value::Pair(_) => "pair",
            Value::Procedure(_) => "procedure",
            Value::Unspecified => "unspecified",
        }
    }

    /// Everything except `#f` counts as true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Value::Unspecified)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// True for `()` and for pairs whose chain ends in `()`.
    pub fn is_list(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Pair(p) => p.is_list(),
            _ => false,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Value::Pair(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&Procedure> {
        match self {
            Value::Procedure(p) => Some(p),
            _ => None,
        }
    }

    /// Length of a proper list, `None` for anything else.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Value::Nil => Some(0),
            Value::Pair(p) if p.is_list() => Some(p.len()),
            _ => None,
        }
    }

    /// Elements of a proper list, `None` for anything else.
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Value::Nil => Some(Vec::new()),
            Value::Pair(p) if p.is_list() => Some(p.iter().cloned().collect()),
            _ => None,
        }
    }

    /// Like [`Value::to_vec`] but reports a type error.
    pub fn expect_list(&self) -> Result<Vec<Value>, TrampError> {
        self.to_vec()
            .ok_or_else(|| TrampError::wrong_type(self, "list"))
    }

    /// The `display` rendering: strings without quotes or escapes.
    pub fn display_string(&self) -> String {
        let mut out = String::new();
        let _ = write_value(&mut out, self, false);
        out
    }

    /// Identity comparison as used by `eq?`.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => a.ptr_eq(b),
            (Value::Pair(_) | Value::Str(_) | Value::Procedure(_), _) => false,
            (a, b) => a == b,
        }
    }
}

/// Structural equality (`equal?`). Locations are ignored.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        let (mut a, mut b) = (self, other);
        loop {
            return match (a, b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if Rc::ptr_eq(x, y) {
                        true
                    } else if x.length != y.length || x.head != y.head {
                        false
                    } else {
                        a = &x.tail;
                        b = &y.tail;
                        continue;
                    }
                }
                (Value::Nil, Value::Nil) | (Value::Unspecified, Value::Unspecified) => true,
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::Int(x), Value::Int(y)) => x == y,
                (Value::Float(x), Value::Float(y)) => x == y,
                (Value::Str(x), Value::Str(y)) => x == y,
                (Value::Symbol(x), Value::Symbol(y)) => x == y,
                (Value::Procedure(x), Value::Procedure(y)) => x.ptr_eq(y),
                _ => false,
            };
        }
    }
}

fn write_float(out: &mut impl fmt::Write, f: f64) -> fmt::Result {
    if f.is_nan() {
        out.write_str("+nan.0")
    } else if f.is_infinite() {
        out.write_str(if f > 0.0 { "+inf.0" } else { "-inf.0" })
    } else {
        // Finite floats always print with a point so they read back as floats.
        let text = f.to_string();
        out.write_str(&text)?;
        if text.contains(['.', 'e', 'E']) {
            Ok(())
        } else {
            out.write_str(".0")
        }
    }
}

fn write_string_literal(out: &mut impl fmt::Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\r' => out.write_str("\\r")?,
            '\0' => out.write_str("\\0")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

fn write_value(out: &mut impl fmt::Write, value: &Value, write: bool) -> fmt::Result {
    match value {
        Value::Nil => out.write_str("()"),
        Value::Bool(true) => out.write_str("#t"),
        Value::Bool(false) => out.write_str("#f"),
        Value::Int(n) => write!(out, "{n}"),
        Value::Float(f) => write_float(out, *f),
        Value::Str(s) if write => write_string_literal(out, s),
        Value::Str(s) => out.write_str(s),
        Value::Symbol(s) => out.write_str(s.name()),
        Value::Procedure(p) => write!(out, "{p}"),
        Value::Unspecified => out.write_str("#<unspecified>"),
        Value::Pair(pair) => write_pair(out, pair, write),
    }
}

fn write_pair(out: &mut impl fmt::Write, pair: &Pair, write: bool) -> fmt::Result {
    out.write_char('(')?;
    let mut cur = pair;
    loop {
        write_value(out, &cur.head, write)?;
        match &cur.tail {
            Value::Pair(next) => {
                out.write_char(' ')?;
                cur = next.as_ref();
            }
            Value::Nil => break,
            tail => {
                out.write_str(" . ")?;
                write_value(out, tail, write)?;
                break;
            }
        }
    }
    out.write_char(')')
}

/// The `write` rendering: strings quoted and escaped.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, true)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, true)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}
