use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Check arity of a native function's arguments, returning `TrampError::Arity` on mismatch.
///
/// # Forms
///
/// ```ignore
/// check_arity!(args, "fn-name", 2);        // exactly 2
/// check_arity!(args, "fn-name", 1..=3);    // 1 to 3 inclusive
/// check_arity!(args, "fn-name", 2..);      // 2 or more
/// ```
#[macro_export]
macro_rules! check_arity {
    ($args:expr, $name:expr, $exact:literal) => {
        if $args.len() != $exact {
            return Err($crate::TrampError::arity(
                $name,
                stringify!($exact),
                $args.len(),
            ));
        }
    };
    ($args:expr, $name:expr, $lo:literal ..= $hi:literal) => {
        if $args.len() < $lo || $args.len() > $hi {
            return Err($crate::TrampError::arity(
                $name,
                concat!(stringify!($lo), "-", stringify!($hi)),
                $args.len(),
            ));
        }
    };
    ($args:expr, $name:expr, $lo:literal ..) => {
        if $args.len() < $lo {
            return Err($crate::TrampError::arity(
                $name,
                concat!(stringify!($lo), "+"),
                $args.len(),
            ));
        }
    };
}

/// Where a piece of syntax came from: file name, 1-based line and column,
/// and the text of the source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: usize,
    pub column: usize,
    pub text: Rc<str>,
}

impl SourceLocation {
    pub fn new(file: Rc<str>, line: usize, column: usize, text: Rc<str>) -> Self {
        SourceLocation {
            file,
            line,
            column,
            text,
        }
    }

    /// Placeholder for synthesized syntax.
    pub fn unknown() -> Rc<Self> {
        Rc::new(SourceLocation::new(
            "<unknown file>".into(),
            0,
            0,
            ";; unknown".into(),
        ))
    }

    /// Location reported for frames pushed by native procedures.
    pub fn native() -> Rc<Self> {
        Rc::new(SourceLocation::new(
            "<native>".into(),
            0,
            0,
            ";; native code".into(),
        ))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file,
            self.line,
            self.column,
            self.text.trim()
        )
    }
}

#[derive(Debug)]
pub struct CallFrame {
    pub procedure: Rc<str>,
    pub location: Rc<SourceLocation>,
    next: Option<Rc<CallFrame>>,
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(frame) = next {
            match Rc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// Immutable chain of call frames, innermost first. Pushing never mutates
/// an existing stack, so forks share their tails.
#[derive(Debug, Clone, Default)]
pub struct CallStack(Option<Rc<CallFrame>>);

impl CallStack {
    pub fn new() -> Self {
        CallStack(None)
    }

    pub fn push(&self, procedure: impl Into<Rc<str>>, location: Rc<SourceLocation>) -> CallStack {
        CallStack(Some(Rc::new(CallFrame {
            procedure: procedure.into(),
            location,
            next: self.0.clone(),
        })))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn top(&self) -> Option<&CallFrame> {
        self.0.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallFrame> {
        std::iter::successors(self.0.as_deref(), |frame| frame.next.as_deref())
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  at {} in {}", frame.procedure, frame.location)?;
        }
        Ok(())
    }
}

fn with_stack(message: &str, stack: &CallStack) -> String {
    if stack.is_empty() {
        message.to_string()
    } else {
        format!("{message}\n{stack}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrampError {
    /// Malformed source text or syntax rejected during expansion.
    #[error("{location}: {message}")]
    Syntax {
        message: String,
        location: Rc<SourceLocation>,
        #[source]
        cause: Option<Box<TrampError>>,
    },

    /// A failure during evaluation, with the frames active when it happened.
    #[error("{}", with_stack(message, stack))]
    Runtime {
        message: String,
        stack: CallStack,
        #[source]
        cause: Option<Box<TrampError>>,
    },

    #[error("Value `{value}' has incorrect type {got} (expected {expected}).")]
    WrongType {
        value: String,
        got: String,
        expected: String,
    },

    #[error("Cannot convert `{value}' to {target}.")]
    Conversion { value: String, target: String },

    #[error("Wrong number of arguments to {name}: expected {expected}, got {got}.")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Wrong number of arguments: expected {expected}, got {got}.")]
    ParameterCount { expected: usize, got: usize },

    #[error("Unbound variable: {0}")]
    Unbound(String),

    #[error("{0}")]
    Eval(String),

    #[error("ERROR: {0}")]
    User(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl TrampError {
    pub fn eval(msg: impl Into<String>) -> Self {
        TrampError::Eval(msg.into())
    }

    pub fn wrong_type(value: &Value, expected: impl Into<String>) -> Self {
        TrampError::WrongType {
            value: value.to_string(),
            got: value.type_name().to_string(),
            expected: expected.into(),
        }
    }

    pub fn conversion(value: &Value, target: impl Into<String>) -> Self {
        TrampError::Conversion {
            value: value.to_string(),
            target: target.into(),
        }
    }

    pub fn arity(name: impl Into<String>, expected: impl Into<String>, got: usize) -> Self {
        TrampError::Arity {
            name: name.into(),
            expected: expected.into(),
            got,
        }
    }

    pub fn syntax(message: impl Into<String>, location: Rc<SourceLocation>) -> Self {
        TrampError::Syntax {
            message: message.into(),
            location,
            cause: None,
        }
    }

    pub fn runtime(message: impl Into<String>, stack: CallStack) -> Self {
        TrampError::Runtime {
            message: message.into(),
            stack,
            cause: None,
        }
    }

    /// Wrap this error as the cause of a syntax error at `location`.
    pub fn into_syntax(self, prefix: &str, location: Rc<SourceLocation>) -> Self {
        TrampError::Syntax {
            message: format!("{prefix}{self}"),
            location,
            cause: Some(Box::new(self)),
        }
    }

    /// Wrap this error as the cause of a runtime error carrying `stack`.
    pub fn into_runtime(self, prefix: &str, stack: CallStack) -> Self {
        TrampError::Runtime {
            message: format!("{prefix}{self}"),
            stack,
            cause: Some(Box::new(self)),
        }
    }

    /// Domain errors raised by natives and helpers. These are the ones that
    /// get rewrapped with a location or a call stack at form boundaries.
    pub fn is_ordinary(&self) -> bool {
        !matches!(self, TrampError::Syntax { .. } | TrampError::Runtime { .. })
    }

    pub fn call_stack(&self) -> Option<&CallStack> {
        match self {
            TrampError::Runtime { stack, .. } => Some(stack),
            _ => None,
        }
    }

    /// The innermost error in the cause chain.
    pub fn root_cause(&self) -> &TrampError {
        let mut err = self;
        loop {
            match err {
                TrampError::Syntax {
                    cause: Some(inner), ..
                }
                | TrampError::Runtime {
                    cause: Some(inner), ..
                } => err = inner,
                _ => return err,
            }
        }
    }
}

impl From<std::io::Error> for TrampError {
    fn from(e: std::io::Error) -> Self {
        TrampError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrampError>;
