//! tramp: a small Scheme with proper tail calls.
//!
//! This crate wires the reader, expander, evaluator and primitive library
//! together behind an embedding API.
//!
//! # Quick Start
//!
//! ```no_run
//! use tramp::{Interpreter, Value};
//!
//! let interp = Interpreter::new();
//! let result = interp.eval_str("(define (sq x) (* x x)) (sq 7)").unwrap();
//! assert_eq!(result, Value::Int(49));
//! ```

use std::io::BufRead;
use std::rc::Rc;

pub use tramp_core::{
    BufferPort, CaseSensitivity, DisabledFiles, Env, EvalContext, FileAccessor, NativeFn,
    NullPort, OutputPort, Procedure, ReadOnlyFiles, StdoutPort, Symbol, TrampError, Value,
};

pub type Result<T> = std::result::Result<T, TrampError>;

/// Result of evaluating tramp source.
pub type EvalResult = Result<Value>;

type NativeImpl = Box<dyn Fn(&[Value]) -> Result<Value>>;

/// Builder for configuring and constructing an [`Interpreter`].
///
/// By default the primitive library is installed, symbols are case
/// sensitive, output goes to stdout and files are readable.
pub struct InterpreterBuilder {
    stdlib: bool,
    case: CaseSensitivity,
    output: Box<dyn OutputPort>,
    files: Box<dyn FileAccessor>,
    natives: Vec<(String, NativeImpl)>,
}

impl Default for InterpreterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self {
            stdlib: true,
            case: CaseSensitivity::default(),
            output: Box::new(StdoutPort),
            files: Box::new(ReadOnlyFiles),
            natives: Vec::new(),
        }
    }

    /// Enable or disable the primitive library (default: `true`).
    pub fn with_stdlib(mut self, enable: bool) -> Self {
        self.stdlib = enable;
        self
    }

    pub fn without_stdlib(self) -> Self {
        self.with_stdlib(false)
    }

    /// Choose how symbol text is normalized when interned.
    pub fn case_sensitivity(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    /// Set the file accessor used by `load`.
    pub fn with_files(mut self, files: impl FileAccessor + 'static) -> Self {
        self.files = Box::new(files);
        self
    }

    /// Set the port that `display`, `write` and `newline` print to.
    pub fn with_output(mut self, output: impl OutputPort + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Add a global native procedure, installed after the primitive library
    /// so it can shadow a primitive of the same name.
    pub fn with_native<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        self.natives.push((name.to_string(), Box::new(f)));
        self
    }

    /// Build the [`Interpreter`] with the configured options.
    pub fn build(self) -> Interpreter {
        let ctx = EvalContext::with_options(self.case, self.output, self.files);
        tramp_eval::install(&ctx);
        if self.stdlib {
            tramp_stdlib::register_stdlib(&ctx);
        }
        for (name, f) in self.natives {
            ctx.define_global(&name, Value::native(NativeFn::simple(name.as_str(), f)));
        }
        Interpreter { ctx }
    }
}

/// A tramp interpreter instance. Each instance has its own symbol table,
/// global environment and macro table.
pub struct Interpreter {
    ctx: EvalContext,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        InterpreterBuilder::new().build()
    }

    /// Create an [`InterpreterBuilder`] for fine-grained configuration.
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    /// Read and evaluate every form in `input`, returning the value of the
    /// last form that produced one.
    ///
    /// Definitions persist across calls, so you can define a procedure in
    /// one call and use it in the next.
    pub fn eval_str(&self, input: &str) -> EvalResult {
        self.eval_str_named(input, "<string>")
    }

    /// Like [`Interpreter::eval_str`], with `name` used as the file name in
    /// source locations.
    pub fn eval_str_named(&self, input: &str, name: &str) -> EvalResult {
        tramp_eval::eval_str(&self.ctx, input, name)
    }

    /// Evaluate a buffered stream, reading one form at a time.
    pub fn eval_reader<R: BufRead>(&self, input: R, name: &str) -> EvalResult {
        tramp_eval::eval_reader(&self.ctx, input, name)
    }

    pub fn define_global(&self, name: &str, value: Value) {
        self.ctx.define_global(name, value);
    }

    /// Register a native procedure that can be called from tramp code.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tramp::{Interpreter, TrampError, Value};
    ///
    /// let interp = Interpreter::new();
    /// interp.register_fn("square", |args: &[Value]| match args {
    ///     [Value::Int(n)] => Ok(Value::Int(n * n)),
    ///     [other] => Err(TrampError::wrong_type(other, "integer")),
    ///     _ => Err(TrampError::arity("square", "1", args.len())),
    /// });
    /// ```
    pub fn register_fn<F>(&self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        self.ctx
            .define_global(name, Value::native(NativeFn::simple(name, f)));
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.ctx.intern(name)
    }

    /// Return a reference to the global environment.
    pub fn global_env(&self) -> &Rc<Env> {
        &self.ctx.global_env
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }
}
