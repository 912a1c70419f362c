use std::cell::{Cell, RefCell};
use std::io::BufRead;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::env::Env;
use crate::error::{CallStack, TrampError};
use crate::port::{FileAccessor, NullPort, OutputPort, ReadOnlyFiles};
use crate::symbol::{CaseSensitivity, Interner, Symbol};
use crate::value::{Procedure, Value};

/// Apply a procedure to evaluated arguments.
pub type CallFn =
    fn(&EvalContext, &Procedure, &[Value], &CallStack) -> Result<Value, TrampError>;

/// Read and evaluate every form from a source stream in the global environment.
pub type EvalSourceFn =
    fn(&EvalContext, &mut dyn BufRead, &str) -> Result<Value, TrampError>;

/// Everything one interpreter instance owns.
pub struct EvalContext {
    pub interner: Interner,
    pub global_env: Rc<Env>,
    pub macros: RefCell<HashMap<Symbol, Procedure>>,
    pub output: Box<dyn OutputPort>,
    pub files: Box<dyn FileAccessor>,
    call_fn: Cell<Option<CallFn>>,
    eval_source_fn: Cell<Option<EvalSourceFn>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::with_options(
            CaseSensitivity::default(),
            Box::new(NullPort),
            Box::new(ReadOnlyFiles),
        )
    }

    pub fn with_options(
        case: CaseSensitivity,
        output: Box<dyn OutputPort>,
        files: Box<dyn FileAccessor>,
    ) -> Self {
        EvalContext {
            interner: Interner::new(case),
            global_env: Rc::new(Env::new()),
            macros: RefCell::new(HashMap::new()),
            output,
            files,
            call_fn: Cell::new(None),
            eval_source_fn: Cell::new(None),
        }
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    /// Bind `name` in the global environment.
    pub fn define_global(&self, name: &str, value: Value) {
        self.global_env.define(self.intern(name), value);
    }

    pub fn lookup_macro(&self, name: &Symbol) -> Option<Procedure> {
        self.macros.borrow().get(name).cloned()
    }

    pub fn define_macro(&self, name: Symbol, transformer: Procedure) {
        self.macros.borrow_mut().insert(name, transformer);
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the evaluator's procedure-application entry point.
pub fn set_call_callback(ctx: &EvalContext, f: CallFn) {
    ctx.call_fn.set(Some(f));
}

/// Install the evaluator's source-loading entry point.
pub fn set_eval_source_callback(ctx: &EvalContext, f: EvalSourceFn) {
    ctx.eval_source_fn.set(Some(f));
}

/// Call a procedure from native code.
pub fn call_callback(
    ctx: &EvalContext,
    proc: &Procedure,
    args: &[Value],
    stack: &CallStack,
) -> Result<Value, TrampError> {
    match ctx.call_fn.get() {
        Some(f) => f(ctx, proc, args, stack),
        None => match proc {
            Procedure::Native(native) => (native.func)(ctx, args, stack),
            Procedure::Closure(_) => Err(TrampError::eval(
                "no evaluator installed to call closures",
            )),
        },
    }
}

/// Evaluate a source stream from native code.
pub fn eval_source_callback(
    ctx: &EvalContext,
    input: &mut dyn BufRead,
    name: &str,
) -> Result<Value, TrampError> {
    match ctx.eval_source_fn.get() {
        Some(f) => f(ctx, input, name),
        None => Err(TrampError::eval("no evaluator installed to load source")),
    }
}
