use std::io::BufRead;
use std::rc::Rc;

use tramp_core::{
    CallStack, Closure, Env, EvalContext, NativeFn, Pair, Procedure, SourceLocation, TrampError,
    Value,
};
use tramp_reader::Reader;

use crate::expand::expand;
use crate::special_forms;

/// Caller name used for frames pushed by top-level forms.
pub const TOP_LEVEL: &str = "<top-level>";

/// Trampoline for tail-call optimization.
pub enum Trampoline {
    Value(Value),
    /// Continue with another expression in the same frame (`if`, `begin`).
    Eval(Value, Env),
    /// Enter a closure body in tail position; the location is the call site.
    Call(Rc<Closure>, Env, Rc<SourceLocation>),
}

pub type EvalResult = Result<Value, TrampError>;

/// Rewrap a domain error as a runtime error carrying `stack`.
pub(crate) fn with_stack(e: TrampError, prefix: &str, stack: impl FnOnce() -> CallStack) -> TrampError {
    if e.is_ordinary() {
        e.into_runtime(prefix, stack())
    } else {
        e
    }
}

pub(crate) fn ensure_specified(v: Value) -> EvalResult {
    if v.is_unspecified() {
        Err(TrampError::wrong_type(&v, "specified value"))
    } else {
        Ok(v)
    }
}

fn closure_caller(closure: &Rc<Closure>) -> Rc<str> {
    Procedure::Closure(closure.clone()).to_string().into()
}

/// Evaluate an expanded expression.
///
/// `caller` and `location` describe the procedure whose body is running and
/// where it was defined; they label the frame pushed when this expression
/// calls something. Closure calls in tail position loop here instead of
/// recursing, so tail-recursive loops run in constant host stack. Each tail
/// call still pushes its frame onto the running chain.
pub fn evaluate(
    ctx: &EvalContext,
    expr: &Value,
    env: &Env,
    caller: Rc<str>,
    location: Rc<SourceLocation>,
    stack: &CallStack,
) -> EvalResult {
    let mut expr = expr.clone();
    let mut env = env.clone();
    let mut caller = caller;
    let mut location = location;
    let mut stack = stack.clone();

    loop {
        match eval_step(ctx, &expr, &env, &caller, &location, &stack)? {
            Trampoline::Value(v) => return Ok(v),
            Trampoline::Eval(next_expr, next_env) => {
                expr = next_expr;
                env = next_env;
            }
            Trampoline::Call(closure, next_env, call_site) => {
                stack = stack.push(caller.clone(), call_site);
                caller = closure_caller(&closure);
                location = closure.location.clone();
                expr = closure.body.clone();
                env = next_env;
            }
        }
    }
}

fn eval_step(
    ctx: &EvalContext,
    expr: &Value,
    env: &Env,
    caller: &Rc<str>,
    location: &Rc<SourceLocation>,
    stack: &CallStack,
) -> Result<Trampoline, TrampError> {
    match expr {
        Value::Symbol(sym) => match env.get(sym) {
            Some(v) => Ok(Trampoline::Value(v)),
            None => Err(TrampError::Unbound(sym.name().to_string())
                .into_runtime("", stack.push(caller.clone(), location.clone()))),
        },
        Value::Pair(pair) => {
            let pair_loc = pair.location_or_unknown();
            if !pair.is_list() {
                return Err(TrampError::runtime(
                    "Attempted to evaluate a pair which was not a list.",
                    stack.push(caller.clone(), pair_loc),
                ));
            }
            let result = match special_forms::try_eval_special(ctx, pair, env, caller, stack) {
                Some(result) => result,
                None => eval_application(ctx, pair, env, caller, stack),
            };
            result.map_err(|e| {
                with_stack(e, "Error during evaluation: ", || {
                    stack.push(caller.clone(), pair_loc)
                })
            })
        }
        other => Ok(Trampoline::Value(other.clone())),
    }
}

/// Evaluate the element held by `cell`, labelling any frames with `caller`.
pub(crate) fn eval_cell(
    ctx: &EvalContext,
    cell: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> EvalResult {
    evaluate(
        ctx,
        cell.head(),
        env,
        caller.clone(),
        cell.location_or_unknown(),
        stack,
    )
}

fn eval_application(
    ctx: &EvalContext,
    pair: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> Result<Trampoline, TrampError> {
    let mut cells = pair.cells();
    let op = match cells.next() {
        Some(cell) => ensure_specified(eval_cell(ctx, cell, env, caller, stack)?)?,
        None => return Ok(Trampoline::Value(Value::Unspecified)),
    };
    let proc = match op {
        Value::Procedure(p) => p,
        other => return Err(TrampError::wrong_type(&other, "procedure")),
    };
    let args = cells
        .map(|cell| eval_cell(ctx, cell, env, caller, stack).and_then(ensure_specified))
        .collect::<Result<Vec<_>, _>>()?;

    let call_site = pair.location_or_unknown();
    match proc {
        Procedure::Closure(closure) => {
            let new_env = bind_parameters(&closure.params, &args, &closure.env)?;
            Ok(Trampoline::Call(closure, new_env, call_site))
        }
        Procedure::Native(native) => {
            let frame = stack.push(caller.clone(), call_site);
            call_native(ctx, &native, &args, &frame).map(Trampoline::Value)
        }
    }
}

fn call_native(
    ctx: &EvalContext,
    native: &NativeFn,
    args: &[Value],
    stack: &CallStack,
) -> EvalResult {
    (native.func)(ctx, args, stack)
        .map_err(|e| with_stack(e, "Exception during native call. ", || stack.clone()))
}

/// Bind a closure's parameter spec to evaluated arguments in a fresh frame
/// whose parent is `outer`.
pub fn bind_parameters(params: &Value, args: &[Value], outer: &Env) -> Result<Env, TrampError> {
    let parent = Rc::new(outer.clone());
    match params {
        Value::Symbol(rest) => {
            Env::from_bindings(&[rest.clone()], &[Value::list(args.to_vec())], parent)
        }
        Value::Nil => Env::from_bindings(&[], args, parent),
        Value::Pair(spec) if spec.is_list() => {
            let names = spec
                .iter()
                .map(|param| {
                    param
                        .as_symbol()
                        .cloned()
                        .ok_or_else(|| TrampError::wrong_type(param, "symbol"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Env::from_bindings(&names, args, parent)
        }
        other => Err(TrampError::wrong_type(other, "parameter list")),
    }
}

/// Apply a procedure to already-evaluated arguments. Closures run to
/// completion in a nested trampoline.
pub fn apply_procedure(
    ctx: &EvalContext,
    proc: &Procedure,
    args: &[Value],
    stack: &CallStack,
) -> EvalResult {
    match proc {
        Procedure::Native(native) => call_native(ctx, native, args, stack),
        Procedure::Closure(closure) => {
            let env = bind_parameters(&closure.params, args, &closure.env)?;
            evaluate(
                ctx,
                &closure.body,
                &env,
                closure_caller(closure),
                closure.location.clone(),
                stack,
            )
        }
    }
}

/// Read, expand and evaluate every form in `input` against the global
/// environment. Returns the value of the last form that produced one.
pub fn eval_reader<R: BufRead>(ctx: &EvalContext, input: R, name: &str) -> EvalResult {
    let mut reader = Reader::new(input, name, &ctx.interner);
    let env: &Env = &ctx.global_env;
    let mut result = Value::Unspecified;
    let mut forms = 0usize;

    tracing::debug!(source = name, "evaluating source");
    while let Some(form) = reader.next_form()? {
        forms += 1;
        tracing::trace!(source = name, form = %form, "top-level form");
        let expanded = expand(ctx, &form, env, true).map_err(|e| {
            if e.is_ordinary() {
                e.into_syntax("", reader.last_location())
            } else {
                e
            }
        })?;
        let location = match &form {
            Value::Pair(pair) => pair.location_or_unknown(),
            _ => reader.last_location(),
        };
        let value = evaluate(
            ctx,
            &expanded,
            env,
            TOP_LEVEL.into(),
            location,
            &CallStack::new(),
        )?;
        if !value.is_unspecified() {
            result = value;
        }
    }
    tracing::debug!(source = name, forms, "finished source");
    Ok(result)
}

pub fn eval_str(ctx: &EvalContext, input: &str, name: &str) -> EvalResult {
    eval_reader(ctx, input.as_bytes(), name)
}

pub(crate) fn eval_source(
    ctx: &EvalContext,
    input: &mut dyn BufRead,
    name: &str,
) -> EvalResult {
    eval_reader(ctx, input, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tramp_core::{check_arity, Interner};

    fn ctx() -> EvalContext {
        let ctx = EvalContext::new();
        crate::install(&ctx);
        ctx.define_global(
            "+",
            Value::native(NativeFn::simple("+", |args| {
                let mut total = 0i64;
                for a in args {
                    total += a.as_int().ok_or_else(|| TrampError::wrong_type(a, "number"))?;
                }
                Ok(Value::Int(total))
            })),
        );
        ctx.define_global(
            "-",
            Value::native(NativeFn::simple("-", |args| {
                check_arity!(args, "-", 2);
                match (&args[0], &args[1]) {
                    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                    _ => Err(TrampError::eval("ints only")),
                }
            })),
        );
        ctx.define_global(
            "=",
            Value::native(NativeFn::simple("=", |args| {
                check_arity!(args, "=", 2);
                Ok(Value::Bool(args[0] == args[1]))
            })),
        );
        ctx
    }

    fn eval(ctx: &EvalContext, src: &str) -> Value {
        eval_str(ctx, src, "test").unwrap_or_else(|e| panic!("eval failed for `{src}`: {e}"))
    }

    fn eval_err(ctx: &EvalContext, src: &str) -> TrampError {
        match eval_str(ctx, src, "test") {
            Ok(v) => panic!("expected error for `{src}`, got {v}"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_constants_and_quote() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "42"), Value::Int(42));
        assert_eq!(eval(&ctx, "\"s\""), Value::string("s"));
        assert_eq!(eval(&ctx, "'(1 2)").to_string(), "(1 2)");
        assert_eq!(eval(&ctx, "'sym").to_string(), "sym");
    }

    #[test]
    fn test_if_and_truthiness() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "(if #t 1 2)"), Value::Int(1));
        assert_eq!(eval(&ctx, "(if #f 1 2)"), Value::Int(2));
        assert_eq!(eval(&ctx, "(if '() 1 2)"), Value::Int(1));
        assert_eq!(eval(&ctx, "(if 0 1 2)"), Value::Int(1));
        let ctx2 = self::ctx();
        let v = eval_str(&ctx2, "(if #f 1)", "test").unwrap();
        assert!(v.is_unspecified());
    }

    #[test]
    fn test_define_lambda_call() {
        let ctx = ctx();
        eval(&ctx, "(define (add a b) (+ a b))");
        assert_eq!(eval(&ctx, "(add 2 3)"), Value::Int(5));
        assert_eq!(eval(&ctx, "((lambda (x) (+ x 1)) 41)"), Value::Int(42));
        assert_eq!(eval(&ctx, "((lambda args args) 1 2 3)").to_string(), "(1 2 3)");
        assert_eq!(eval(&ctx, "((lambda () 7))"), Value::Int(7));
    }

    #[test]
    fn test_define_stamps_closure_name() {
        let ctx = ctx();
        eval(&ctx, "(define f (lambda (x) x))");
        eval(&ctx, "(define g f)");
        assert_eq!(eval(&ctx, "g").to_string(), "#<procedure f>");
    }

    #[test]
    fn test_closures_capture_environment() {
        let ctx = ctx();
        eval(&ctx, "(define (make-adder n) (lambda (x) (+ x n)))");
        eval(&ctx, "(define add5 (make-adder 5))");
        assert_eq!(eval(&ctx, "(add5 10)"), Value::Int(15));
    }

    #[test]
    fn test_set_bang() {
        let ctx = ctx();
        eval(&ctx, "(define x 1)");
        eval(&ctx, "(set! x 2)");
        assert_eq!(eval(&ctx, "x"), Value::Int(2));
        eval(&ctx, "(define (bump) (set! x (+ x 10)))");
        eval(&ctx, "(bump)");
        assert_eq!(eval(&ctx, "x"), Value::Int(12));
        let err = eval_err(&ctx, "(set! nope 1)");
        assert!(err
            .to_string()
            .contains("Symbol nope not defined in containing environment."));
        assert!(matches!(err, TrampError::Runtime { .. }));
    }

    #[test]
    fn test_begin_returns_last() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "(begin 1 2 3)"), Value::Int(3));
    }

    #[test]
    fn test_parameter_count_error() {
        let ctx = ctx();
        eval(&ctx, "(define (two a b) a)");
        let err = eval_err(&ctx, "(two 1)");
        assert!(err.to_string().contains("expected 2, got 1"), "{err}");
        let err = eval_err(&ctx, "(two 1 2 3)");
        assert!(err.to_string().contains("expected 2, got 3"), "{err}");
    }

    #[test]
    fn test_unbound_symbol_has_stack() {
        let ctx = ctx();
        let err = eval_err(&ctx, "(+ 1 missing)");
        assert!(err.to_string().contains("Unbound variable: missing"));
        let stack = err.call_stack().unwrap();
        assert!(!stack.is_empty());
        assert_eq!(&*stack.top().unwrap().procedure, TOP_LEVEL);
    }

    #[test]
    fn test_native_errors_are_wrapped() {
        let ctx = ctx();
        let err = eval_err(&ctx, "(- 1)");
        let msg = err.to_string();
        assert!(msg.starts_with("Exception during native call. "), "{msg}");
        assert!(msg.contains("  at <top-level> in test:1:2: (- 1)"), "{msg}");
    }

    #[test]
    fn test_calling_non_procedure() {
        let ctx = ctx();
        let err = eval_err(&ctx, "(1 2)");
        assert!(err.to_string().contains("Error during evaluation: "));
        assert!(err.to_string().contains("expected procedure"));
    }

    #[test]
    fn test_unspecified_argument_rejected() {
        let ctx = ctx();
        eval(&ctx, "(define (id x) x)");
        let err = eval_err(&ctx, "(id (if #f #f))");
        assert!(err.to_string().contains("unspecified"), "{err}");
    }

    #[test]
    fn test_deep_tail_recursion() {
        let ctx = ctx();
        eval(
            &ctx,
            "(define (count n acc) (if (= n 0) acc (count (- n 1) (+ acc 1))))",
        );
        assert_eq!(eval(&ctx, "(count 1000000 0)"), Value::Int(1_000_000));
    }

    #[test]
    fn test_tail_calls_keep_every_caller_frame() {
        let ctx = ctx();
        eval(
            &ctx,
            "(define (down n) (if (= n 0) (car-of-nothing) (down (- n 1))))",
        );
        let err = eval_err(&ctx, "(down 50)");
        let stack = err.call_stack().unwrap();
        // top-level call, 50 recursive calls, then the failed lookup
        assert_eq!(stack.depth(), 52);
        assert_eq!(&*stack.iter().last().unwrap().procedure, TOP_LEVEL);
    }

    #[test]
    fn test_bind_parameters() {
        let interner = Interner::default();
        let outer = Env::new();
        let a = interner.intern("a");
        let params = Value::list(vec![Value::Symbol(a.clone())]);
        let env = bind_parameters(&params, &[Value::Int(1)], &outer).unwrap();
        assert_eq!(env.get(&a), Some(Value::Int(1)));
        assert!(matches!(
            bind_parameters(&params, &[], &outer),
            Err(TrampError::ParameterCount { expected: 1, got: 0 })
        ));
        let bad = Value::list(vec![Value::Int(3)]);
        assert!(bind_parameters(&bad, &[Value::Nil], &outer).is_err());
    }

    #[test]
    fn test_apply_procedure_runs_closure() {
        let ctx = ctx();
        let f = eval(&ctx, "(lambda (x y) (+ x y))");
        let proc = f.as_procedure().unwrap();
        let out = apply_procedure(&ctx, proc, &[Value::Int(2), Value::Int(3)], &CallStack::new())
            .unwrap();
        assert_eq!(out, Value::Int(5));
    }

    #[test]
    fn test_last_specified_value_wins() {
        let ctx = ctx();
        assert_eq!(eval(&ctx, "1 (define x 2)"), Value::Int(1));
        assert!(eval_str(&ctx, "", "test").unwrap().is_unspecified());
    }

    #[test]
    fn test_dotted_form_is_error() {
        let ctx = ctx();
        let err = eval_err(&ctx, "(+ 1 . 2)");
        assert!(matches!(err, TrampError::Syntax { .. }), "{err}");
    }
}
