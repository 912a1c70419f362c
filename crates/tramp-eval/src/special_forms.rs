use std::rc::Rc;

use tramp_core::{CallStack, Closure, Env, EvalContext, Pair, Procedure, TrampError, Value};

use crate::eval::{ensure_specified, eval_cell, Trampoline};

fn bad_form(name: &str, pair: &Pair) -> TrampError {
    TrampError::eval(format!("Bad {name} form during eval. {pair:?}"))
}

/// Argument cells of a form, i.e. every cell after the operator.
fn arg_cells(pair: &Pair) -> Vec<&Pair> {
    pair.cells().skip(1).collect()
}

/// Dispatch on the special-form keywords. Returns `None` for applications.
///
/// Forms reaching here have been through the expander, so shape checks
/// only guard against hand-built trees.
pub(crate) fn try_eval_special(
    ctx: &EvalContext,
    pair: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> Option<Result<Trampoline, TrampError>> {
    let head = pair.head().as_symbol()?;
    let kw = ctx.interner.keywords();

    if *head == kw.if_ {
        Some(eval_if(ctx, pair, env, caller, stack))
    } else if *head == kw.define {
        Some(eval_define(ctx, pair, env, caller, stack))
    } else if *head == kw.begin {
        Some(eval_begin(ctx, pair, env, caller, stack))
    } else if *head == kw.lambda {
        Some(eval_lambda(pair, env))
    } else if *head == kw.quote {
        Some(eval_quote(pair))
    } else if *head == kw.set {
        Some(eval_set(ctx, pair, env, caller, stack))
    } else {
        None
    }
}

fn eval_quote(pair: &Pair) -> Result<Trampoline, TrampError> {
    match arg_cells(pair).as_slice() {
        [datum] => Ok(Trampoline::Value(datum.head().clone())),
        _ => Err(bad_form("quote", pair)),
    }
}

fn eval_if(
    ctx: &EvalContext,
    pair: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> Result<Trampoline, TrampError> {
    let args = arg_cells(pair);
    let unspecified = Value::Unspecified;
    let (test, conseq, alt) = match args.as_slice() {
        [test, conseq, alt] => (*test, conseq.head(), alt.head()),
        [test, conseq] => (*test, conseq.head(), &unspecified),
        _ => return Err(bad_form("if", pair)),
    };
    let cond = ensure_specified(eval_cell(ctx, test, env, caller, stack)?)?;
    let branch = if cond.is_truthy() { conseq } else { alt };
    Ok(Trampoline::Eval(branch.clone(), env.clone()))
}

fn eval_define(
    ctx: &EvalContext,
    pair: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> Result<Trampoline, TrampError> {
    let args = arg_cells(pair);
    let [name, value] = args.as_slice() else {
        return Err(bad_form("define", pair));
    };
    let name = name
        .head()
        .as_symbol()
        .ok_or_else(|| bad_form("define", pair))?;
    let value = ensure_specified(eval_cell(ctx, value, env, caller, stack)?)?;
    if let Value::Procedure(Procedure::Closure(closure)) = &value {
        closure.stamp_name(name);
    }
    env.define(name.clone(), value);
    Ok(Trampoline::Value(Value::Unspecified))
}

fn eval_set(
    ctx: &EvalContext,
    pair: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> Result<Trampoline, TrampError> {
    let args = arg_cells(pair);
    let [name, value] = args.as_slice() else {
        return Err(bad_form("set!", pair));
    };
    let name = name
        .head()
        .as_symbol()
        .ok_or_else(|| bad_form("set!", pair))?;
    let Some(frame) = env.find_frame(name) else {
        return Err(TrampError::runtime(
            format!("Symbol {name} not defined in containing environment."),
            stack.push(caller.clone(), pair.location_or_unknown()),
        ));
    };
    let value = ensure_specified(eval_cell(ctx, value, env, caller, stack)?)?;
    frame.define(name.clone(), value);
    Ok(Trampoline::Value(Value::Unspecified))
}

fn eval_lambda(pair: &Pair, env: &Env) -> Result<Trampoline, TrampError> {
    let args = arg_cells(pair);
    let [params, body] = args.as_slice() else {
        return Err(bad_form("lambda", pair));
    };
    let params = params.head();
    if !matches!(params, Value::Nil | Value::Symbol(_) | Value::Pair(_)) {
        return Err(bad_form("lambda", pair));
    }
    let closure = Closure::new(
        params.clone(),
        body.head().clone(),
        env.clone(),
        pair.location_or_unknown(),
    );
    Ok(Trampoline::Value(Value::Procedure(Procedure::Closure(
        Rc::new(closure),
    ))))
}

fn eval_begin(
    ctx: &EvalContext,
    pair: &Pair,
    env: &Env,
    caller: &Rc<str>,
    stack: &CallStack,
) -> Result<Trampoline, TrampError> {
    let args = arg_cells(pair);
    let Some((last, init)) = args.split_last() else {
        return Ok(Trampoline::Value(Value::Unspecified));
    };
    for cell in init {
        eval_cell(ctx, cell, env, caller, stack)?;
    }
    Ok(Trampoline::Eval(last.head().clone(), env.clone()))
}
